//! Trend following: enter on a fresh SMA20/SMA50 golden cross in Bull markets.
//!
//! A cross needs SMA20 > SMA50 today and SMA20 <= SMA50 on the previous row.
//! Ranked by today's spread SMA20/SMA50 - 1. Exit on a death cross.

use super::{ExitSignal, Strategy, StrategyCore, StrategyKind, TargetWeights};
use crate::domain::{Direction, ExitReason};
use crate::features::MarketView;
use crate::regime::MarketRegime;

#[derive(Debug, Clone)]
pub struct TrendFollowing {
    core: StrategyCore,
    min_spread: f64,
}

impl TrendFollowing {
    pub fn new(core: StrategyCore, min_spread: f64) -> Self {
        Self { core, min_spread }
    }
}

impl Strategy for TrendFollowing {
    fn name(&self) -> &str {
        StrategyKind::TrendFollowing.as_str()
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::TrendFollowing
    }

    fn bias(&self) -> Direction {
        Direction::Long
    }

    fn trades_in(&self, regime: MarketRegime) -> bool {
        match regime {
            MarketRegime::Bull => true,
            MarketRegime::Bear | MarketRegime::Neutral => false,
        }
    }

    fn core(&self) -> &StrategyCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut StrategyCore {
        &mut self.core
    }

    fn evaluate_exits(&mut self, view: &MarketView<'_>, _regime: MarketRegime) -> Vec<ExitSignal> {
        self.core.check_exits(view, |_, row| {
            (row.sma_20 < row.sma_50).then_some(ExitReason::DeathCross)
        })
    }

    fn generate_signals(&mut self, view: &MarketView<'_>, regime: MarketRegime) -> TargetWeights {
        if !self.trades_in(regime) {
            return TargetWeights::new();
        }
        let candidates = view
            .rows()
            .filter(|(s, r)| {
                r.sma_20 > r.sma_50
                    && view
                        .lagged(s, 1)
                        .is_some_and(|prev| prev.sma_20 <= prev.sma_50)
            })
            .map(|(s, r)| (s.to_string(), r.sma_20 / r.sma_50 - 1.0))
            .filter(|(_, spread)| *spread >= self.min_spread)
            .collect();
        self.core.select(candidates, self.bias())
    }
}
