//! Short momentum: short 20-day breakdowns below SMA50 in Bear markets.
//!
//! Entry: close < prior 20-day low and close < SMA50, ranked by breakdown
//! depth. Invalidation: close > SMA50 (TrendReversal) or a Bull regime.

use super::{ExitSignal, Strategy, StrategyCore, StrategyKind, TargetWeights};
use crate::domain::{Direction, ExitReason};
use crate::features::MarketView;
use crate::regime::MarketRegime;

#[derive(Debug, Clone)]
pub struct ShortMomentum {
    core: StrategyCore,
    min_breakdown: f64,
}

impl ShortMomentum {
    pub fn new(core: StrategyCore, min_breakdown: f64) -> Self {
        Self {
            core,
            min_breakdown,
        }
    }
}

impl Strategy for ShortMomentum {
    fn name(&self) -> &str {
        StrategyKind::ShortMomentum.as_str()
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::ShortMomentum
    }

    fn bias(&self) -> Direction {
        Direction::Short
    }

    fn trades_in(&self, regime: MarketRegime) -> bool {
        match regime {
            MarketRegime::Bear => true,
            MarketRegime::Bull | MarketRegime::Neutral => false,
        }
    }

    fn core(&self) -> &StrategyCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut StrategyCore {
        &mut self.core
    }

    fn evaluate_exits(&mut self, view: &MarketView<'_>, regime: MarketRegime) -> Vec<ExitSignal> {
        self.core.check_exits(view, |_, row| {
            if row.close > row.sma_50 {
                Some(ExitReason::TrendReversal)
            } else if regime == MarketRegime::Bull {
                Some(ExitReason::RegimeExit)
            } else {
                None
            }
        })
    }

    fn generate_signals(&mut self, view: &MarketView<'_>, regime: MarketRegime) -> TargetWeights {
        if !self.trades_in(regime) {
            return TargetWeights::new();
        }
        let candidates = view
            .rows()
            .filter(|(_, r)| r.close < r.low_20 && r.close < r.sma_50)
            .map(|(s, r)| (s.to_string(), 1.0 - r.close / r.low_20))
            .filter(|(_, depth)| *depth >= self.min_breakdown)
            .collect();
        self.core.select(candidates, self.bias())
    }
}
