//! Mean reversion: buy oversold pullbacks inside a long-term uptrend.
//!
//! Trades in Bull and Neutral. Entry: RSI14 < `rsi_oversold` and close > SMA200,
//! ranked by how far RSI sits below the threshold. Invalidation: RSI14 above
//! `rsi_exit` (RsiNormalized) or a Bear regime.

use super::{ExitSignal, Strategy, StrategyCore, StrategyKind, TargetWeights};
use crate::domain::{Direction, ExitReason};
use crate::features::MarketView;
use crate::regime::MarketRegime;

#[derive(Debug, Clone)]
pub struct MeanReversion {
    core: StrategyCore,
    rsi_oversold: f64,
    rsi_exit: f64,
}

impl MeanReversion {
    pub fn new(core: StrategyCore, rsi_oversold: f64, rsi_exit: f64) -> Self {
        Self {
            core,
            rsi_oversold,
            rsi_exit,
        }
    }
}

impl Strategy for MeanReversion {
    fn name(&self) -> &str {
        StrategyKind::MeanReversion.as_str()
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::MeanReversion
    }

    fn bias(&self) -> Direction {
        Direction::Long
    }

    fn trades_in(&self, regime: MarketRegime) -> bool {
        match regime {
            MarketRegime::Bull | MarketRegime::Neutral => true,
            MarketRegime::Bear => false,
        }
    }

    fn core(&self) -> &StrategyCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut StrategyCore {
        &mut self.core
    }

    fn evaluate_exits(&mut self, view: &MarketView<'_>, regime: MarketRegime) -> Vec<ExitSignal> {
        let rsi_exit = self.rsi_exit;
        self.core.check_exits(view, |_, row| {
            if row.rsi_14 > rsi_exit {
                Some(ExitReason::RsiNormalized)
            } else if regime == MarketRegime::Bear {
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
        let oversold = self.rsi_oversold;
        let candidates = view
            .rows()
            .filter(|(_, r)| r.rsi_14 < oversold && r.close > r.sma_200)
            .map(|(s, r)| (s.to_string(), oversold - r.rsi_14))
            .collect();
        self.core.select(candidates, self.bias())
    }
}
