//! Range reversion: buy closes below the lower Bollinger band in sideways markets.
//!
//! Neutral regime only. Ranked by depth below the band. Exit when price gets
//! back to the middle band (ChannelExit) or the regime leaves Neutral.

use super::{ExitSignal, Strategy, StrategyCore, StrategyKind, TargetWeights};
use crate::domain::{Direction, ExitReason};
use crate::features::MarketView;
use crate::regime::MarketRegime;

#[derive(Debug, Clone)]
pub struct RangeReversion {
    core: StrategyCore,
    /// Minimum (lower - close) / lower to enter.
    min_penetration: f64,
}

impl RangeReversion {
    pub fn new(core: StrategyCore, min_penetration: f64) -> Self {
        Self {
            core,
            min_penetration,
        }
    }
}

impl Strategy for RangeReversion {
    fn name(&self) -> &str {
        StrategyKind::RangeReversion.as_str()
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::RangeReversion
    }

    fn bias(&self) -> Direction {
        Direction::Long
    }

    fn trades_in(&self, regime: MarketRegime) -> bool {
        match regime {
            MarketRegime::Neutral => true,
            MarketRegime::Bull | MarketRegime::Bear => false,
        }
    }

    /// Full budget applies in the range-bound regime it trades.
    fn favored_regime(&self) -> MarketRegime {
        MarketRegime::Neutral
    }

    fn core(&self) -> &StrategyCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut StrategyCore {
        &mut self.core
    }

    fn evaluate_exits(&mut self, view: &MarketView<'_>, regime: MarketRegime) -> Vec<ExitSignal> {
        self.core.check_exits(view, |_, row| {
            if row.close >= row.bb_middle {
                Some(ExitReason::ChannelExit)
            } else if regime != MarketRegime::Neutral {
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
            .filter(|(_, r)| r.close < r.bb_lower && r.bb_lower > 0.0)
            .map(|(s, r)| (s.to_string(), (r.bb_lower - r.close) / r.bb_lower))
            .filter(|(_, depth)| *depth >= self.min_penetration)
            .collect();
        self.core.select(candidates, self.bias())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PortfolioState;
    use crate::features::FeatureRow;
    use crate::risk::RiskManager;
    use crate::strategy::test_support::{feature_set, flat, universe};
    use crate::strategy::StrategyParams;

    fn strategy() -> RangeReversion {
        RangeReversion::new(
            StrategyCore::new(StrategyParams::default(), RiskManager::default()),
            0.0,
        )
    }

    fn row(close: f64) -> FeatureRow {
        FeatureRow {
            bb_lower: 95.0,
            bb_middle: 100.0,
            bb_upper: 105.0,
            atr_14: 5.0,
            ..flat(close)
        }
    }

    #[test]
    fn enters_below_lower_band_only_in_neutral() {
        let fs = feature_set(vec![("AAA", vec![row(94.0)]), ("BBB", vec![row(97.0)])]);
        let u = universe(&["AAA", "BBB"]);
        let mut s = strategy();
        assert!(s.generate_signals(&fs.view(0, &u), MarketRegime::Bull).is_empty());
        let t = s.generate_signals(&fs.view(0, &u), MarketRegime::Neutral);
        assert_eq!(t.keys().collect::<Vec<_>>(), vec!["AAA"]);
    }

    #[test]
    fn middle_band_is_channel_exit() {
        let fs = feature_set(vec![("AAA", vec![row(94.0), row(100.0)])]);
        let u = universe(&["AAA"]);
        let mut s = strategy();
        let view = fs.view(0, &u);
        let t = s.generate_signals(&view, MarketRegime::Neutral);
        let _ = s.risk_model(&t, &view, &PortfolioState::new(1e4), MarketRegime::Neutral);
        let exits = s.evaluate_exits(&fs.view(1, &u), MarketRegime::Neutral);
        assert_eq!(exits[0].reason, ExitReason::ChannelExit);
    }

    #[test]
    fn regime_change_exits() {
        let fs = feature_set(vec![("AAA", vec![row(94.0), row(96.0)])]);
        let u = universe(&["AAA"]);
        let mut s = strategy();
        let view = fs.view(0, &u);
        let t = s.generate_signals(&view, MarketRegime::Neutral);
        let _ = s.risk_model(&t, &view, &PortfolioState::new(1e4), MarketRegime::Neutral);
        let exits = s.evaluate_exits(&fs.view(1, &u), MarketRegime::Bear);
        assert_eq!(exits[0].reason, ExitReason::RegimeExit);
    }

    #[test]
    fn full_budget_in_neutral() {
        assert_eq!(strategy().risk_budget(MarketRegime::Neutral), 1.0);
        assert_eq!(strategy().risk_budget(MarketRegime::Bull), 0.5);
    }
}
