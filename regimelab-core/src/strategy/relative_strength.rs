//! Relative strength: own leaders that outperform the benchmark with positive momentum.

use super::{ExitSignal, Strategy, StrategyCore, StrategyKind, TargetWeights};
use crate::domain::{Direction, ExitReason};
use crate::features::MarketView;
use crate::regime::MarketRegime;

#[derive(Debug, Clone)]
pub struct RelativeStrength {
    core: StrategyCore,
    min_rel_strength: f64,
}

impl RelativeStrength {
    pub fn new(core: StrategyCore, min_rel_strength: f64) -> Self {
        Self {
            core,
            min_rel_strength,
        }
    }
}

impl Strategy for RelativeStrength {
    fn name(&self) -> &str {
        StrategyKind::RelativeStrength.as_str()
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::RelativeStrength
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
        self.core.check_exits(view, |_, row| {
            if row.macd_hist < 0.0 {
                Some(ExitReason::TrendReversal)
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
        let floor = self.min_rel_strength;
        let candidates = view
            .rows()
            .filter(|(_, r)| r.rel_strength > floor && r.macd_hist > 0.0 && r.close > r.sma_50)
            .map(|(s, r)| (s.to_string(), r.rel_strength))
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

    fn strategy(top_k: usize) -> RelativeStrength {
        let params = StrategyParams {
            top_k,
            ..StrategyParams::default()
        };
        RelativeStrength::new(StrategyCore::new(params, RiskManager::default()), 1.0)
    }

    fn row(rel_strength: f64, macd_hist: f64) -> FeatureRow {
        FeatureRow {
            rel_strength,
            macd_hist,
            sma_50: 90.0,
            atr_14: 1.0,
            ..flat(100.0)
        }
    }

    #[test]
    fn leaders_ranked_by_relative_strength() {
        let fs = feature_set(vec![
            ("AAA", vec![row(1.2, 0.5)]),
            ("BBB", vec![row(1.5, 0.5)]),
            ("CCC", vec![row(0.9, 0.5)]),
            ("DDD", vec![row(2.0, -0.1)]),
        ]);
        let u = universe(&["AAA", "BBB", "CCC", "DDD"]);
        let t = strategy(1).generate_signals(&fs.view(0, &u), MarketRegime::Neutral);
        assert_eq!(t.keys().collect::<Vec<_>>(), vec!["BBB"]);
    }

    #[test]
    fn negative_macd_exits() {
        let fs = feature_set(vec![("AAA", vec![row(1.2, 0.5), row(1.2, -0.2)])]);
        let u = universe(&["AAA"]);
        let mut s = strategy(2);
        let view = fs.view(0, &u);
        let t = s.generate_signals(&view, MarketRegime::Bull);
        let _ = s.risk_model(&t, &view, &PortfolioState::new(1e4), MarketRegime::Bull);
        let exits = s.evaluate_exits(&fs.view(1, &u), MarketRegime::Bull);
        assert_eq!(exits[0].reason, ExitReason::TrendReversal);
    }

    #[test]
    fn cancel_entry_frees_slot() {
        let fs = feature_set(vec![("AAA", vec![row(1.2, 0.5)])]);
        let u = universe(&["AAA"]);
        let mut s = strategy(1);
        let view = fs.view(0, &u);
        let t = s.generate_signals(&view, MarketRegime::Bull);
        let _ = s.risk_model(&t, &view, &PortfolioState::new(1e4), MarketRegime::Bull);
        assert!(s.generate_signals(&view, MarketRegime::Bull).is_empty());
        assert!(s.cancel_entry("AAA").is_some());
        assert_eq!(s.generate_signals(&view, MarketRegime::Bull).len(), 1);
    }
}
