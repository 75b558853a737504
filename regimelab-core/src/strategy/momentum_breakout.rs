//! Momentum breakout: long new 20-day highs above a rising trend, Bull only.
//!
//! Entry: close > prior 20-day high and close > SMA50, with the breakout at
//! least `min_breakout` above the channel. Ranked by breakout magnitude.
//! Invalidation: close < SMA50 (TrendReversal) or a Bear regime (RegimeExit).

use super::{ExitSignal, Strategy, StrategyCore, StrategyKind, TargetWeights};
use crate::domain::{Direction, ExitReason};
use crate::features::MarketView;
use crate::regime::MarketRegime;

#[derive(Debug, Clone)]
pub struct MomentumBreakout {
    core: StrategyCore,
    /// Minimum close / high_20 - 1 to count as a breakout.
    min_breakout: f64,
}

impl MomentumBreakout {
    pub fn new(core: StrategyCore, min_breakout: f64) -> Self {
        Self { core, min_breakout }
    }
}

impl Strategy for MomentumBreakout {
    fn name(&self) -> &str {
        StrategyKind::MomentumBreakout.as_str()
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::MomentumBreakout
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

    fn evaluate_exits(&mut self, view: &MarketView<'_>, regime: MarketRegime) -> Vec<ExitSignal> {
        self.core.check_exits(view, |_, row| {
            if row.close < row.sma_50 {
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
        let candidates = view
            .rows()
            .filter(|(_, r)| r.close > r.high_20 && r.close > r.sma_50)
            .map(|(s, r)| (s.to_string(), r.close / r.high_20 - 1.0))
            .filter(|(_, score)| *score >= self.min_breakout)
            .collect();
        self.core.select(candidates, self.bias())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureRow;
    use crate::risk::RiskManager;
    use crate::strategy::test_support::{feature_set, flat, universe};
    use crate::strategy::StrategyParams;

    fn strategy(top_k: usize) -> MomentumBreakout {
        let params = StrategyParams {
            top_k,
            ..StrategyParams::default()
        };
        MomentumBreakout::new(StrategyCore::new(params, RiskManager::default()), 0.0)
    }

    fn breakout(close: f64, high_20: f64) -> FeatureRow {
        FeatureRow {
            high_20,
            sma_50: close * 0.9,
            atr_14: 1.0,
            ..flat(close)
        }
    }

    #[test]
    fn picks_strongest_breakouts_in_bull() {
        let fs = feature_set(vec![
            ("AAA", vec![breakout(110.0, 100.0)]),
            ("BBB", vec![breakout(105.0, 100.0)]),
            ("CCC", vec![breakout(120.0, 100.0)]),
            ("DDD", vec![breakout(95.0, 100.0)]),
        ]);
        let u = universe(&["AAA", "BBB", "CCC", "DDD"]);
        let mut s = strategy(2);
        let t = s.generate_signals(&fs.view(0, &u), MarketRegime::Bull);
        assert_eq!(t.keys().collect::<Vec<_>>(), vec!["AAA", "CCC"]);
        assert!(t.values().all(|w| (*w - 0.5).abs() < 1e-12));
    }

    #[test]
    fn gate_rejects_other_regimes() {
        let fs = feature_set(vec![("AAA", vec![breakout(110.0, 100.0)])]);
        let u = universe(&["AAA"]);
        let mut s = strategy(2);
        assert!(s.generate_signals(&fs.view(0, &u), MarketRegime::Neutral).is_empty());
        assert!(s.generate_signals(&fs.view(0, &u), MarketRegime::Bear).is_empty());
    }

    #[test]
    fn bear_regime_forces_exit() {
        let fs = feature_set(vec![("AAA", vec![breakout(110.0, 100.0), breakout(110.0, 100.0)])]);
        let u = universe(&["AAA"]);
        let mut s = strategy(1);
        let view = fs.view(0, &u);
        let t = s.generate_signals(&view, MarketRegime::Bull);
        let _ = s.risk_model(&t, &view, &crate::domain::PortfolioState::new(1e4), MarketRegime::Bull);
        assert!(s.open_positions().contains("AAA"));
        let exits = s.evaluate_exits(&fs.view(1, &u), MarketRegime::Bear);
        assert_eq!(exits[0].reason, ExitReason::RegimeExit);
    }

    #[test]
    fn close_below_sma50_is_trend_reversal() {
        let mut weak = breakout(110.0, 100.0);
        weak.sma_50 = 115.0;
        let fs = feature_set(vec![("AAA", vec![breakout(110.0, 100.0), weak])]);
        let u = universe(&["AAA"]);
        let mut s = strategy(1);
        let view = fs.view(0, &u);
        let t = s.generate_signals(&view, MarketRegime::Bull);
        let _ = s.risk_model(&t, &view, &crate::domain::PortfolioState::new(1e4), MarketRegime::Bull);
        let exits = s.evaluate_exits(&fs.view(1, &u), MarketRegime::Bull);
        assert_eq!(exits[0].reason, ExitReason::TrendReversal);
    }
}
