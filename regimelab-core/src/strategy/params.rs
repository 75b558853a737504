//! Strategy identity and shared parameters.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamError {
    #[error("top_k must be >= 1")]
    TopK,

    #[error("holding_period_days must be >= 1")]
    HoldingPeriod,

    #[error("take_profit_multiplier must be > 1.0, got {0}")]
    TakeProfitMultiplier(f64),

    #[error("{name} must be in (0, 1], got {value}")]
    RiskBudget { name: &'static str, value: f64 },

    #[error("unknown strategy '{0}'")]
    UnknownStrategy(String),

    #[error("invalid value {value} for '{name}': {reason}")]
    InvalidKnob {
        name: String,
        value: f64,
        reason: &'static str,
    },
}

/// The six strategy variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    MomentumBreakout,
    MeanReversion,
    TrendFollowing,
    ShortMomentum,
    RangeReversion,
    RelativeStrength,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 6] = [
        StrategyKind::MomentumBreakout,
        StrategyKind::MeanReversion,
        StrategyKind::TrendFollowing,
        StrategyKind::ShortMomentum,
        StrategyKind::RangeReversion,
        StrategyKind::RelativeStrength,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::MomentumBreakout => "momentum_breakout",
            StrategyKind::MeanReversion => "mean_reversion",
            StrategyKind::TrendFollowing => "trend_following",
            StrategyKind::ShortMomentum => "short_momentum",
            StrategyKind::RangeReversion => "range_reversion",
            StrategyKind::RelativeStrength => "relative_strength",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        StrategyKind::ALL
            .into_iter()
            .find(|k| k.as_str() == wanted)
            .ok_or_else(|| ParamError::UnknownStrategy(s.to_string()))
    }
}

/// Parameters every variant shares.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyParams {
    pub top_k: usize,
    pub holding_period_days: u32,
    /// Reward:risk multiple of the stop distance used for take-profit levels.
    pub take_profit_multiplier: f64,
    /// Gross weight budget in the variant's favored regime.
    pub normal_risk_budget: f64,
    /// Gross weight budget in any other regime.
    pub defensive_risk_budget: f64,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            top_k: 5,
            holding_period_days: 20,
            take_profit_multiplier: 2.0,
            normal_risk_budget: 1.0,
            defensive_risk_budget: 0.5,
        }
    }
}

impl StrategyParams {
    pub fn new(
        top_k: usize,
        holding_period_days: u32,
        take_profit_multiplier: f64,
        normal_risk_budget: f64,
        defensive_risk_budget: f64,
    ) -> Result<Self, ParamError> {
        let params = Self {
            top_k,
            holding_period_days,
            take_profit_multiplier,
            normal_risk_budget,
            defensive_risk_budget,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), ParamError> {
        if self.top_k == 0 {
            return Err(ParamError::TopK);
        }
        if self.holding_period_days == 0 {
            return Err(ParamError::HoldingPeriod);
        }
        if self.take_profit_multiplier.is_nan() || self.take_profit_multiplier <= 1.0 {
            return Err(ParamError::TakeProfitMultiplier(self.take_profit_multiplier));
        }
        for (name, value) in [
            ("normal_risk_budget", self.normal_risk_budget),
            ("defensive_risk_budget", self.defensive_risk_budget),
        ] {
            if value.is_nan() || value <= 0.0 || value > 1.0 {
                return Err(ParamError::RiskBudget { name, value });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(StrategyParams::default().validate().is_ok());
    }

    #[test]
    fn rejects_bad_params() {
        assert_eq!(StrategyParams::new(0, 10, 2.0, 1.0, 0.5), Err(ParamError::TopK));
        assert_eq!(
            StrategyParams::new(2, 0, 2.0, 1.0, 0.5),
            Err(ParamError::HoldingPeriod)
        );
        assert!(matches!(
            StrategyParams::new(2, 10, 1.0, 1.0, 0.5),
            Err(ParamError::TakeProfitMultiplier(_))
        ));
        assert!(matches!(
            StrategyParams::new(2, 10, 2.0, 1.5, 0.5),
            Err(ParamError::RiskBudget { name: "normal_risk_budget", .. })
        ));
        assert!(StrategyParams::new(2, 10, 2.0, 1.0, 0.0).is_err());
    }

    #[test]
    fn kind_parses_loosely() {
        assert_eq!("Momentum-Breakout".parse::<StrategyKind>(), Ok(StrategyKind::MomentumBreakout));
        assert!("nope".parse::<StrategyKind>().is_err());
        for k in StrategyKind::ALL {
            assert_eq!(k.as_str().parse::<StrategyKind>(), Ok(k));
        }
    }
}
