//! Position sizing and exposure limits.
//!
//! Stateless formulas: fractional Kelly sizing, ATR stops, reward:risk
//! take-profits, and per-trade / portfolio exposure validation.

use crate::domain::Direction;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reward:risk ratios below this are raised to it.
pub const MIN_REWARD_RISK: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskLimits {
    pub max_risk_per_trade: f64,
    pub max_position_size: f64,
    pub max_portfolio_exposure: f64,
    pub atr_stop_multiple: f64,
    pub min_rr_ratio: f64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_risk_per_trade: 0.02,
            max_position_size: 0.5,
            max_portfolio_exposure: 1.0,
            atr_stop_multiple: 2.0,
            min_rr_ratio: MIN_REWARD_RISK,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSize {
    pub shares: u64,
    pub kelly_fraction: f64,
    /// Currency at risk between entry and stop.
    pub risk_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RiskRejection {
    #[error("position {fraction:.4} of portfolio exceeds max position size {limit:.4}")]
    PositionTooLarge { fraction: f64, limit: f64 },

    #[error("exposure would reach {fraction:.4} of portfolio, limit {limit:.4}")]
    ExposureExceeded { fraction: f64, limit: f64 },

    #[error("portfolio value {value} is not positive")]
    NonPositivePortfolio { value: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RiskManager {
    limits: RiskLimits,
}

impl RiskManager {
    pub fn new(limits: RiskLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    /// Kelly fraction f = (p·r − (1−p)) / r.
    pub fn kelly_fraction(win_probability: f64, reward_risk: f64) -> f64 {
        if reward_risk <= 0.0 || !reward_risk.is_finite() {
            return 0.0;
        }
        (win_probability * reward_risk - (1.0 - win_probability)) / reward_risk
    }

    /// Shares to buy so that the entry→stop loss is the capped Kelly fraction
    /// of the portfolio, and the notional stays within max position size.
    pub fn position_size(
        &self,
        entry: f64,
        stop: f64,
        win_probability: f64,
        reward_risk: f64,
        portfolio_value: f64,
    ) -> PositionSize {
        let kelly = Self::kelly_fraction(win_probability, reward_risk);
        let per_share = (entry - stop).abs();
        if kelly <= 0.0 || per_share <= 0.0 || entry <= 0.0 || portfolio_value <= 0.0 {
            return PositionSize {
                shares: 0,
                kelly_fraction: kelly,
                risk_amount: 0.0,
            };
        }
        let risk_amount = kelly.min(self.limits.max_risk_per_trade) * portfolio_value;
        let by_risk = (risk_amount / per_share).floor();
        let by_size = (self.limits.max_position_size * portfolio_value / entry).floor();
        let shares = by_risk.min(by_size).max(0.0) as u64;
        PositionSize {
            shares,
            kelly_fraction: kelly,
            risk_amount: shares as f64 * per_share,
        }
    }

    /// ATR stop: entry − k·ATR for longs, entry + k·ATR for shorts. A long
    /// stop that would be non-positive is placed 1% under entry.
    pub fn stop_loss(&self, entry: f64, atr: f64, direction: Direction) -> f64 {
        let offset = self.limits.atr_stop_multiple * atr;
        match direction {
            Direction::Long => {
                let stop = entry - offset;
                if stop <= 0.0 {
                    entry * 0.99
                } else {
                    stop
                }
            }
            Direction::Short => entry + offset,
        }
    }

    /// Target at `max(rr, min_rr_ratio)` times the entry→stop distance.
    pub fn take_profit(&self, entry: f64, stop: f64, reward_risk: f64, direction: Direction) -> f64 {
        let rr = reward_risk.max(self.limits.min_rr_ratio);
        let distance = (entry - stop).abs() * rr;
        match direction {
            Direction::Long => entry + distance,
            Direction::Short => entry - distance,
        }
    }

    pub fn validate_trade(
        &self,
        position_value: f64,
        portfolio_value: f64,
        current_exposure: f64,
    ) -> Result<(), RiskRejection> {
        if portfolio_value <= 0.0 {
            return Err(RiskRejection::NonPositivePortfolio {
                value: portfolio_value,
            });
        }
        let fraction = position_value.abs() / portfolio_value;
        if fraction > self.limits.max_position_size {
            return Err(RiskRejection::PositionTooLarge {
                fraction,
                limit: self.limits.max_position_size,
            });
        }
        let total = (current_exposure.abs() + position_value.abs()) / portfolio_value;
        if total > self.limits.max_portfolio_exposure {
            return Err(RiskRejection::ExposureExceeded {
                fraction: total,
                limit: self.limits.max_portfolio_exposure,
            });
        }
        Ok(())
    }
}
