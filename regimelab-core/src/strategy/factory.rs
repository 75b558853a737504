//! Factory: builds a boxed strategy from its kind, shared params and knobs.
//!
//! Variant knobs and their defaults:
//!
//! | Variant | Knob | Default |
//! |---|---|---|
//! | momentum_breakout | `min_breakout` | 0.0 |
//! | mean_reversion | `rsi_oversold`, `rsi_exit` | 30, 55 |
//! | trend_following | `min_spread` | 0.0 |
//! | short_momentum | `min_breakdown` | 0.0 |
//! | range_reversion | `min_penetration` | 0.0 |
//! | relative_strength | `min_rel_strength` | 1.0 |

use super::{
    MeanReversion, MomentumBreakout, ParamError, RangeReversion, RelativeStrength, ShortMomentum,
    Strategy, StrategyCore, StrategyKind, StrategyParams, TrendFollowing,
};
use crate::risk::{RiskLimits, RiskManager};
use std::collections::BTreeMap;

/// Free-form variant parameters (name → value).
pub type StrategyKnobs = BTreeMap<String, f64>;

// ─── Helpers ─────────────────────────────────────────────────────────

/// Extract a named knob, falling back to `default`.
fn knob(knobs: &StrategyKnobs, name: &str, default: f64) -> f64 {
    knobs.get(name).copied().unwrap_or(default)
}

/// A knob that must be finite and non-negative.
fn threshold(knobs: &StrategyKnobs, name: &str, default: f64) -> Result<f64, ParamError> {
    let value = knob(knobs, name, default);
    if !value.is_finite() || value < 0.0 {
        return Err(ParamError::InvalidKnob {
            name: name.to_string(),
            value,
            reason: "must be finite and >= 0",
        });
    }
    Ok(value)
}

fn rsi_level(knobs: &StrategyKnobs, name: &str, default: f64) -> Result<f64, ParamError> {
    let value = knob(knobs, name, default);
    if !(0.0..=100.0).contains(&value) {
        return Err(ParamError::InvalidKnob {
            name: name.to_string(),
            value,
            reason: "RSI level must be within [0, 100]",
        });
    }
    Ok(value)
}

// ─── Knob resolution ─────────────────────────────────────────────────

/// Validated variant knobs, defaults filled in.
enum Tuning {
    Threshold(f64),
    Rsi { oversold: f64, exit: f64 },
}

fn resolve(kind: StrategyKind, knobs: &StrategyKnobs) -> Result<Tuning, ParamError> {
    let tuning = match kind {
        StrategyKind::MomentumBreakout => Tuning::Threshold(threshold(knobs, "min_breakout", 0.0)?),
        StrategyKind::MeanReversion => {
            let oversold = rsi_level(knobs, "rsi_oversold", 30.0)?;
            let exit = rsi_level(knobs, "rsi_exit", 55.0)?;
            if exit <= oversold {
                return Err(ParamError::InvalidKnob {
                    name: "rsi_exit".into(),
                    value: exit,
                    reason: "must be above rsi_oversold",
                });
            }
            Tuning::Rsi { oversold, exit }
        }
        StrategyKind::TrendFollowing => Tuning::Threshold(threshold(knobs, "min_spread", 0.0)?),
        StrategyKind::ShortMomentum => Tuning::Threshold(threshold(knobs, "min_breakdown", 0.0)?),
        StrategyKind::RangeReversion => Tuning::Threshold(threshold(knobs, "min_penetration", 0.0)?),
        StrategyKind::RelativeStrength => {
            Tuning::Threshold(threshold(knobs, "min_rel_strength", 1.0)?)
        }
    };
    Ok(tuning)
}

/// Check a variant's knobs without building the strategy.
pub fn validate_knobs(kind: StrategyKind, knobs: &StrategyKnobs) -> Result<(), ParamError> {
    resolve(kind, knobs).map(|_| ())
}

// ─── Strategy factory ────────────────────────────────────────────────

/// Build a fresh strategy instance with an empty position book.
pub fn create_strategy(
    kind: StrategyKind,
    params: StrategyParams,
    knobs: &StrategyKnobs,
    limits: RiskLimits,
) -> Result<Box<dyn Strategy>, ParamError> {
    params.validate()?;
    let tuning = resolve(kind, knobs)?;
    let core = StrategyCore::new(params, RiskManager::new(limits));
    let strategy: Box<dyn Strategy> = match (kind, tuning) {
        (StrategyKind::MeanReversion, Tuning::Rsi { oversold, exit }) => {
            Box::new(MeanReversion::new(core, oversold, exit))
        }
        (StrategyKind::MomentumBreakout, Tuning::Threshold(min)) => {
            Box::new(MomentumBreakout::new(core, min))
        }
        (StrategyKind::TrendFollowing, Tuning::Threshold(min)) => {
            Box::new(TrendFollowing::new(core, min))
        }
        (StrategyKind::ShortMomentum, Tuning::Threshold(min)) => {
            Box::new(ShortMomentum::new(core, min))
        }
        (StrategyKind::RangeReversion, Tuning::Threshold(min)) => {
            Box::new(RangeReversion::new(core, min))
        }
        (StrategyKind::RelativeStrength, Tuning::Threshold(min)) => {
            Box::new(RelativeStrength::new(core, min))
        }
        (kind, _) => return Err(ParamError::UnknownStrategy(kind.as_str().to_string())),
    };
    Ok(strategy)
}
