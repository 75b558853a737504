//! Validated simulation configuration.
//!
//! `SimulationConfigBuilder` is the plain, serializable draft; `build()`
//! validates it into an immutable `SimulationConfig`. Deserializing a
//! `SimulationConfig` goes through the same validation.

use crate::domain::RunId;
use crate::regime::RegimeClassifier;
use crate::risk::RiskLimits;
use crate::strategy::{validate_knobs, ParamError, StrategyKind, StrategyKnobs, StrategyParams};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("universe must contain at least one symbol")]
    EmptyUniverse,

    #[error("benchmark symbol must not be empty")]
    EmptyBenchmark,

    #[error("start date {start} must be before end date {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("initial cash must be > 0, got {0}")]
    NonPositiveCash(f64),

    #[error("{name} must be finite and >= 0, got {value}")]
    NegativeRate { name: &'static str, value: f64 },

    #[error("risk limit {name} must be finite and > 0, got {value}")]
    InvalidRiskLimit { name: &'static str, value: f64 },

    #[error("win probability must be in (0, 1), got {0}")]
    InvalidWinProbability(f64),

    #[error("regime windows must be >= 1")]
    InvalidRegimeWindow,

    #[error(transparent)]
    Params(#[from] ParamError),
}

/// How entry share counts are derived.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SizingMode {
    /// shares = floor(|weight| × equity / fill price).
    #[default]
    TargetWeight,
    /// Fractional Kelly with the position's stop, capped by the weight-implied size.
    Kelly { win_probability: f64 },
}

/// Draft configuration with every field public.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfigBuilder {
    pub strategy: StrategyKind,
    #[serde(default)]
    pub params: StrategyParams,
    #[serde(default)]
    pub knobs: StrategyKnobs,
    pub universe: Vec<String>,
    pub benchmark: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    #[serde(default = "default_initial_cash")]
    pub initial_cash: f64,
    #[serde(default)]
    pub commission_rate: f64,
    #[serde(default)]
    pub commission_flat: f64,
    #[serde(default)]
    pub slippage_rate: f64,
    #[serde(default)]
    pub risk: RiskLimits,
    #[serde(default)]
    pub sizing: SizingMode,
    #[serde(default)]
    pub regime: RegimeClassifier,
    #[serde(default)]
    pub record_regimes: bool,
}

fn default_initial_cash() -> f64 {
    100_000.0
}

impl SimulationConfigBuilder {
    pub fn new(
        strategy: StrategyKind,
        universe: Vec<String>,
        benchmark: impl Into<String>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Self {
        Self {
            strategy,
            params: StrategyParams::default(),
            knobs: StrategyKnobs::new(),
            universe,
            benchmark: benchmark.into(),
            start,
            end,
            initial_cash: default_initial_cash(),
            commission_rate: 0.0,
            commission_flat: 0.0,
            slippage_rate: 0.0,
            risk: RiskLimits::default(),
            sizing: SizingMode::default(),
            regime: RegimeClassifier::default(),
            record_regimes: false,
        }
    }

    pub fn params(mut self, params: StrategyParams) -> Self {
        self.params = params;
        self
    }

    pub fn knob(mut self, name: impl Into<String>, value: f64) -> Self {
        self.knobs.insert(name.into(), value);
        self
    }

    pub fn initial_cash(mut self, cash: f64) -> Self {
        self.initial_cash = cash;
        self
    }

    pub fn costs(mut self, commission_rate: f64, commission_flat: f64, slippage_rate: f64) -> Self {
        self.commission_rate = commission_rate;
        self.commission_flat = commission_flat;
        self.slippage_rate = slippage_rate;
        self
    }

    pub fn risk(mut self, risk: RiskLimits) -> Self {
        self.risk = risk;
        self
    }

    pub fn sizing(mut self, sizing: SizingMode) -> Self {
        self.sizing = sizing;
        self
    }

    pub fn regime(mut self, regime: RegimeClassifier) -> Self {
        self.regime = regime;
        self
    }

    pub fn record_regimes(mut self, record: bool) -> Self {
        self.record_regimes = record;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.universe.is_empty() || self.universe.iter().any(|s| s.trim().is_empty()) {
            return Err(ConfigError::EmptyUniverse);
        }
        if self.benchmark.trim().is_empty() {
            return Err(ConfigError::EmptyBenchmark);
        }
        if self.start >= self.end {
            return Err(ConfigError::InvalidDateRange {
                start: self.start,
                end: self.end,
            });
        }
        if !(self.initial_cash.is_finite() && self.initial_cash > 0.0) {
            return Err(ConfigError::NonPositiveCash(self.initial_cash));
        }
        for (name, value) in [
            ("commission_rate", self.commission_rate),
            ("commission_flat", self.commission_flat),
            ("slippage_rate", self.slippage_rate),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::NegativeRate { name, value });
            }
        }
        for (name, value) in [
            ("max_risk_per_trade", self.risk.max_risk_per_trade),
            ("max_position_size", self.risk.max_position_size),
            ("max_portfolio_exposure", self.risk.max_portfolio_exposure),
            ("atr_stop_multiple", self.risk.atr_stop_multiple),
            ("min_rr_ratio", self.risk.min_rr_ratio),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidRiskLimit { name, value });
            }
        }
        if let SizingMode::Kelly { win_probability } = self.sizing {
            if !(win_probability > 0.0 && win_probability < 1.0) {
                return Err(ConfigError::InvalidWinProbability(win_probability));
            }
        }
        if self.regime.ma_window() == 0 || self.regime.slope_lookback() == 0 {
            return Err(ConfigError::InvalidRegimeWindow);
        }
        self.params.validate()?;
        validate_knobs(self.strategy, &self.knobs)?;
        Ok(())
    }

    pub fn build(self) -> Result<SimulationConfig, ConfigError> {
        self.validate()?;
        Ok(SimulationConfig { inner: self })
    }
}

/// Immutable, validated run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SimulationConfigBuilder", into = "SimulationConfigBuilder")]
pub struct SimulationConfig {
    inner: SimulationConfigBuilder,
}

impl TryFrom<SimulationConfigBuilder> for SimulationConfig {
    type Error = ConfigError;

    fn try_from(draft: SimulationConfigBuilder) -> Result<Self, Self::Error> {
        draft.build()
    }
}

impl From<SimulationConfig> for SimulationConfigBuilder {
    fn from(config: SimulationConfig) -> Self {
        config.inner
    }
}

impl SimulationConfig {
    /// Copy of the draft, for deriving variants (other windows, other params).
    pub fn to_builder(&self) -> SimulationConfigBuilder {
        self.inner.clone()
    }

    /// Same config over another date window.
    pub fn with_window(&self, start: NaiveDate, end: NaiveDate) -> Result<Self, ConfigError> {
        SimulationConfigBuilder {
            start,
            end,
            ..self.to_builder()
        }
        .build()
    }

    /// Deterministic run id: BLAKE3 of the canonical JSON encoding.
    pub fn run_id(&self) -> RunId {
        let json = serde_json::to_vec(&self.inner).unwrap_or_default();
        RunId::from_bytes(&json)
    }

    pub fn strategy(&self) -> StrategyKind {
        self.inner.strategy
    }

    pub fn params(&self) -> &StrategyParams {
        &self.inner.params
    }

    pub fn knobs(&self) -> &StrategyKnobs {
        &self.inner.knobs
    }

    pub fn universe(&self) -> &[String] {
        &self.inner.universe
    }

    pub fn benchmark(&self) -> &str {
        &self.inner.benchmark
    }

    pub fn start(&self) -> NaiveDate {
        self.inner.start
    }

    pub fn end(&self) -> NaiveDate {
        self.inner.end
    }

    pub fn initial_cash(&self) -> f64 {
        self.inner.initial_cash
    }

    pub fn commission_rate(&self) -> f64 {
        self.inner.commission_rate
    }

    pub fn commission_flat(&self) -> f64 {
        self.inner.commission_flat
    }

    pub fn slippage_rate(&self) -> f64 {
        self.inner.slippage_rate
    }

    pub fn risk(&self) -> &RiskLimits {
        &self.inner.risk
    }

    pub fn sizing(&self) -> SizingMode {
        self.inner.sizing
    }

    pub fn regime(&self) -> &RegimeClassifier {
        &self.inner.regime
    }

    pub fn record_regimes(&self) -> bool {
        self.inner.record_regimes
    }
}
