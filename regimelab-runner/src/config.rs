//! Run files: a TOML description of one simulation plus its data source and
//! optional walk-forward / Monte-Carlo settings.
//!
//! ```toml
//! [simulation]
//! start = "2021-01-04"
//! end = "2023-12-29"
//! initial_cash = 100000.0
//! commission_rate = 0.0005
//!
//! [strategy]
//! kind = "momentum_breakout"
//!
//! [strategy.params]
//! top_k = 5
//!
//! [data]
//! universe = ["AAPL", "MSFT"]
//! benchmark = "SPY"
//! csv_dir = "data"
//! ```

use crate::data_loader::LoadOptions;
use crate::monte_carlo::MonteCarloConfig;
use crate::walk_forward::WalkForwardConfig;
use chrono::NaiveDate;
use regimelab_core::engine::{ConfigError, SimulationConfig, SimulationConfigBuilder, SizingMode};
use regimelab_core::features::FeatureSpec;
use regimelab_core::regime::RegimeClassifier;
use regimelab_core::risk::RiskLimits;
use regimelab_core::strategy::{StrategyKind, StrategyKnobs, StrategyParams};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunFileError {
    #[error("failed to read run file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse run file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize run file: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid run configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Top-level run file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFile {
    pub simulation: SimulationSection,
    pub strategy: StrategySection,
    #[serde(default)]
    pub risk: RiskLimits,
    pub data: DataSection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub walk_forward: Option<WalkForwardConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monte_carlo: Option<MonteCarloConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSection {
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
    pub sizing: SizingMode,
    #[serde(default)]
    pub regime: RegimeSection,
    #[serde(default = "default_true")]
    pub record_regimes: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeSection {
    pub ma_window: usize,
    pub slope_lookback: usize,
}

impl Default for RegimeSection {
    fn default() -> Self {
        let c = RegimeClassifier::default();
        Self {
            ma_window: c.ma_window(),
            slope_lookback: c.slope_lookback(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySection {
    pub kind: StrategyKind,
    #[serde(default)]
    pub params: StrategyParams,
    #[serde(default)]
    pub knobs: StrategyKnobs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSection {
    pub universe: Vec<String>,
    #[serde(default = "default_benchmark")]
    pub benchmark: String,
    /// Directory holding one `<SYMBOL>.csv` per symbol.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csv_dir: Option<PathBuf>,
    /// Generate seeded random-walk bars for symbols without a CSV file.
    #[serde(default)]
    pub synthetic: bool,
    #[serde(default)]
    pub seed: u64,
    /// First date of synthetic history; defaults to one year before `simulation.start`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_start: Option<NaiveDate>,
    #[serde(default)]
    pub features: FeatureSpec,
}

fn default_initial_cash() -> f64 {
    100_000.0
}

fn default_true() -> bool {
    true
}

fn default_benchmark() -> String {
    "SPY".to_string()
}

impl RunFile {
    pub fn from_file(path: &Path) -> Result<Self, RunFileError> {
        let content = std::fs::read_to_string(path).map_err(|source| RunFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, RunFileError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String, RunFileError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validated engine configuration.
    pub fn simulation_config(&self) -> Result<SimulationConfig, RunFileError> {
        let sim = &self.simulation;
        let builder = SimulationConfigBuilder {
            strategy: self.strategy.kind,
            params: self.strategy.params,
            knobs: self.strategy.knobs.clone(),
            risk: self.risk,
            sizing: sim.sizing,
            regime: RegimeClassifier::new(sim.regime.ma_window, sim.regime.slope_lookback),
            record_regimes: sim.record_regimes,
            ..SimulationConfigBuilder::new(
                self.strategy.kind,
                self.data.universe.clone(),
                self.data.benchmark.clone(),
                sim.start,
                sim.end,
            )
        }
        .initial_cash(sim.initial_cash)
        .costs(sim.commission_rate, sim.commission_flat, sim.slippage_rate);
        Ok(builder.build()?)
    }

    /// Loader options for this run's universe plus benchmark.
    pub fn load_options(&self) -> LoadOptions {
        let history_start = self
            .data
            .history_start
            .unwrap_or(self.simulation.start - chrono::Duration::days(365));
        LoadOptions {
            start: history_start,
            end: self.simulation.end,
            csv_dir: self.data.csv_dir.clone(),
            synthetic: self.data.synthetic,
            seed: self.data.seed,
        }
    }

    /// Universe plus benchmark, deduplicated, in file order.
    pub fn symbols(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::with_capacity(self.data.universe.len() + 1);
        for s in self.data.universe.iter().chain(std::iter::once(&self.data.benchmark)) {
            if !out.contains(s) {
                out.push(s.clone());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [simulation]
        start = "2022-01-03"
        end = "2022-12-30"

        [strategy]
        kind = "mean_reversion"

        [data]
        universe = ["AAA", "BBB"]
    "#;

    #[test]
    fn minimal_file_fills_defaults() {
        let file = RunFile::from_toml(MINIMAL).unwrap();
        assert_eq!(file.simulation.initial_cash, 100_000.0);
        assert_eq!(file.data.benchmark, "SPY");
        assert_eq!(file.strategy.params, StrategyParams::default());
        assert_eq!(file.risk, RiskLimits::default());
        assert!(file.walk_forward.is_none());

        let config = file.simulation_config().unwrap();
        assert_eq!(config.strategy(), StrategyKind::MeanReversion);
        assert_eq!(config.universe(), ["AAA".to_string(), "BBB".to_string()]);
        assert!(config.record_regimes());
    }

    #[test]
    fn full_file_maps_every_section() {
        let text = r#"
            [simulation]
            start = "2022-01-03"
            end = "2022-12-30"
            initial_cash = 50000.0
            commission_rate = 0.001
            commission_flat = 1.0
            slippage_rate = 0.0005
            record_regimes = false

            [simulation.sizing]
            mode = "kelly"
            win_probability = 0.55

            [simulation.regime]
            ma_window = 100
            slope_lookback = 10

            [strategy]
            kind = "short_momentum"

            [strategy.params]
            top_k = 3
            holding_period_days = 10

            [strategy.knobs]
            min_breakdown = 0.01

            [risk]
            max_position_size = 0.25

            [data]
            universe = ["AAA"]
            benchmark = "QQQ"
            synthetic = true
            seed = 9
        "#;
        let file = RunFile::from_toml(text).unwrap();
        let config = file.simulation_config().unwrap();
        assert_eq!(config.initial_cash(), 50_000.0);
        assert_eq!(config.commission_rate(), 0.001);
        assert_eq!(config.sizing(), SizingMode::Kelly { win_probability: 0.55 });
        assert_eq!(config.regime().ma_window(), 100);
        assert_eq!(config.params().top_k, 3);
        assert_eq!(config.params().holding_period_days, 10);
        assert_eq!(config.knobs().get("min_breakdown"), Some(&0.01));
        assert_eq!(config.risk().max_position_size, 0.25);
        assert_eq!(config.benchmark(), "QQQ");
        assert!(!config.record_regimes());
        assert_eq!(file.symbols(), vec!["AAA".to_string(), "QQQ".to_string()]);
    }

    #[test]
    fn invalid_dates_are_rejected_at_conversion() {
        let text = MINIMAL.replace("2022-12-30", "2021-12-30");
        let file = RunFile::from_toml(&text).unwrap();
        assert!(matches!(
            file.simulation_config(),
            Err(RunFileError::Config(ConfigError::InvalidDateRange { .. }))
        ));
    }

    #[test]
    fn unknown_strategy_is_a_parse_error() {
        let text = MINIMAL.replace("mean_reversion", "martingale");
        assert!(matches!(RunFile::from_toml(&text), Err(RunFileError::Parse(_))));
    }

    #[test]
    fn toml_round_trip() {
        let file = RunFile::from_toml(MINIMAL).unwrap();
        let again = RunFile::from_toml(&file.to_toml().unwrap()).unwrap();
        assert_eq!(file, again);
    }

    #[test]
    fn history_starts_a_year_early_by_default() {
        let file = RunFile::from_toml(MINIMAL).unwrap();
        let opts = file.load_options();
        assert_eq!(opts.start, NaiveDate::from_ymd_opt(2021, 1, 3).unwrap());
        assert_eq!(opts.end, file.simulation.end);
    }
}
