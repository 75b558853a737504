//! Simulation runner — wires together data loading, the engine, and metrics.
//!
//! Two entry points:
//! - `run_file()`: loads data for a run file, then runs. Used by the CLI.
//! - `run_config()`: takes a validated config plus pre-built features. Used by
//!   batch, walk-forward and tests to avoid reloading data per run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use regimelab_core::domain::{DatasetHash, PortfolioState, RunId, Trade};
use regimelab_core::engine::{simulate, EquityPoint, LedgerEvent, SimulationConfig, SimulationError};
use regimelab_core::features::FeatureSet;
use regimelab_core::regime::RegimePoint;

use crate::config::{RunFile, RunFileError};
use crate::data_loader::{load_features, DataError, LoadedData};
use crate::metrics::PerformanceMetrics;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("run file error: {0}")]
    RunFile(#[from] RunFileError),
    #[error("data error: {0}")]
    Data(#[from] DataError),
    #[error("simulation error: {0}")]
    Simulation(#[from] SimulationError),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Complete result of one simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub config: SimulationConfig,
    pub metrics: PerformanceMetrics,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub regime_history: Option<Vec<RegimePoint>>,
    pub events: Vec<LedgerEvent>,
    pub final_state: PortfolioState,
    #[serde(default)]
    pub dataset_hash: Option<DatasetHash>,
    #[serde(default)]
    pub has_synthetic: bool,
}

/// Compact, persistable summary of a run: identity, config and metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunHeader {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub config: SimulationConfig,
    pub metrics: BTreeMap<String, f64>,
    #[serde(default)]
    pub dataset_hash: Option<DatasetHash>,
    #[serde(default)]
    pub has_synthetic: bool,
    pub num_events: usize,
}

impl SimulationResult {
    pub fn header(&self) -> RunHeader {
        RunHeader {
            schema_version: self.schema_version,
            run_id: self.run_id.clone(),
            config: self.config.clone(),
            metrics: self.metrics.to_map(),
            dataset_hash: self.dataset_hash.clone(),
            has_synthetic: self.has_synthetic,
            num_events: self.events.len(),
        }
    }

    pub fn closed_trades(&self) -> impl Iterator<Item = &Trade> {
        self.trades.iter().filter(|t| t.is_closed())
    }

    pub fn final_equity(&self) -> f64 {
        self.final_state.equity
    }

    /// Tag the result with the dataset it ran on.
    pub fn with_provenance(mut self, loaded: &LoadedData) -> Self {
        self.dataset_hash = Some(loaded.dataset_hash.clone());
        self.has_synthetic = loaded.has_synthetic;
        self
    }
}

/// Run one validated config over pre-built features — no I/O.
pub fn run_config(
    config: &SimulationConfig,
    features: &FeatureSet,
) -> Result<SimulationResult, SimulationError> {
    let output = simulate(config, features)?;
    let metrics = PerformanceMetrics::compute(&output.equity_curve, &output.trades);
    let run_id = config.run_id();

    info!(
        run = run_id.short(),
        strategy = %config.strategy(),
        trades = metrics.num_trades,
        total_return = metrics.total_return,
        sharpe = metrics.sharpe,
        max_drawdown = metrics.max_drawdown,
        "run complete"
    );

    Ok(SimulationResult {
        schema_version: SCHEMA_VERSION,
        run_id,
        config: config.clone(),
        metrics,
        trades: output.trades,
        equity_curve: output.equity_curve,
        regime_history: output.regime_history,
        events: output.events,
        final_state: output.final_state,
        dataset_hash: None,
        has_synthetic: false,
    })
}

/// Load the data a run file names and run it.
///
/// Returns the loaded data too so callers can reuse it (walk-forward,
/// Monte-Carlo) without reloading.
pub fn run_file(file: &RunFile) -> Result<(SimulationResult, LoadedData), RunError> {
    let config = file.simulation_config()?;
    let loaded = load_features(
        &file.symbols(),
        &file.data.benchmark,
        &file.data.features,
        &file.load_options(),
    )?;
    let result = run_config(&config, &loaded.features)?.with_provenance(&loaded);
    Ok((result, loaded))
}
