//! Simulation engine: config, costs, ledger and the date loop.

pub mod config;
pub mod costs;
pub mod ledger;
pub mod loop_runner;

pub use config::{ConfigError, SimulationConfig, SimulationConfigBuilder, SizingMode};
pub use costs::{CostModel, OrderSide};
pub use ledger::{EquityPoint, LedgerEvent, LedgerParts, PortfolioLedger, SkipReason};
pub use loop_runner::{run_simulation, simulate};

use crate::domain::{PortfolioState, Trade};
use crate::regime::RegimePoint;
use crate::strategy::ParamError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("strategy construction failed: {0}")]
    Strategy(#[from] ParamError),
}

/// Raw output of one simulation run, before metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutput {
    pub equity_curve: Vec<EquityPoint>,
    /// Every trade in entry order; open trades have no exit.
    pub trades: Vec<Trade>,
    pub regime_history: Option<Vec<RegimePoint>>,
    pub events: Vec<LedgerEvent>,
    pub final_state: PortfolioState,
}

impl RunOutput {
    pub fn closed_trades(&self) -> impl Iterator<Item = &Trade> {
        self.trades.iter().filter(|t| t.is_closed())
    }
}
