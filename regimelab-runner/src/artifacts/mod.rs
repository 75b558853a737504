//! Artifact manager for persisting run outputs.
//!
//! Layout under the output directory:
//! ```text
//! <run_id short>/
//!   run.json       RunHeader (run id, config, metrics map, provenance)
//!   trades.csv     trade log
//!   equity.csv     equity curve with drawdown
//!   regimes.csv    regime history (when recorded)
//!   events.json    skipped trades and state desyncs
//! ```

mod equity;
mod trades;

use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::runner::SimulationResult;

pub use equity::{write_equity_csv, write_regimes_csv};
pub use trades::write_trades_csv;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to create directory {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to serialize {what}: {source}")]
    Json {
        what: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Artifact paths returned after export.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub run_dir: PathBuf,
    pub run_json: PathBuf,
    pub trades_csv: PathBuf,
    pub equity_csv: PathBuf,
    pub regimes_csv: Option<PathBuf>,
    pub events_json: PathBuf,
}

/// Manages writing all artifacts for a run.
#[derive(Debug, Clone)]
pub struct ArtifactManager {
    output_dir: PathBuf,
}

impl ArtifactManager {
    pub fn new(output_dir: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let output_dir = output_dir.as_ref().to_path_buf();
        create_dir(&output_dir)?;
        Ok(Self { output_dir })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn run_dir(&self, result: &SimulationResult) -> PathBuf {
        self.output_dir.join(result.run_id.short())
    }

    /// Save complete run artifacts.
    pub fn save_run(&self, result: &SimulationResult) -> Result<ArtifactPaths, ArtifactError> {
        let run_dir = self.run_dir(result);
        create_dir(&run_dir)?;

        let run_json = run_dir.join("run.json");
        write_json(&run_json, "run header", &result.header())?;

        let trades_csv = run_dir.join("trades.csv");
        write_trades_csv(&trades_csv, &result.trades)?;

        let equity_csv = run_dir.join("equity.csv");
        write_equity_csv(&equity_csv, &result.equity_curve)?;

        let regimes_csv = match &result.regime_history {
            Some(history) => {
                let path = run_dir.join("regimes.csv");
                write_regimes_csv(&path, history)?;
                Some(path)
            }
            None => None,
        };

        let events_json = run_dir.join("events.json");
        write_json(&events_json, "ledger events", &result.events)?;

        info!(run = result.run_id.short(), dir = %run_dir.display(), "artifacts written");
        Ok(ArtifactPaths {
            run_dir,
            run_json,
            trades_csv,
            equity_csv,
            regimes_csv,
            events_json,
        })
    }

    /// Save an extra report (walk-forward, Monte-Carlo) next to a run's artifacts.
    pub fn save_report<T: Serialize>(
        &self,
        result: &SimulationResult,
        name: &str,
        report: &T,
    ) -> Result<PathBuf, ArtifactError> {
        let run_dir = self.run_dir(result);
        create_dir(&run_dir)?;
        let path = run_dir.join(format!("{name}.json"));
        write_json(&path, name, report)?;
        Ok(path)
    }
}

fn create_dir(path: &Path) -> Result<(), ArtifactError> {
    std::fs::create_dir_all(path).map_err(|source| ArtifactError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

/// Pretty JSON to `path`.
pub fn write_json<T: Serialize + ?Sized>(
    path: &Path,
    what: &str,
    value: &T,
) -> Result<(), ArtifactError> {
    let json = serde_json::to_string_pretty(value).map_err(|source| ArtifactError::Json {
        what: what.to_string(),
        source,
    })?;
    std::fs::write(path, json).map_err(|source| ArtifactError::Write {
        path: path.to_path_buf(),
        source,
    })
}
