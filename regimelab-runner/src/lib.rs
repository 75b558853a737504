//! RegimeLab Runner — run orchestration on top of `regimelab-core`.
//!
//! This crate provides:
//! - TOML run files converted to validated simulation configs
//! - Data loading from CSV with a seeded synthetic fallback
//! - Single runs with performance metrics, and parallel batches
//! - Walk-forward validation over a parameter grid
//! - Monte-Carlo resampling with probability of ruin
//! - Artifact export (run.json, trades.csv, equity.csv)

pub mod artifacts;
pub mod batch;
pub mod config;
pub mod data_loader;
pub mod fitness;
pub mod metrics;
pub mod monte_carlo;
pub mod rng;
pub mod runner;
pub mod walk_forward;

pub use artifacts::{ArtifactError, ArtifactManager, ArtifactPaths};
pub use batch::{best_by, run_batch, BatchRunner, ParamGrid};
pub use config::{RunFile, RunFileError};
pub use data_loader::{load_features, DataError, LoadOptions, LoadedData};
pub use fitness::FitnessMetric;
pub use metrics::PerformanceMetrics;
pub use monte_carlo::{
    run_monte_carlo, MonteCarloConfig, MonteCarloError, MonteCarloResult, Percentiles,
    ResampleSource,
};
pub use rng::RngHierarchy;
pub use runner::{run_config, run_file, RunError, RunHeader, SimulationResult};
pub use walk_forward::{
    run_walk_forward, DegradationFlag, WalkForwardConfig, WalkForwardError, WalkForwardResult,
};
