//! Walk-forward validation — train/test fold splitting and OOS evaluation.
//!
//! Splits the run's date range into train (in-sample, IS) windows followed by
//! test (out-of-sample, OOS) windows. In each fold every parameter combination
//! of the grid runs on the train window; the best by the fitness metric is
//! then run once on the test window. The degradation ratio (mean OOS fitness /
//! mean IS fitness) flags overfitting.
//!
//! Features are computed over the full history once; windows only move the
//! simulation start and end, so indicators are warm at every window start.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use regimelab_core::engine::{ConfigError, SimulationConfig, SimulationError};
use regimelab_core::features::FeatureSet;
use regimelab_core::strategy::{StrategyKnobs, StrategyParams};

use crate::batch::{best_by, BatchRunner, ParamGrid};
use crate::fitness::FitnessMetric;
use crate::runner::run_config;

// ─── Configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkForwardConfig {
    /// Bars per train window (default 252 = 1 year).
    pub train_bars: usize,
    /// Bars per test window (default 63 = 1 quarter).
    pub test_bars: usize,
    /// Bars between fold starts; defaults to `test_bars` (contiguous OOS).
    pub step_bars: Option<usize>,
    /// Keep every train window starting at the first bar (expanding window).
    pub anchored: bool,
    pub fitness: FitnessMetric,
    pub grid: ParamGrid,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            train_bars: 252,
            test_bars: 63,
            step_bars: None,
            anchored: false,
            fitness: FitnessMetric::Sharpe,
            grid: ParamGrid::default(),
        }
    }
}

impl WalkForwardConfig {
    fn step(&self) -> usize {
        self.step_bars.unwrap_or(self.test_bars)
    }
}

// ─── Result types ────────────────────────────────────────────────────

/// Bar index ranges of one fold, relative to the run's first date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldSpec {
    pub fold_index: usize,
    /// Train start bar index (inclusive).
    pub is_start: usize,
    /// Train end bar index (exclusive).
    pub is_end: usize,
    /// Test start bar index (inclusive).
    pub oos_start: usize,
    /// Test end bar index (exclusive).
    pub oos_end: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoldResult {
    pub fold_index: usize,
    pub train_start: NaiveDate,
    pub train_end: NaiveDate,
    pub test_start: NaiveDate,
    pub test_end: NaiveDate,
    /// Parameters chosen on the train window.
    pub params: StrategyParams,
    pub knobs: StrategyKnobs,
    pub is_fitness: f64,
    pub oos_fitness: f64,
    pub oos_return: f64,
    pub is_trades: usize,
    pub oos_trades: usize,
    pub candidates: usize,
    pub failed_candidates: usize,
}

/// How the degradation ratio was computed (or why it wasn't).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DegradationFlag {
    /// IS >= 0.1, ratio computed normally.
    Normal,
    /// IS < 0.1, using difference metric (OOS - IS) instead.
    LowIsSharpe,
    /// IS is negative, ratio skipped entirely.
    NegativeIsSharpe,
    /// IS positive (>= 0.1) but OOS negative: clamped to 0.0.
    FailedOos,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkForwardResult {
    pub fitness: FitnessMetric,
    pub fold_results: Vec<FoldResult>,
    pub mean_is_fitness: f64,
    pub mean_oos_fitness: f64,
    /// Degradation ratio: mean OOS / mean IS. None when it cannot be
    /// computed (see `degradation_flag`).
    pub degradation_ratio: Option<f64>,
    pub degradation_flag: DegradationFlag,
    /// Test-window returns compounded across folds.
    pub stitched_oos_return: f64,
}

#[derive(Debug, Error)]
pub enum WalkForwardError {
    #[error("insufficient data: {total_bars} bars < minimum {min_bars}")]
    InsufficientData { total_bars: usize, min_bars: usize },

    #[error("train and test windows need at least 2 bars and a step of at least 1")]
    InvalidWindows,

    #[error("no feature dates between {start} and {end}")]
    EmptyRange { start: NaiveDate, end: NaiveDate },

    #[error("window error on fold {fold}: {source}")]
    Window {
        fold: usize,
        #[source]
        source: ConfigError,
    },

    #[error("no parameter combination completed on fold {fold} ({failed} failed)")]
    NoViableCandidate { fold: usize, failed: usize },

    #[error("test run failed on fold {fold}: {source}")]
    TestFailed {
        fold: usize,
        #[source]
        source: SimulationError,
    },
}

// ─── Fold creation ───────────────────────────────────────────────────

/// Create walk-forward fold specifications over `total_bars` bars.
///
/// Rolling (default): every fold trains on `train_bars` bars and tests on the
/// next `test_bars`; fold starts advance by the step. Anchored: train windows
/// all start at bar 0 and grow by one step per fold.
pub fn create_folds(
    total_bars: usize,
    config: &WalkForwardConfig,
) -> Result<Vec<FoldSpec>, WalkForwardError> {
    if config.train_bars < 2 || config.test_bars < 2 || config.step() == 0 {
        return Err(WalkForwardError::InvalidWindows);
    }
    let min_bars = config.train_bars + config.test_bars;
    if total_bars < min_bars {
        return Err(WalkForwardError::InsufficientData {
            total_bars,
            min_bars,
        });
    }

    let mut folds = Vec::new();
    let mut offset = 0;
    while offset + min_bars <= total_bars {
        let is_end = offset + config.train_bars;
        folds.push(FoldSpec {
            fold_index: folds.len(),
            is_start: if config.anchored { 0 } else { offset },
            is_end,
            oos_start: is_end,
            oos_end: is_end + config.test_bars,
        });
        offset += config.step();
    }
    Ok(folds)
}

// ─── Walk-forward orchestration ──────────────────────────────────────

/// Run walk-forward validation over `base`'s date range.
pub fn run_walk_forward(
    base: &SimulationConfig,
    features: &FeatureSet,
    config: &WalkForwardConfig,
) -> Result<WalkForwardResult, WalkForwardError> {
    let range = features
        .index_range(base.start(), base.end())
        .ok_or(WalkForwardError::EmptyRange {
            start: base.start(),
            end: base.end(),
        })?;
    let dates = &features.dates()[range];
    let folds = create_folds(dates.len(), config)?;
    let batch = BatchRunner::new();
    let fitness = config.fitness;

    info!(
        folds = folds.len(),
        grid = config.grid.size(),
        fitness = %fitness,
        "walk-forward start"
    );

    let mut fold_results = Vec::with_capacity(folds.len());
    for fold in &folds {
        let fold_err = |source| WalkForwardError::Window {
            fold: fold.fold_index,
            source,
        };
        let (train_start, train_end) = (dates[fold.is_start], dates[fold.is_end - 1]);
        let (test_start, test_end) = (dates[fold.oos_start], dates[fold.oos_end - 1]);

        let train_base = base.with_window(train_start, train_end).map_err(fold_err)?;
        let candidates = config.grid.generate_configs(&train_base);
        let results = batch.run(&candidates, features);
        let failed = results.iter().filter(|r| r.is_err()).count();
        if failed > 0 {
            warn!(fold = fold.fold_index, failed, "some grid candidates failed");
        }

        let best = best_by(&results, fitness).ok_or(WalkForwardError::NoViableCandidate {
            fold: fold.fold_index,
            failed,
        })?;

        let test_config = best
            .config
            .with_window(test_start, test_end)
            .map_err(fold_err)?;
        let test = run_config(&test_config, features).map_err(|source| {
            WalkForwardError::TestFailed {
                fold: fold.fold_index,
                source,
            }
        })?;

        let result = FoldResult {
            fold_index: fold.fold_index,
            train_start,
            train_end,
            test_start,
            test_end,
            params: *best.config.params(),
            knobs: best.config.knobs().clone(),
            is_fitness: fitness.extract(&best.metrics),
            oos_fitness: fitness.extract(&test.metrics),
            oos_return: test.metrics.total_return,
            is_trades: best.metrics.num_trades,
            oos_trades: test.metrics.num_trades,
            candidates: candidates.len(),
            failed_candidates: failed,
        };
        info!(
            fold = result.fold_index,
            is_fitness = result.is_fitness,
            oos_fitness = result.oos_fitness,
            "fold complete"
        );
        fold_results.push(result);
    }

    Ok(compute_walk_forward_stats(fitness, fold_results))
}

/// Aggregate fold results.
fn compute_walk_forward_stats(
    fitness: FitnessMetric,
    fold_results: Vec<FoldResult>,
) -> WalkForwardResult {
    let n = fold_results.len().max(1) as f64;
    let mean_is_fitness = fold_results.iter().map(|f| f.is_fitness).sum::<f64>() / n;
    let mean_oos_fitness = fold_results.iter().map(|f| f.oos_fitness).sum::<f64>() / n;
    let (degradation_ratio, degradation_flag) =
        compute_degradation_ratio(mean_is_fitness, mean_oos_fitness);
    let stitched_oos_return = fold_results
        .iter()
        .fold(1.0, |acc, f| acc * (1.0 + f.oos_return))
        - 1.0;

    WalkForwardResult {
        fitness,
        fold_results,
        mean_is_fitness,
        mean_oos_fitness,
        degradation_ratio,
        degradation_flag,
        stitched_oos_return,
    }
}

/// Compute degradation ratio with edge case handling.
///
/// - IS >= 0.1: ratio = OOS / IS (Normal)
/// - 0 <= IS < 0.1: difference = OOS - IS (LowIsSharpe)
/// - IS < 0: ratio skipped (NegativeIsSharpe)
/// - IS >= 0.1 but OOS < 0: clamped to 0.0 (FailedOos)
pub fn compute_degradation_ratio(
    mean_is: f64,
    mean_oos: f64,
) -> (Option<f64>, DegradationFlag) {
    if mean_is < 0.0 {
        (None, DegradationFlag::NegativeIsSharpe)
    } else if mean_is < 0.1 {
        (Some(mean_oos - mean_is), DegradationFlag::LowIsSharpe)
    } else if mean_oos < 0.0 {
        // Positive IS but negative OOS: canonical overfit signature
        (Some(0.0), DegradationFlag::FailedOos)
    } else {
        (Some(mean_oos / mean_is), DegradationFlag::Normal)
    }
}
