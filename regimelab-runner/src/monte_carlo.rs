//! Monte-Carlo resampling of a finished run.
//!
//! Draws closed-trade returns (or daily equity returns) with replacement to
//! build synthetic equity paths, then reports percentile bands of final
//! equity, Sharpe and max drawdown plus the probability of ruin.
//!
//! Every path has its own `StdRng` seeded from `(seed, run_id, source, path)`
//! through the RNG hierarchy, so output is bit-identical for a fixed seed at
//! any thread count.

use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use regimelab_core::domain::RunId;
use regimelab_core::engine::EquityPoint;

use crate::metrics::{daily_returns, max_drawdown, sharpe_ratio};
use crate::rng::RngHierarchy;
use crate::runner::SimulationResult;

// ─── Configuration ───────────────────────────────────────────────────

/// What gets resampled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResampleSource {
    /// Closed-trade P&L as a fraction of equity on the entry date.
    #[default]
    Trades,
    /// Day-over-day equity returns.
    DailyReturns,
}

impl ResampleSource {
    fn stream(&self) -> &'static str {
        match self {
            ResampleSource::Trades => "mc_trades",
            ResampleSource::DailyReturns => "mc_daily",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonteCarloConfig {
    pub n_paths: usize,
    pub seed: u64,
    /// A path is ruined when its final equity is below initial × (1 − threshold).
    pub ruin_threshold: f64,
    pub source: ResampleSource,
    /// Draws per path; defaults to the sample size.
    pub path_length: Option<usize>,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            n_paths: 1000,
            seed: 42,
            ruin_threshold: 0.5,
            source: ResampleSource::Trades,
            path_length: None,
        }
    }
}

// ─── Result types ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Percentiles {
    pub p05: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
}

impl Percentiles {
    /// Linear-interpolated percentiles of `values` (sorted internally).
    pub fn of(values: &[f64]) -> Self {
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        Self {
            p05: percentile_sorted(&sorted, 5.0),
            p25: percentile_sorted(&sorted, 25.0),
            p50: percentile_sorted(&sorted, 50.0),
            p75: percentile_sorted(&sorted, 75.0),
            p95: percentile_sorted(&sorted, 95.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloResult {
    pub source: ResampleSource,
    pub n_paths: usize,
    pub sample_size: usize,
    pub path_length: usize,
    pub initial_equity: f64,
    /// Final equity below this counts as ruin.
    pub ruin_level: f64,
    pub final_equity: Percentiles,
    pub sharpe: Percentiles,
    pub max_drawdown: Percentiles,
    /// Fraction of paths that ended below `ruin_level`, in [0, 1].
    pub probability_of_ruin: f64,
}

#[derive(Debug, Error, PartialEq)]
pub enum MonteCarloError {
    #[error("nothing to resample: run produced no {0:?} observations")]
    EmptySample(ResampleSource),
    #[error("n_paths must be >= 1")]
    NoPaths,
    #[error("ruin_threshold must be in (0, 1], got {0}")]
    InvalidRuinThreshold(f64),
    #[error("initial equity must be > 0, got {0}")]
    InvalidInitialEquity(f64),
}

// ─── Samples ─────────────────────────────────────────────────────────

/// Closed-trade P&L divided by portfolio equity on the trade's entry date.
pub fn trade_returns(result: &SimulationResult) -> Vec<f64> {
    let curve = &result.equity_curve;
    let initial = result.config.initial_cash();
    result
        .closed_trades()
        .map(|t| {
            let base = equity_on(curve, t.entry_date).unwrap_or(initial);
            if base > 0.0 {
                t.pnl / base
            } else {
                0.0
            }
        })
        .collect()
}

fn equity_on(curve: &[EquityPoint], date: chrono::NaiveDate) -> Option<f64> {
    let i = curve.partition_point(|p| p.date <= date);
    i.checked_sub(1).map(|i| curve[i].equity)
}

// ─── Simulation ──────────────────────────────────────────────────────

/// Resample the run named by `config.source`.
pub fn run_monte_carlo(
    result: &SimulationResult,
    config: &MonteCarloConfig,
) -> Result<MonteCarloResult, MonteCarloError> {
    let sample = match config.source {
        ResampleSource::Trades => trade_returns(result),
        ResampleSource::DailyReturns => {
            let equity: Vec<f64> = result.equity_curve.iter().map(|p| p.equity).collect();
            daily_returns(&equity)
        }
    };
    simulate_paths(&sample, result.config.initial_cash(), &result.run_id, config)
}

/// Build `n_paths` compounded equity paths from `sample` and summarize them.
pub fn simulate_paths(
    sample: &[f64],
    initial_equity: f64,
    run_id: &RunId,
    config: &MonteCarloConfig,
) -> Result<MonteCarloResult, MonteCarloError> {
    if config.n_paths == 0 {
        return Err(MonteCarloError::NoPaths);
    }
    if !(config.ruin_threshold > 0.0 && config.ruin_threshold <= 1.0) {
        return Err(MonteCarloError::InvalidRuinThreshold(config.ruin_threshold));
    }
    if !(initial_equity > 0.0 && initial_equity.is_finite()) {
        return Err(MonteCarloError::InvalidInitialEquity(initial_equity));
    }
    if sample.is_empty() {
        return Err(MonteCarloError::EmptySample(config.source));
    }

    let path_length = config.path_length.unwrap_or(sample.len()).max(1);
    let hierarchy = RngHierarchy::new(config.seed);
    let stream = config.source.stream();

    let paths: Vec<(f64, f64, f64)> = (0..config.n_paths as u64)
        .into_par_iter()
        .map(|i| {
            let mut rng = hierarchy.rng_for(run_id, stream, i);
            let path = resample_path(sample, initial_equity, path_length, &mut rng);
            let last = path.last().copied().unwrap_or(initial_equity);
            (last, sharpe_ratio(&path), max_drawdown(&path))
        })
        .collect();

    let ruin_level = initial_equity * (1.0 - config.ruin_threshold);
    let finals: Vec<f64> = paths.iter().map(|p| p.0).collect();
    let sharpes: Vec<f64> = paths.iter().map(|p| p.1).collect();
    let drawdowns: Vec<f64> = paths.iter().map(|p| p.2).collect();
    let ruined = finals.iter().filter(|&&e| e < ruin_level).count();
    let probability_of_ruin = ruined as f64 / config.n_paths as f64;

    info!(
        paths = config.n_paths,
        sample = sample.len(),
        probability_of_ruin,
        "monte-carlo complete"
    );

    Ok(MonteCarloResult {
        source: config.source,
        n_paths: config.n_paths,
        sample_size: sample.len(),
        path_length,
        initial_equity,
        ruin_level,
        final_equity: Percentiles::of(&finals),
        sharpe: Percentiles::of(&sharpes),
        max_drawdown: Percentiles::of(&drawdowns),
        probability_of_ruin,
    })
}

/// One equity path: `initial` followed by `len` compounded draws. Equity
/// never goes below zero.
fn resample_path<R: Rng>(sample: &[f64], initial: f64, len: usize, rng: &mut R) -> Vec<f64> {
    let mut path = Vec::with_capacity(len + 1);
    let mut equity = initial;
    path.push(equity);
    for _ in 0..len {
        let r = sample[rng.gen_range(0..sample.len())];
        equity = (equity * (1.0 + r)).max(0.0);
        path.push(equity);
    }
    path
}

/// Linear-interpolated percentile of an ascending slice.
fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n == 1 {
        return sorted[0];
    }
    let rank = (p / 100.0) * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = rank - lo as f64;
    sorted[lo] * (1.0 - frac) + sorted[hi] * frac
}
