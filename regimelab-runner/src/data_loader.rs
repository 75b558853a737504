//! Bar loading and data resolution for the runner.
//!
//! Given a list of symbols, loads bars and returns aligned bars plus the
//! feature set built from them. Fallback policy per symbol:
//! 1. If `<csv_dir>/<SYMBOL>.csv` exists → use it
//! 2. If not and `synthetic` is enabled → generate seeded random-walk bars (tagged)
//! 3. Otherwise → fail with a clear error
//!
//! Synthetic data is a demo/test mode. Results produced on it carry
//! `has_synthetic = true`.

use crate::rng::RngHierarchy;
use chrono::{Datelike, NaiveDate};
use rand::Rng;
use regimelab_core::domain::{Bar, DatasetHash, RunId};
use regimelab_core::features::{
    align_symbols, build_feature_set, AlignedBars, FeatureError, FeatureSet, FeatureSpec,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("no data file for '{symbol}' at {path} (enable synthetic data to generate bars)")]
    MissingFile { symbol: String, path: PathBuf },

    #[error("no data source for '{symbol}': set csv_dir or enable synthetic data")]
    NoSource { symbol: String },

    #[error("failed to read {path}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("'{symbol}' has no usable bars between {start} and {end}")]
    NoBars {
        symbol: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error(transparent)]
    Feature(#[from] FeatureError),
}

/// Options controlling how bars are loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOptions {
    /// First date to keep (include warm-up history here).
    pub start: NaiveDate,
    /// Last date to keep.
    pub end: NaiveDate,
    pub csv_dir: Option<PathBuf>,
    /// Generate synthetic bars when a CSV file is unavailable.
    pub synthetic: bool,
    /// Master seed for synthetic bars.
    pub seed: u64,
}

/// Loaded, aligned bars and their features.
#[derive(Debug)]
pub struct LoadedData {
    pub aligned: AlignedBars,
    pub features: FeatureSet,
    /// BLAKE3 over all bar data, for provenance in run headers.
    pub dataset_hash: DatasetHash,
    /// Whether any symbol used synthetic data.
    pub has_synthetic: bool,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
}

/// Load bars for every symbol, align them and build the feature set.
pub fn load_features(
    symbols: &[String],
    benchmark: &str,
    spec: &FeatureSpec,
    opts: &LoadOptions,
) -> Result<LoadedData, DataError> {
    let mut all_bars: BTreeMap<String, Vec<Bar>> = BTreeMap::new();
    let mut has_synthetic = false;

    for symbol in symbols {
        let from_csv = match &opts.csv_dir {
            Some(dir) => {
                let path = csv_path(dir, symbol);
                if path.exists() {
                    Some(read_csv_bars(&path, symbol)?)
                } else if opts.synthetic {
                    None
                } else {
                    return Err(DataError::MissingFile {
                        symbol: symbol.clone(),
                        path,
                    });
                }
            }
            None if opts.synthetic => None,
            None => {
                return Err(DataError::NoSource {
                    symbol: symbol.clone(),
                })
            }
        };

        let bars = match from_csv {
            Some(bars) => bars,
            None => {
                warn!(symbol = %symbol, "generating synthetic bars; results are tagged synthetic");
                has_synthetic = true;
                synthetic_bars(symbol, opts.start, opts.end, opts.seed)
            }
        };

        let bars: Vec<Bar> = bars
            .into_iter()
            .filter(|b| b.date >= opts.start && b.date <= opts.end)
            .collect();
        if bars.is_empty() {
            return Err(DataError::NoBars {
                symbol: symbol.clone(),
                start: opts.start,
                end: opts.end,
            });
        }
        all_bars.insert(symbol.clone(), bars);
    }

    let aligned = align_symbols(all_bars);
    let dataset_hash = compute_dataset_hash(&aligned);
    let features = build_feature_set(&aligned, benchmark, spec)?;
    info!(
        symbols = aligned.bars.len(),
        dates = aligned.dates.len(),
        dataset = %&dataset_hash.0[..12],
        has_synthetic,
        "data loaded"
    );

    Ok(LoadedData {
        aligned,
        features,
        dataset_hash,
        has_synthetic,
    })
}

fn csv_path(dir: &Path, symbol: &str) -> PathBuf {
    dir.join(format!("{symbol}.csv"))
}

/// Read one `date,open,high,low,close,volume` file. Insane rows are dropped
/// with a warning; the result is sorted by date.
pub fn read_csv_bars(path: &Path, symbol: &str) -> Result<Vec<Bar>, DataError> {
    let csv_err = |source| DataError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;

    let mut bars = Vec::new();
    let mut dropped = 0usize;
    for row in reader.deserialize::<CsvRow>() {
        let row = row.map_err(csv_err)?;
        let bar = Bar {
            symbol: symbol.to_string(),
            date: row.date,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        };
        if bar.is_sane() {
            bars.push(bar);
        } else {
            dropped += 1;
        }
    }
    if dropped > 0 {
        warn!(symbol, dropped, "dropped rows with inconsistent OHLC values");
    }
    bars.sort_by_key(|b| b.date);
    Ok(bars)
}

/// Write bars in the format `read_csv_bars` reads.
pub fn write_csv_bars(path: &Path, bars: &[Bar]) -> Result<(), DataError> {
    let csv_err = |source| DataError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    writer
        .write_record(["date", "open", "high", "low", "close", "volume"])
        .map_err(csv_err)?;
    for b in bars {
        writer
            .write_record(&[
                b.date.to_string(),
                b.open.to_string(),
                b.high.to_string(),
                b.low.to_string(),
                b.close.to_string(),
                b.volume.to_string(),
            ])
            .map_err(csv_err)?;
    }
    writer.flush().map_err(|e| csv_err(e.into()))?;
    Ok(())
}

/// Compute a deterministic BLAKE3 hash over all bar data.
///
/// Symbols are visited in sorted (BTreeMap) order, so the hash does not
/// depend on load order.
pub fn compute_dataset_hash(aligned: &AlignedBars) -> DatasetHash {
    let mut hasher = blake3::Hasher::new();
    for (symbol, bars) in &aligned.bars {
        hasher.update(symbol.as_bytes());
        for bar in bars {
            hasher.update(bar.date.to_string().as_bytes());
            for v in [bar.open, bar.high, bar.low, bar.close, bar.volume] {
                hasher.update(&v.to_le_bytes());
            }
        }
    }
    DatasetHash(hasher.finalize().to_hex().to_string())
}

/// Generate weekday bars from a seeded random walk starting at 100.
///
/// Each symbol draws from its own sub-seed, so adding a symbol never changes
/// another symbol's bars.
pub fn synthetic_bars(symbol: &str, start: NaiveDate, end: NaiveDate, seed: u64) -> Vec<Bar> {
    let mut rng = RngHierarchy::new(seed).rng_for(&RunId("synthetic".into()), symbol, 0);
    let drift: f64 = rng.gen_range(-0.0005..0.0010);

    let mut bars = Vec::new();
    let mut price = 100.0_f64;
    let mut current = start;
    while current <= end {
        let weekday = current.weekday();
        if weekday == chrono::Weekday::Sat || weekday == chrono::Weekday::Sun {
            current += chrono::Duration::days(1);
            continue;
        }

        let daily_return: f64 = drift + rng.gen_range(-0.02..0.02);
        let open = price * (1.0 + rng.gen_range(-0.003..0.003));
        let close = (price * (1.0 + daily_return)).max(1.0);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
        let volume = rng.gen_range(500_000..5_000_000u64) as f64;

        bars.push(Bar {
            symbol: symbol.to_string(),
            date: current,
            open,
            high,
            low,
            close,
            volume,
        });
        price = close;
        current += chrono::Duration::days(1);
    }
    bars
}
