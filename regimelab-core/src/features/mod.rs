//! Precomputed per-symbol feature rows and the causal market view.
//!
//! A `FeatureSet` is the simulation's only market input: one row per
//! (symbol, date) on a shared date axis. Strategies never see the set
//! directly; they get a `MarketView` that is pinned to one date index and
//! cannot read rows after it.

pub mod align;
pub mod builder;

pub use align::{align_symbols, AlignedBars};
pub use builder::{build_feature_set, relative_strength, FeatureSpec};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Range;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum FeatureError {
    #[error("symbol '{symbol}' has {actual} rows, expected {expected}")]
    LengthMismatch {
        symbol: String,
        expected: usize,
        actual: usize,
    },

    #[error("date axis is not strictly increasing at index {0}")]
    UnsortedDates(usize),

    #[error("benchmark symbol '{0}' not present in bar data")]
    MissingBenchmark(String),
}

/// One symbol's OHLCV and indicator values for one date. NaN = undefined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub sma_20: f64,
    pub sma_50: f64,
    pub sma_200: f64,
    pub rsi_14: f64,
    pub atr_14: f64,
    pub macd_hist: f64,
    pub bb_upper: f64,
    pub bb_middle: f64,
    pub bb_lower: f64,
    /// Highest high of the 20 rows before this one.
    pub high_20: f64,
    /// Lowest low of the 20 rows before this one.
    pub low_20: f64,
    /// 63-day return of the symbol divided by that of the benchmark.
    pub rel_strength: f64,
}

impl FeatureRow {
    pub fn void() -> Self {
        Self {
            open: f64::NAN,
            high: f64::NAN,
            low: f64::NAN,
            close: f64::NAN,
            volume: 0.0,
            sma_20: f64::NAN,
            sma_50: f64::NAN,
            sma_200: f64::NAN,
            rsi_14: f64::NAN,
            atr_14: f64::NAN,
            macd_hist: f64::NAN,
            bb_upper: f64::NAN,
            bb_middle: f64::NAN,
            bb_lower: f64::NAN,
            high_20: f64::NAN,
            low_20: f64::NAN,
            rel_strength: f64::NAN,
        }
    }

    /// A row with only prices set; indicators undefined.
    pub fn from_prices(open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            open,
            high,
            low,
            close,
            volume,
            ..Self::void()
        }
    }

    /// True when the symbol has no tradable price on this date.
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }
}

/// Feature rows for many symbols aligned to one date axis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureSet {
    dates: Vec<NaiveDate>,
    symbols: BTreeMap<String, Vec<FeatureRow>>,
}

impl FeatureSet {
    pub fn new(
        dates: Vec<NaiveDate>,
        symbols: BTreeMap<String, Vec<FeatureRow>>,
    ) -> Result<Self, FeatureError> {
        if let Some(i) = dates.windows(2).position(|w| w[0] >= w[1]) {
            return Err(FeatureError::UnsortedDates(i + 1));
        }
        for (symbol, rows) in &symbols {
            if rows.len() != dates.len() {
                return Err(FeatureError::LengthMismatch {
                    symbol: symbol.clone(),
                    expected: dates.len(),
                    actual: rows.len(),
                });
            }
        }
        Ok(Self { dates, symbols })
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.symbols.keys().map(String::as_str)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.contains_key(symbol)
    }

    pub fn series(&self, symbol: &str) -> Option<&[FeatureRow]> {
        self.symbols.get(symbol).map(Vec::as_slice)
    }

    /// Index range of dates within `[start, end]`, or None if no date falls inside.
    pub fn index_range(&self, start: NaiveDate, end: NaiveDate) -> Option<Range<usize>> {
        let lo = self.dates.partition_point(|d| *d < start);
        let hi = self.dates.partition_point(|d| *d <= end);
        (lo < hi).then_some(lo..hi)
    }

    /// Causal view of the universe as of `index`.
    pub fn view<'a>(&'a self, index: usize, universe: &'a [String]) -> MarketView<'a> {
        MarketView {
            features: self,
            index,
            universe,
        }
    }
}

/// Read-only cross-section of the market on one date.
///
/// Every accessor resolves to rows at or before `index`; there is no way to
/// reach a future row through a view.
#[derive(Debug, Clone, Copy)]
pub struct MarketView<'a> {
    features: &'a FeatureSet,
    index: usize,
    universe: &'a [String],
}

impl<'a> MarketView<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn date(&self) -> NaiveDate {
        self.features.dates[self.index]
    }

    pub fn universe(&self) -> &'a [String] {
        self.universe
    }

    /// Today's row, or None if the symbol is unknown or void today.
    pub fn row(&self, symbol: &str) -> Option<&'a FeatureRow> {
        self.lagged(symbol, 0)
    }

    /// Row `lag` dates back, or None if before the start, unknown, or void.
    pub fn lagged(&self, symbol: &str, lag: usize) -> Option<&'a FeatureRow> {
        let i = self.index.checked_sub(lag)?;
        self.features
            .symbols
            .get(symbol)
            .and_then(|rows| rows.get(i))
            .filter(|r| !r.is_void())
    }

    /// Universe symbols with a usable row today, in universe order.
    pub fn rows(&self) -> impl Iterator<Item = (&'a str, &'a FeatureRow)> + 'a {
        let view = *self;
        self.universe
            .iter()
            .filter_map(move |s| view.row(s).map(|r| (s.as_str(), r)))
    }
}
