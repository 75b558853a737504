//! Indicator implementations used to build feature columns.
//!
//! Indicators are pure functions: bar history in, numeric series out. They are
//! precomputed once per symbol before the simulation loop. Multi-series
//! indicators (Bollinger, rolling extremes) are exposed as one instance per band,
//! keeping the single-series `Indicator` trait unchanged.

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rolling;
pub mod rsi;
pub mod sma;

pub use atr::Atr;
pub use bollinger::{Bollinger, BollingerBand};
pub use ema::Ema;
pub use macd::MacdHistogram;
pub use rolling::{PriorExtreme, PriorExtremeKind};
pub use rsi::Rsi;
pub use sma::Sma;

use crate::domain::Bar;

/// Trait for indicators.
///
/// Implementations return a series of the same length as `bars`, with NaN
/// during warmup and wherever an input in the window is void.
///
/// # Look-ahead guard
/// The value at index t must depend only on `bars[..=t]`. Every indicator is
/// checked by computing on a truncated and a full series and comparing.
pub trait Indicator: Send + Sync {
    /// Column name (e.g. "sma_50").
    fn name(&self) -> &str;

    /// Number of bars consumed before the first valid output.
    fn lookback(&self) -> usize;

    fn compute(&self, bars: &[Bar]) -> Vec<f64>;
}

/// Rolling arithmetic mean over `period` values; NaN if any value in the window is NaN.
pub fn rolling_mean(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    if period == 0 || n < period {
        return out;
    }
    let mut sum = 0.0;
    let mut nan_count = 0usize;
    for i in 0..n {
        let entering = values[i];
        if entering.is_nan() {
            nan_count += 1;
        } else {
            sum += entering;
        }
        if i >= period {
            let leaving = values[i - period];
            if leaving.is_nan() {
                nan_count -= 1;
            } else {
                sum -= leaving;
            }
        }
        if i + 1 >= period && nan_count == 0 {
            out[i] = sum / period as f64;
        }
    }
    out
}

/// Close prices of a bar slice.
pub fn closes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

/// Create synthetic bars from close prices for testing.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    let base_date = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                symbol: "TEST".to_string(),
                date: base_date + chrono::Duration::days(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, epsilon={epsilon}"
    );
}
