//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|)
//! ATR uses Wilder smoothing (EMA with alpha = 1/period).
//! Lookback: period (TR needs a previous close, then `period` TR values).

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    name: String,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        Self {
            period,
            name: format!("atr_{period}"),
        }
    }
}

/// True Range series. TR[0] is NaN (no previous close), as is any TR whose
/// bar or predecessor is void.
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    let mut tr = vec![f64::NAN; bars.len()];
    for i in 1..bars.len() {
        let h = bars[i].high;
        let l = bars[i].low;
        let pc = bars[i - 1].close;
        if !(h.is_nan() || l.is_nan() || pc.is_nan()) {
            tr[i] = (h - l).max((h - pc).abs()).max((l - pc).abs());
        }
    }
    tr
}

/// Wilder smoothing with alpha = 1/period, seeded by the mean of the first
/// `period` consecutive valid values. A NaN restarts the seed.
pub fn wilder_smooth(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    if period == 0 {
        return out;
    }
    let p = period as f64;
    let mut seed_sum = 0.0;
    let mut seed_count = 0usize;
    let mut prev: Option<f64> = None;

    for (i, &x) in values.iter().enumerate() {
        if x.is_nan() {
            seed_sum = 0.0;
            seed_count = 0;
            prev = None;
            continue;
        }
        prev = match prev {
            Some(s) => Some((s * (p - 1.0) + x) / p),
            None => {
                seed_sum += x;
                seed_count += 1;
                (seed_count == period).then(|| seed_sum / p)
            }
        };
        if let Some(v) = prev {
            out[i] = v;
        }
    }
    out
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        wilder_smooth(&true_range(bars), self.period)
    }
}
