//! Exponential Moving Average (EMA).
//!
//! EMA[t] = alpha * x[t] + (1 - alpha) * EMA[t-1], alpha = 2 / (period + 1).
//! Seeded with the SMA of the first `period` values. A NaN input restarts the
//! seed window after it.

use super::{closes, Indicator};
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    name: String,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "EMA period must be >= 1");
        Self {
            period,
            name: format!("ema_{period}"),
        }
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        ema_series(&closes(bars), self.period)
    }
}

/// EMA over an arbitrary series (used for MACD on top of other EMAs).
pub fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    if period == 0 {
        return out;
    }
    let alpha = 2.0 / (period as f64 + 1.0);

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
        match prev {
            Some(p) => {
                let next = alpha * x + (1.0 - alpha) * p;
                out[i] = next;
                prev = Some(next);
            }
            None => {
                seed_sum += x;
                seed_count += 1;
                if seed_count == period {
                    let seed = seed_sum / period as f64;
                    out[i] = seed;
                    prev = Some(seed);
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars};

    #[test]
    fn ema_seed_and_recursion() {
        let bars = make_bars(&[1.0, 2.0, 3.0, 4.0]);
        let out = Ema::new(3).compute(&bars);
        assert!(out[1].is_nan());
        assert_approx(out[2], 2.0, 1e-12);
        // alpha = 0.5: 0.5*4 + 0.5*2 = 3
        assert_approx(out[3], 3.0, 1e-12);
    }

    #[test]
    fn ema_restarts_after_nan() {
        let out = ema_series(&[1.0, 2.0, f64::NAN, 5.0, 7.0], 2);
        assert_approx(out[1], 1.5, 1e-12);
        assert!(out[2].is_nan());
        assert!(out[3].is_nan());
        assert_approx(out[4], 6.0, 1e-12);
    }
}
