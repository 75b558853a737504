//! Bollinger Bands.
//!
//! Middle = SMA(close, period). Upper/Lower = Middle ± multiplier * population
//! stddev over the same window. Each band is its own indicator instance.

use super::{closes, rolling_mean, Indicator};
use crate::domain::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BollingerBand {
    Upper,
    Middle,
    Lower,
}

#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    multiplier: f64,
    band: BollingerBand,
    name: String,
}

impl Bollinger {
    pub fn new(period: usize, multiplier: f64, band: BollingerBand) -> Self {
        assert!(period >= 2, "Bollinger period must be >= 2");
        let suffix = match band {
            BollingerBand::Upper => "upper",
            BollingerBand::Middle => "middle",
            BollingerBand::Lower => "lower",
        };
        Self {
            period,
            multiplier,
            band,
            name: format!("bb_{suffix}_{period}"),
        }
    }
}

impl Indicator for Bollinger {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let values = closes(bars);
        let mean = rolling_mean(&values, self.period);
        if self.band == BollingerBand::Middle {
            return mean;
        }
        let sign = if self.band == BollingerBand::Upper { 1.0 } else { -1.0 };
        mean.iter()
            .enumerate()
            .map(|(i, &m)| {
                if m.is_nan() {
                    return f64::NAN;
                }
                let window = &values[i + 1 - self.period..=i];
                let var = window.iter().map(|x| (x - m).powi(2)).sum::<f64>() / self.period as f64;
                m + sign * self.multiplier * var.sqrt()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars};

    #[test]
    fn bands_straddle_middle() {
        let bars = make_bars(&[1.0, 3.0, 1.0, 3.0]);
        let up = Bollinger::new(2, 2.0, BollingerBand::Upper).compute(&bars);
        let mid = Bollinger::new(2, 2.0, BollingerBand::Middle).compute(&bars);
        let lo = Bollinger::new(2, 2.0, BollingerBand::Lower).compute(&bars);
        assert_approx(mid[1], 2.0, 1e-12);
        // stddev of {1, 3} = 1
        assert_approx(up[1], 4.0, 1e-12);
        assert_approx(lo[1], 0.0, 1e-12);
    }

    #[test]
    fn flat_series_collapses_bands() {
        let bars = make_bars(&[5.0; 6]);
        let up = Bollinger::new(3, 2.0, BollingerBand::Upper).compute(&bars);
        assert_approx(up[5], 5.0, 1e-12);
    }
}
