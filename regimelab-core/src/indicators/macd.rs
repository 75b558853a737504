//! MACD histogram.
//!
//! MACD line = EMA(fast) - EMA(slow); signal = EMA(signal_period) of the line;
//! histogram = line - signal. Default 12/26/9.

use super::ema::ema_series;
use super::{closes, Indicator};
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct MacdHistogram {
    fast: usize,
    slow: usize,
    signal: usize,
    name: String,
}

impl MacdHistogram {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        assert!(fast >= 1 && signal >= 1, "MACD periods must be >= 1");
        assert!(fast < slow, "MACD fast period must be below slow period");
        Self {
            fast,
            slow,
            signal,
            name: format!("macd_hist_{fast}_{slow}_{signal}"),
        }
    }
}

impl Default for MacdHistogram {
    fn default() -> Self {
        Self::new(12, 26, 9)
    }
}

impl Indicator for MacdHistogram {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.slow + self.signal - 2
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let values = closes(bars);
        let fast = ema_series(&values, self.fast);
        let slow = ema_series(&values, self.slow);
        let line: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
        let signal = ema_series(&line, self.signal);
        line.iter().zip(&signal).map(|(l, s)| l - s).collect()
    }
}
