//! Market regime classification from a single benchmark series.
//!
//! Bull: close above its moving average and the average rising over the slope
//! lookback. Bear: close below and the average falling. Anything else,
//! including warmup and undefined inputs, is Neutral.
//!
//! Void benchmark rows (NaN close) are skipped: the average and the slope
//! lookback both count valid observations, so a single missing bar only
//! neutralizes its own date.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MarketRegime {
    Bull,
    Bear,
    Neutral,
}

impl MarketRegime {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketRegime::Bull => "BULL",
            MarketRegime::Bear => "BEAR",
            MarketRegime::Neutral => "NEUTRAL",
        }
    }
}

impl fmt::Display for MarketRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One labelled date of regime history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegimePoint {
    pub date: NaiveDate,
    pub regime: MarketRegime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegimeClassifier {
    ma_window: usize,
    slope_lookback: usize,
}

impl Default for RegimeClassifier {
    fn default() -> Self {
        Self::new(200, 20)
    }
}

impl RegimeClassifier {
    pub fn new(ma_window: usize, slope_lookback: usize) -> Self {
        Self {
            ma_window: ma_window.max(1),
            slope_lookback: slope_lookback.max(1),
        }
    }

    pub fn ma_window(&self) -> usize {
        self.ma_window
    }

    pub fn slope_lookback(&self) -> usize {
        self.slope_lookback
    }

    /// Mean of the last `ma_window` valid closes at each index.
    ///
    /// NaN on void rows and until `ma_window` valid closes have been seen.
    pub fn moving_average(&self, closes: &[f64]) -> Vec<f64> {
        let mut window = VecDeque::with_capacity(self.ma_window);
        let mut sum = 0.0;
        closes
            .iter()
            .map(|&close| {
                if close.is_nan() {
                    return f64::NAN;
                }
                window.push_back(close);
                sum += close;
                if window.len() > self.ma_window {
                    sum -= window.pop_front().unwrap_or(0.0);
                }
                if window.len() == self.ma_window {
                    sum / self.ma_window as f64
                } else {
                    f64::NAN
                }
            })
            .collect()
    }

    /// Index `slope_lookback` valid observations before `t`, if there is one.
    fn slope_anchor(&self, closes: &[f64], t: usize) -> Option<usize> {
        (0..t)
            .rev()
            .filter(|&j| !closes[j].is_nan())
            .nth(self.slope_lookback - 1)
    }

    /// Label index `t` from `closes[..=t]` and `ma[..=t]`.
    pub fn classify(&self, closes: &[f64], ma: &[f64], t: usize) -> MarketRegime {
        if t >= closes.len() || t >= ma.len() {
            return MarketRegime::Neutral;
        }
        if t + 1 < self.ma_window || t < self.slope_lookback {
            return MarketRegime::Neutral;
        }
        let close = closes[t];
        let ma_now = ma[t];
        if close.is_nan() || ma_now.is_nan() {
            return MarketRegime::Neutral;
        }
        let Some(anchor) = self.slope_anchor(closes, t) else {
            return MarketRegime::Neutral;
        };
        let ma_then = ma[anchor];
        if ma_then.is_nan() {
            return MarketRegime::Neutral;
        }
        let slope = ma_now - ma_then;
        if close > ma_now && slope > 0.0 {
            MarketRegime::Bull
        } else if close < ma_now && slope < 0.0 {
            MarketRegime::Bear
        } else {
            MarketRegime::Neutral
        }
    }

    /// Label every index in `range`.
    pub fn classify_series(
        &self,
        closes: &[f64],
        ma: &[f64],
        range: std::ops::Range<usize>,
    ) -> Vec<MarketRegime> {
        range.map(|t| self.classify(closes, ma, t)).collect()
    }
}
