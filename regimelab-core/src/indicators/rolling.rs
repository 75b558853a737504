//! Prior-window extremes (Donchian-style channel that excludes today).
//!
//! high_N[t] = max(high[t-N..t]), low_N[t] = min(low[t-N..t]). Today's bar is
//! never part of its own window, so "close > high_N" is a real breakout.
//! Lookback: period.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorExtremeKind {
    High,
    Low,
}

#[derive(Debug, Clone)]
pub struct PriorExtreme {
    period: usize,
    kind: PriorExtremeKind,
    name: String,
}

impl PriorExtreme {
    pub fn new(period: usize, kind: PriorExtremeKind) -> Self {
        assert!(period >= 1, "window must be >= 1");
        let prefix = match kind {
            PriorExtremeKind::High => "high",
            PriorExtremeKind::Low => "low",
        };
        Self {
            period,
            kind,
            name: format!("{prefix}_{period}"),
        }
    }
}

impl Indicator for PriorExtreme {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut out = vec![f64::NAN; n];
        for t in self.period..n {
            let window = &bars[t - self.period..t];
            let mut acc = match self.kind {
                PriorExtremeKind::High => f64::NEG_INFINITY,
                PriorExtremeKind::Low => f64::INFINITY,
            };
            let mut void = false;
            for b in window {
                let v = match self.kind {
                    PriorExtremeKind::High => b.high,
                    PriorExtremeKind::Low => b.low,
                };
                if v.is_nan() {
                    void = true;
                    break;
                }
                acc = match self.kind {
                    PriorExtremeKind::High => acc.max(v),
                    PriorExtremeKind::Low => acc.min(v),
                };
            }
            if !void {
                out[t] = acc;
            }
        }
        out
    }
}
