//! Fitness function — configurable metric selector for parameter ranking.

use crate::metrics::PerformanceMetrics;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which metric to optimize/sort by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitnessMetric {
    #[default]
    Sharpe,
    Sortino,
    Calmar,
    Cagr,
    TotalReturn,
    WinRate,
    ProfitFactor,
    Expectancy,
    MaxDrawdown,
}

impl FitnessMetric {
    /// Extract the relevant metric value from a PerformanceMetrics struct.
    pub fn extract(&self, metrics: &PerformanceMetrics) -> f64 {
        match self {
            Self::Sharpe => metrics.sharpe,
            Self::Sortino => metrics.sortino,
            Self::Calmar => metrics.calmar,
            Self::Cagr => metrics.cagr,
            Self::TotalReturn => metrics.total_return,
            Self::WinRate => metrics.win_rate,
            Self::ProfitFactor => metrics.profit_factor,
            Self::Expectancy => metrics.expectancy,
            Self::MaxDrawdown => metrics.max_drawdown,
        }
    }

    /// Whether higher values are better for this metric.
    ///
    /// MaxDrawdown is stored negative, so "less negative" is better and the
    /// raw comparison still works; this flag is for display only.
    pub fn is_higher_better(&self) -> bool {
        !matches!(self, Self::MaxDrawdown)
    }

    /// Returns true if `a` is better than `b`. NaN never wins.
    pub fn is_better(&self, a: f64, b: f64) -> bool {
        a > b || (b.is_nan() && !a.is_nan())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sharpe => "sharpe",
            Self::Sortino => "sortino",
            Self::Calmar => "calmar",
            Self::Cagr => "cagr",
            Self::TotalReturn => "total_return",
            Self::WinRate => "win_rate",
            Self::ProfitFactor => "profit_factor",
            Self::Expectancy => "expectancy",
            Self::MaxDrawdown => "max_drawdown",
        }
    }
}

impl fmt::Display for FitnessMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FitnessMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        [
            Self::Sharpe,
            Self::Sortino,
            Self::Calmar,
            Self::Cagr,
            Self::TotalReturn,
            Self::WinRate,
            Self::ProfitFactor,
            Self::Expectancy,
            Self::MaxDrawdown,
        ]
        .into_iter()
        .find(|m| m.as_str() == wanted)
        .ok_or_else(|| format!("unknown fitness metric '{s}'"))
    }
}
