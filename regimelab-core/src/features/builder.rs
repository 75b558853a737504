//! Turns aligned OHLCV bars into a `FeatureSet`.

use super::{AlignedBars, FeatureError, FeatureRow, FeatureSet};
use crate::indicators::{
    Atr, Bollinger, BollingerBand, Indicator, MacdHistogram, PriorExtreme, PriorExtremeKind, Rsi,
    Sma,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tunable parts of the feature pipeline. Column periods are fixed by name.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpec {
    /// Lookback of the relative-strength return ratio.
    pub rs_lookback: usize,
    /// Bollinger band width in standard deviations.
    pub bollinger_k: f64,
}

impl Default for FeatureSpec {
    fn default() -> Self {
        Self {
            rs_lookback: 63,
            bollinger_k: 2.0,
        }
    }
}

/// Ratio of the symbol's `lookback`-day return to the benchmark's.
///
/// rs[t] = (close[t] / close[t-L]) / (bench[t] / bench[t-L]); NaN when any
/// input is undefined or non-positive.
pub fn relative_strength(closes: &[f64], benchmark: &[f64], lookback: usize) -> Vec<f64> {
    let n = closes.len().min(benchmark.len());
    let mut out = vec![f64::NAN; closes.len()];
    if lookback == 0 {
        return out;
    }
    for t in lookback..n {
        let (c0, c1) = (closes[t - lookback], closes[t]);
        let (b0, b1) = (benchmark[t - lookback], benchmark[t]);
        if [c0, c1, b0, b1].iter().all(|v| v.is_finite() && *v > 0.0) {
            out[t] = (c1 / c0) / (b1 / b0);
        }
    }
    out
}

/// Compute every feature column for every symbol in `aligned`.
pub fn build_feature_set(
    aligned: &AlignedBars,
    benchmark: &str,
    spec: &FeatureSpec,
) -> Result<FeatureSet, FeatureError> {
    let bench_closes: Vec<f64> = aligned
        .bars
        .get(benchmark)
        .ok_or_else(|| FeatureError::MissingBenchmark(benchmark.to_string()))?
        .iter()
        .map(|b| b.close)
        .collect();

    let sma20 = Sma::new(20);
    let sma50 = Sma::new(50);
    let sma200 = Sma::new(200);
    let rsi = Rsi::new(14);
    let atr = Atr::new(14);
    let macd = MacdHistogram::default();
    let bb_up = Bollinger::new(20, spec.bollinger_k, BollingerBand::Upper);
    let bb_mid = Bollinger::new(20, spec.bollinger_k, BollingerBand::Middle);
    let bb_lo = Bollinger::new(20, spec.bollinger_k, BollingerBand::Lower);
    let hi20 = PriorExtreme::new(20, PriorExtremeKind::High);
    let lo20 = PriorExtreme::new(20, PriorExtremeKind::Low);

    let mut symbols = BTreeMap::new();
    for (symbol, bars) in &aligned.bars {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let cols = [
            sma20.compute(bars),
            sma50.compute(bars),
            sma200.compute(bars),
            rsi.compute(bars),
            atr.compute(bars),
            macd.compute(bars),
            bb_up.compute(bars),
            bb_mid.compute(bars),
            bb_lo.compute(bars),
            hi20.compute(bars),
            lo20.compute(bars),
            relative_strength(&closes, &bench_closes, spec.rs_lookback),
        ];
        let rows = bars
            .iter()
            .enumerate()
            .map(|(i, b)| {
                if b.is_void() {
                    return FeatureRow::void();
                }
                FeatureRow {
                    open: b.open,
                    high: b.high,
                    low: b.low,
                    close: b.close,
                    volume: b.volume,
                    sma_20: cols[0][i],
                    sma_50: cols[1][i],
                    sma_200: cols[2][i],
                    rsi_14: cols[3][i],
                    atr_14: cols[4][i],
                    macd_hist: cols[5][i],
                    bb_upper: cols[6][i],
                    bb_middle: cols[7][i],
                    bb_lower: cols[8][i],
                    high_20: cols[9][i],
                    low_20: cols[10][i],
                    rel_strength: cols[11][i],
                }
            })
            .collect();
        symbols.insert(symbol.clone(), rows);
    }

    FeatureSet::new(aligned.dates.clone(), symbols)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Bar;
    use chrono::NaiveDate;

    fn series(symbol: &str, n: usize, f: impl Fn(usize) -> f64) -> Vec<Bar> {
        let base = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        (0..n)
            .map(|i| {
                let c = f(i);
                Bar {
                    symbol: symbol.into(),
                    date: base + chrono::Duration::days(i as i64),
                    open: c,
                    high: c + 1.0,
                    low: c - 1.0,
                    close: c,
                    volume: 1e6,
                }
            })
            .collect()
    }

    fn aligned(n: usize) -> AlignedBars {
        let mut bars = BTreeMap::new();
        bars.insert("SPY".to_string(), series("SPY", n, |i| 100.0 + i as f64 * 0.1));
        bars.insert("AAA".to_string(), series("AAA", n, |i| 50.0 + i as f64 * 0.2));
        super::super::align_symbols(bars)
    }

    #[test]
    fn relative_strength_ratio() {
        let rs = relative_strength(&[10.0, 20.0], &[100.0, 110.0], 1);
        assert!(rs[0].is_nan());
        assert!((rs[1] - 2.0 / 1.1).abs() < 1e-12);
    }

    #[test]
    fn builds_all_columns_after_warmup() {
        let fs = build_feature_set(&aligned(260), "SPY", &FeatureSpec::default()).unwrap();
        let row = fs.series("AAA").unwrap()[259];
        for v in [
            row.sma_20, row.sma_50, row.sma_200, row.rsi_14, row.atr_14, row.macd_hist,
            row.bb_upper, row.bb_middle, row.bb_lower, row.high_20, row.low_20, row.rel_strength,
        ] {
            assert!(v.is_finite());
        }
        assert!(fs.series("AAA").unwrap()[100].sma_200.is_nan());
        // AAA rises faster than SPY in relative terms.
        assert!(row.rel_strength > 1.0);
    }

    #[test]
    fn missing_benchmark_is_error() {
        let err = build_feature_set(&aligned(10), "QQQ", &FeatureSpec::default()).unwrap_err();
        assert_eq!(err, FeatureError::MissingBenchmark("QQQ".into()));
    }
}
