//! End-to-end simulation scenarios on hand-built feature rows.
//!
//! Each scenario follows a GIVEN/WHEN/THEN shape: a small market with a
//! benchmark that pins the regime, one traded symbol whose rows force a
//! specific entry and exit, and assertions on the resulting trade log and
//! equity curve.
//!
//! Timeline: rows 0..8, regime classifier (3, 1), so the regime is defined
//! from row 3. Row 3 is the inception date, row 4 the entry, rows 5+ exits.

use chrono::NaiveDate;
use regimelab_core::domain::{Bar, Direction, ExitReason};
use regimelab_core::engine::{simulate, RunOutput, SimulationConfigBuilder};
use regimelab_core::features::{align_symbols, build_feature_set, FeatureRow, FeatureSet, FeatureSpec};
use regimelab_core::regime::{MarketRegime, RegimeClassifier};
use regimelab_core::risk::RiskLimits;
use regimelab_core::strategy::{StrategyKind, StrategyParams};
use std::collections::BTreeMap;

const N: usize = 8;

fn day(i: usize) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 4, 1).unwrap() + chrono::Duration::days(i as i64)
}

#[derive(Clone, Copy)]
enum Bench {
    Rising,
    Falling,
    Flat,
}

fn bench(kind: Bench) -> Vec<FeatureRow> {
    (0..N)
        .map(|i| {
            let c = match kind {
                Bench::Rising => 100.0 + i as f64,
                Bench::Falling => 200.0 - i as f64,
                Bench::Flat => 100.0,
            };
            FeatureRow::from_prices(c, c + 0.5, c - 0.5, c, 1e6)
        })
        .collect()
}

/// A row at 100 that triggers nothing for any variant: no channel break, RSI
/// mid-range, trend intact for longs.
fn quiet() -> FeatureRow {
    FeatureRow {
        sma_20: 95.0,
        sma_50: 90.0,
        sma_200: 90.0,
        rsi_14: 40.0,
        atr_14: 2.0,
        macd_hist: 0.1,
        bb_upper: 110.0,
        bb_middle: 105.0,
        bb_lower: 90.0,
        high_20: 200.0,
        low_20: 0.0,
        rel_strength: 1.0,
        ..FeatureRow::from_prices(100.0, 101.0, 99.0, 100.0, 1e6)
    }
}

fn market(bench_kind: Bench, aaa: Vec<FeatureRow>) -> FeatureSet {
    let mut symbols = BTreeMap::new();
    symbols.insert("SPY".to_string(), bench(bench_kind));
    symbols.insert("AAA".to_string(), aaa);
    FeatureSet::new((0..N).map(day).collect(), symbols).unwrap()
}

fn run(kind: StrategyKind, params: StrategyParams, risk: RiskLimits, fs: &FeatureSet) -> RunOutput {
    let config = SimulationConfigBuilder::new(kind, vec!["AAA".into()], "SPY", day(3), day(N - 1))
        .params(params)
        .initial_cash(100_000.0)
        .risk(risk)
        .regime(RegimeClassifier::new(3, 1))
        .record_regimes(true)
        .build()
        .unwrap();
    simulate(&config, fs).unwrap()
}

fn two_slots() -> StrategyParams {
    StrategyParams {
        top_k: 2,
        holding_period_days: 30,
        ..StrategyParams::default()
    }
}

/// Rows for a long breakout on row 4 (entry 100, ATR 2: stop 96, target 108).
fn breakout_then(exit_row: FeatureRow) -> Vec<FeatureRow> {
    let mut rows = vec![quiet(); N];
    rows[4].high_20 = 95.0;
    rows[5] = exit_row;
    rows
}

// ── Long exits ───────────────────────────────────────────────────────

#[test]
fn breakout_exits_at_take_profit() {
    // GIVEN a Bull market and a breakout whose next bar trades through 108
    let exit = FeatureRow {
        open: 101.0,
        high: 109.0,
        low: 100.0,
        close: 105.0,
        ..quiet()
    };
    let fs = market(Bench::Rising, breakout_then(exit));

    // WHEN momentum breakout runs with two slots
    let out = run(StrategyKind::MomentumBreakout, two_slots(), RiskLimits::default(), &fs);

    // THEN half the budget went in and came out at the target
    assert_eq!(out.trades.len(), 1);
    let t = &out.trades[0];
    assert_eq!(t.direction, Direction::Long);
    assert_eq!(t.entry_date, day(4));
    assert_eq!(t.size, 500.0);
    assert_eq!(t.exit_reason, Some(ExitReason::TakeProfit));
    assert_eq!(t.exit_price, Some(108.0));
    assert!((t.pnl - 4_000.0).abs() < 1e-9);
    assert!((out.final_state.equity - 104_000.0).abs() < 1e-9);
    assert!(out.events.is_empty());
}

#[test]
fn gap_through_target_fills_at_open() {
    let exit = FeatureRow {
        open: 112.0,
        high: 113.0,
        low: 111.0,
        close: 112.5,
        ..quiet()
    };
    let fs = market(Bench::Rising, breakout_then(exit));
    let out = run(StrategyKind::MomentumBreakout, two_slots(), RiskLimits::default(), &fs);
    assert_eq!(out.trades[0].exit_price, Some(112.0));
}

#[test]
fn breakout_exits_at_stop_on_close() {
    let exit = FeatureRow {
        open: 100.0,
        high: 100.0,
        low: 94.0,
        close: 95.0,
        ..quiet()
    };
    let fs = market(Bench::Rising, breakout_then(exit));
    let out = run(StrategyKind::MomentumBreakout, two_slots(), RiskLimits::default(), &fs);

    let t = &out.trades[0];
    assert_eq!(t.exit_reason, Some(ExitReason::StopLoss));
    assert_eq!(t.exit_price, Some(95.0));
    assert!((t.pnl + 2_500.0).abs() < 1e-9);
}

#[test]
fn holding_period_closes_stale_position() {
    // GIVEN a two-day holding period and nothing else firing
    let fs = market(Bench::Rising, breakout_then(quiet()));
    let params = StrategyParams {
        holding_period_days: 2,
        ..two_slots()
    };

    // WHEN the run reaches the second calendar day after entry
    let out = run(StrategyKind::MomentumBreakout, params, RiskLimits::default(), &fs);

    // THEN the trade is closed at that day's close
    let t = &out.trades[0];
    assert_eq!(t.exit_reason, Some(ExitReason::TimeExit));
    assert_eq!(t.exit_date, Some(day(6)));
    assert_eq!(t.holding_days(), 2);
}

// ── Regime gating ────────────────────────────────────────────────────

#[test]
fn bear_market_blocks_long_breakouts() {
    let fs = market(Bench::Falling, breakout_then(quiet()));
    let out = run(StrategyKind::MomentumBreakout, two_slots(), RiskLimits::default(), &fs);

    assert!(out.trades.is_empty());
    let regimes = out.regime_history.unwrap();
    assert_eq!(regimes.len(), N - 3);
    assert!(regimes.iter().all(|p| p.regime == MarketRegime::Bear));
    assert!(out.equity_curve.iter().all(|p| p.equity == 100_000.0));
}

#[test]
fn short_momentum_covers_at_target_in_bear_market() {
    // GIVEN a Bear market and a breakdown on row 4 (stop 104, target 92)
    let base = FeatureRow {
        sma_50: 110.0,
        ..quiet()
    };
    let mut rows = vec![base; N];
    rows[4].low_20 = 105.0;
    rows[5] = FeatureRow {
        open: 93.0,
        high: 94.0,
        low: 90.0,
        close: 91.0,
        ..base
    };
    let fs = market(Bench::Falling, rows);

    // WHEN short momentum runs
    let out = run(StrategyKind::ShortMomentum, two_slots(), RiskLimits::default(), &fs);

    // THEN it shorted 500 shares and covered at the target
    let t = &out.trades[0];
    assert_eq!(t.direction, Direction::Short);
    assert_eq!(t.size, 500.0);
    assert_eq!(t.exit_reason, Some(ExitReason::TakeProfit));
    assert_eq!(t.exit_price, Some(92.0));
    assert!((t.pnl - 4_000.0).abs() < 1e-9);
    assert!((out.final_state.cash - 104_000.0).abs() < 1e-9);
}

#[test]
fn neutral_regime_uses_defensive_budget() {
    // GIVEN a flat benchmark (Neutral) and an oversold dip above SMA200
    let mut rows = vec![quiet(); N];
    rows[4].rsi_14 = 20.0;
    let fs = market(Bench::Flat, rows);
    let params = StrategyParams {
        top_k: 1,
        ..two_slots()
    };
    let risk = RiskLimits {
        max_position_size: 1.0,
        ..RiskLimits::default()
    };

    // WHEN mean reversion, which favors Bull, trades in Neutral
    let out = run(StrategyKind::MeanReversion, params, risk, &fs);

    // THEN only the 0.5 defensive budget is deployed
    assert_eq!(out.trades.len(), 1);
    assert_eq!(out.trades[0].size, 500.0);
    assert!(!out.trades[0].is_closed());
}

#[test]
fn range_reversion_gets_full_budget_in_neutral() {
    let mut rows = vec![quiet(); N];
    rows[4].bb_lower = 102.0;
    let fs = market(Bench::Flat, rows);
    let params = StrategyParams {
        top_k: 1,
        ..two_slots()
    };
    let risk = RiskLimits {
        max_position_size: 1.0,
        ..RiskLimits::default()
    };

    let out = run(StrategyKind::RangeReversion, params, risk, &fs);

    assert_eq!(out.trades[0].size, 1_000.0);
    // close 100 is below the 105 middle band on row 5, so it stays open
    assert!(!out.trades[0].is_closed());
}

// ── Determinism ──────────────────────────────────────────────────────

#[test]
fn identical_inputs_give_identical_runs() {
    let exit = FeatureRow {
        open: 101.0,
        high: 109.0,
        low: 100.0,
        close: 105.0,
        ..quiet()
    };
    let fs = market(Bench::Rising, breakout_then(exit));
    let a = run(StrategyKind::MomentumBreakout, two_slots(), RiskLimits::default(), &fs);
    let b = run(StrategyKind::MomentumBreakout, two_slots(), RiskLimits::default(), &fs);
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}

// ── Benchmark gaps ───────────────────────────────────────────────────

fn rising_bars(symbol: &str, n: usize, skip: Option<usize>) -> Vec<Bar> {
    (0..n)
        .filter(|&i| Some(i) != skip)
        .map(|i| {
            let close = 100.0 + 0.5 * i as f64;
            Bar {
                symbol: symbol.to_string(),
                date: day(i),
                open: close - 0.2,
                high: close + 0.5,
                low: close - 0.5,
                close,
                volume: 1e6,
            }
        })
        .collect()
}

#[test]
fn one_missing_benchmark_bar_only_neutralizes_that_date() {
    // GIVEN 600 rising days where SPY has no bar on day 250
    const DAYS: usize = 600;
    const GAP: usize = 250;
    let mut bars = BTreeMap::new();
    bars.insert("SPY".to_string(), rising_bars("SPY", DAYS, Some(GAP)));
    bars.insert("AAA".to_string(), rising_bars("AAA", DAYS, None));
    let fs = build_feature_set(&align_symbols(bars), "SPY", &FeatureSpec::default()).unwrap();
    assert!(fs.series("SPY").unwrap()[GAP].is_void());

    // WHEN the default 200/20 classifier labels the whole run
    let config = SimulationConfigBuilder::new(
        StrategyKind::MomentumBreakout,
        vec!["AAA".into()],
        "SPY",
        day(0),
        day(DAYS - 1),
    )
    .record_regimes(true)
    .build()
    .unwrap();
    let out = simulate(&config, &fs).unwrap();
    let history = out.regime_history.unwrap();
    assert_eq!(history.len(), DAYS);

    // THEN only warmup and the gap itself are Neutral
    let warmup = 199 + 20;
    for (t, point) in history.iter().enumerate() {
        let expected = if t < warmup || t == GAP {
            MarketRegime::Neutral
        } else {
            MarketRegime::Bull
        };
        assert_eq!(point.regime, expected, "regime on day {t}");
    }
}
