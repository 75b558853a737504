//! Property tests for engine invariants.
//!
//! Uses proptest to verify:
//! 1. Budget — combined gross weight never exceeds the active risk budget
//! 2. Per-name cap — no new weight exceeds budget / top_k
//! 3. Cash accounting — final cash reconciles against the trade log
//! 4. No overlap — a symbol is never held twice, never re-entered the day it exits
//! 5. Concentration — concurrent holdings never exceed top_k

use chrono::NaiveDate;
use proptest::prelude::*;
use regimelab_core::domain::{Bar, PortfolioState};
use regimelab_core::engine::{simulate, SimulationConfigBuilder, SizingMode};
use regimelab_core::features::{
    align_symbols, build_feature_set, FeatureRow, FeatureSet, FeatureSpec,
};
use regimelab_core::regime::RegimeClassifier;
use regimelab_core::risk::RiskManager;
use regimelab_core::strategy::{StrategyCore, StrategyKind, StrategyParams, TargetWeights};
use std::collections::BTreeMap;

const SYMBOLS: [&str; 4] = ["AAA", "BBB", "CCC", "DDD"];

fn day(i: usize) -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 1, 4).unwrap() + chrono::Duration::days(i as i64)
}

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_weights() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-1.0..1.0_f64, SYMBOLS.len())
}

fn arb_returns(n: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-0.04..0.04_f64, n)
}

fn arb_kind() -> impl Strategy<Value = StrategyKind> {
    (0..StrategyKind::ALL.len()).prop_map(|i| StrategyKind::ALL[i])
}

// ── Fixtures ─────────────────────────────────────────────────────────

/// One-date feature set where every symbol has a usable close and ATR.
fn single_day() -> (FeatureSet, Vec<String>) {
    let symbols: BTreeMap<String, Vec<FeatureRow>> = SYMBOLS
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let close = 50.0 + 10.0 * i as f64;
            let row = FeatureRow {
                atr_14: 1.5,
                ..FeatureRow::from_prices(close, close + 1.0, close - 1.0, close, 1e5)
            };
            (s.to_string(), vec![row])
        })
        .collect();
    let fs = FeatureSet::new(vec![day(0)], symbols).unwrap();
    let universe = SYMBOLS.iter().map(|s| s.to_string()).collect();
    (fs, universe)
}

fn to_targets(weights: &[f64]) -> TargetWeights {
    SYMBOLS
        .iter()
        .zip(weights)
        .filter(|(_, w)| **w != 0.0)
        .map(|(s, w)| (s.to_string(), *w))
        .collect()
}

/// Random-walk bars: each symbol gets its own slice of `returns`, shifted by
/// a per-symbol drift so that some trend and some chop.
fn walk(symbol: &str, returns: &[f64], drift: f64) -> Vec<Bar> {
    let mut close = 100.0;
    returns
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let open = close;
            close = (close * (1.0 + r + drift)).max(1.0);
            Bar {
                symbol: symbol.to_string(),
                date: day(i),
                open,
                high: open.max(close) * 1.01,
                low: open.min(close) * 0.99,
                close,
                volume: 1e6,
            }
        })
        .collect()
}

fn market(returns: &[f64], days: usize) -> FeatureSet {
    let mut map = BTreeMap::new();
    map.insert("SPY".to_string(), walk("SPY", &returns[..days], 0.001));
    for (k, s) in SYMBOLS.iter().enumerate() {
        let slice = &returns[(k + 1) * days..(k + 2) * days];
        let drift = [0.004, -0.004, 0.0, 0.002][k];
        map.insert(s.to_string(), walk(s, slice, drift));
    }
    build_feature_set(&align_symbols(map), "SPY", &FeatureSpec::default()).unwrap()
}

const DAYS: usize = 160;

// ── 1 & 2. Budget and per-name cap ───────────────────────────────────

proptest! {
    #[test]
    fn combined_weight_never_exceeds_budget(
        first in arb_weights(),
        second in arb_weights(),
        top_k in 1usize..5,
        budget_a in 0.1..1.5_f64,
        budget_b in 0.1..1.5_f64,
    ) {
        let (fs, universe) = single_day();
        let view = fs.view(0, &universe);
        let params = StrategyParams { top_k, ..StrategyParams::default() };
        let mut core = StrategyCore::new(params, RiskManager::default());
        let empty = PortfolioState::new(100_000.0);

        // First pass opens positions, second runs with a (possibly smaller)
        // budget next to them.
        for (weights, budget) in [(&first, budget_a), (&second, budget_b)] {
            let open_before: Vec<String> = core.book().symbols();
            let out = core.apply_budget(&to_targets(weights), &view, &empty, budget);
            let gross: f64 = out.values().map(|w| w.abs()).sum();
            prop_assert!(gross <= budget + 1e-9, "gross {} > budget {}", gross, budget);

            for (symbol, w) in &out {
                if !open_before.contains(symbol) {
                    prop_assert!(w.abs() <= budget / top_k as f64 + 1e-12);
                }
            }
        }
    }

    #[test]
    fn held_symbols_are_never_reentered(weights in arb_weights()) {
        let (fs, universe) = single_day();
        let view = fs.view(0, &universe);
        let mut core = StrategyCore::new(StrategyParams::default(), RiskManager::default());

        let mut held = PortfolioState::new(100_000.0);
        let opened = core.apply_budget(&to_targets(&weights), &view, &held, 1.0);
        // Pretend the ledger filled everything, then the strategy forgot them.
        for symbol in opened.keys() {
            let pos = core.book_mut().remove(symbol).unwrap();
            held.holdings.insert(symbol.clone(), regimelab_core::domain::Holding {
                symbol: symbol.clone(),
                direction: pos.direction,
                shares: 1.0,
                entry_price: pos.entry_price,
                entry_date: pos.entry_date,
                trade_index: 0,
            });
        }

        let again = core.apply_budget(&to_targets(&weights), &view, &held, 1.0);
        for symbol in opened.keys() {
            prop_assert!(!again.contains_key(symbol));
        }
    }
}

// ── 3, 4 & 5. Whole-run invariants ───────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn simulation_invariants_hold(
        returns in arb_returns(DAYS * (SYMBOLS.len() + 1)),
        kind in arb_kind(),
        top_k in 1usize..4,
        holding in 1u32..15,
        slippage in 0.0..0.005_f64,
        kelly in any::<bool>(),
    ) {
        let fs = market(&returns, DAYS);
        let universe: Vec<String> = SYMBOLS.iter().map(|s| s.to_string()).collect();
        let sizing = if kelly {
            SizingMode::Kelly { win_probability: 0.55 }
        } else {
            SizingMode::TargetWeight
        };
        let initial = 100_000.0;
        let config = SimulationConfigBuilder::new(kind, universe, "SPY", day(60), day(DAYS - 1))
            .params(StrategyParams {
                top_k,
                holding_period_days: holding,
                ..StrategyParams::default()
            })
            .initial_cash(initial)
            .costs(0.0005, 1.0, slippage)
            .sizing(sizing)
            .regime(RegimeClassifier::new(20, 5))
            .build()
            .unwrap();

        let out = simulate(&config, &fs).unwrap();

        prop_assert_eq!(out.equity_curve.len(), DAYS - 60);
        prop_assert_eq!(out.equity_curve[0].equity, initial);
        prop_assert!(out.equity_curve.iter().all(|p| p.equity.is_finite()));
        let last = out.equity_curve.last().unwrap();
        prop_assert!((last.equity - out.final_state.equity).abs() < 1e-6);

        // Cash reconciles against the trade log.
        let mut expected_cash = initial;
        for t in &out.trades {
            if t.is_closed() {
                expected_cash += t.pnl;
            } else {
                expected_cash -= t.direction.sign() * t.size * t.entry_price + t.entry_commission;
            }
        }
        prop_assert!(
            (out.final_state.cash - expected_cash).abs() < 1e-6 * initial,
            "cash {} vs trade log {}", out.final_state.cash, expected_cash
        );
        let open_trades = out.trades.iter().filter(|t| !t.is_closed()).count();
        prop_assert_eq!(open_trades, out.final_state.holdings.len());

        // Per symbol: intervals never overlap, and no same-day re-entry.
        let mut by_symbol: BTreeMap<&str, Vec<_>> = BTreeMap::new();
        for t in &out.trades {
            by_symbol.entry(t.symbol.as_str()).or_default().push(t);
        }
        for trades in by_symbol.values() {
            for pair in trades.windows(2) {
                let exit = pair[0].exit_date;
                prop_assert!(exit.is_some(), "{} re-entered while open", pair[1].symbol);
                prop_assert!(pair[1].entry_date > exit.unwrap());
            }
        }

        // Concurrent holdings stay within top_k.
        for p in &out.equity_curve {
            let live = out
                .trades
                .iter()
                .filter(|t| t.entry_date <= p.date && t.exit_date.map_or(true, |x| x > p.date))
                .count();
            prop_assert!(live <= top_k, "{} holdings on {}", live, p.date);
        }
    }
}
