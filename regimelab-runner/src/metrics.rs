//! Performance metrics — pure functions that compute strategy statistics.
//!
//! Every metric is a pure function: equity curve and/or trade list in, scalar out.
//! Path-level functions (`sharpe_ratio`, `max_drawdown`, `total_return`) take
//! plain equity values so that Monte Carlo can reuse them on resampled paths.
//! Trade statistics consider closed trades only. Empty inputs yield zeros.

use regimelab_core::domain::Trade;
use regimelab_core::engine::EquityPoint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const TRADING_DAYS: f64 = 252.0;
const DAYS_PER_YEAR: f64 = 365.25;

/// Aggregate performance metrics for a single simulation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub cagr: f64,
    pub sharpe: f64,
    pub sortino: f64,
    /// Negative fraction, e.g. -0.15 for a 15% drawdown.
    pub max_drawdown: f64,
    pub calmar: f64,
    pub recovery_factor: f64,
    pub avg_drawdown_days: f64,
    pub max_drawdown_days: i64,
    /// RMS of percent drawdowns, in percent units.
    pub ulcer_index: f64,
    pub num_trades: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub expectancy: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
}

impl PerformanceMetrics {
    /// Compute all metrics from an equity curve and trade log.
    pub fn compute(equity_curve: &[EquityPoint], trades: &[Trade]) -> Self {
        let values: Vec<f64> = equity_curve.iter().map(|p| p.equity).collect();
        let closed: Vec<&Trade> = trades.iter().filter(|t| t.is_closed()).collect();
        let total = total_return(&values);
        let growth = cagr(equity_curve);
        let mdd = max_drawdown(&values);
        let (avg_dd_days, max_dd_days) = drawdown_durations(equity_curve);

        Self {
            total_return: total,
            cagr: growth,
            sharpe: sharpe_ratio(&values),
            sortino: sortino_ratio(&values),
            max_drawdown: mdd,
            calmar: ratio_to_drawdown(growth, mdd),
            recovery_factor: ratio_to_drawdown(total, mdd),
            avg_drawdown_days: avg_dd_days,
            max_drawdown_days: max_dd_days,
            ulcer_index: ulcer_index(&values),
            num_trades: closed.len(),
            win_rate: win_rate(&closed),
            profit_factor: profit_factor(&closed),
            expectancy: expectancy(&closed),
            avg_win: avg_of(&closed, |pnl| pnl > 0.0),
            avg_loss: avg_of(&closed, |pnl| pnl < 0.0),
            largest_win: closed.iter().map(|t| t.pnl).fold(0.0, f64::max),
            largest_loss: closed.iter().map(|t| t.pnl).fold(0.0, f64::min),
            max_consecutive_wins: max_consecutive(&closed, true),
            max_consecutive_losses: max_consecutive(&closed, false),
        }
    }

    /// Flat name → value view for persistence and reports.
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        let entries: [(&str, f64); 20] = [
            ("total_return", self.total_return),
            ("cagr", self.cagr),
            ("sharpe", self.sharpe),
            ("sortino", self.sortino),
            ("max_drawdown", self.max_drawdown),
            ("calmar", self.calmar),
            ("recovery_factor", self.recovery_factor),
            ("avg_drawdown_days", self.avg_drawdown_days),
            ("max_drawdown_days", self.max_drawdown_days as f64),
            ("ulcer_index", self.ulcer_index),
            ("num_trades", self.num_trades as f64),
            ("win_rate", self.win_rate),
            ("profit_factor", self.profit_factor),
            ("expectancy", self.expectancy),
            ("avg_win", self.avg_win),
            ("avg_loss", self.avg_loss),
            ("largest_win", self.largest_win),
            ("largest_loss", self.largest_loss),
            ("max_consecutive_wins", self.max_consecutive_wins as f64),
            ("max_consecutive_losses", self.max_consecutive_losses as f64),
        ];
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }
}

// ─── Path metrics ───────────────────────────────────────────────────

/// Total return as a fraction: (final - initial) / initial.
pub fn total_return(equity: &[f64]) -> f64 {
    match (equity.first(), equity.last()) {
        (Some(&initial), Some(&last)) if equity.len() >= 2 && initial > 0.0 => {
            (last - initial) / initial
        }
        _ => 0.0,
    }
}

/// Compound annual growth over elapsed calendar time (days / 365.25).
pub fn cagr(curve: &[EquityPoint]) -> f64 {
    let (Some(first), Some(last)) = (curve.first(), curve.last()) else {
        return 0.0;
    };
    let days = (last.date - first.date).num_days();
    if days <= 0 || first.equity <= 0.0 || last.equity <= 0.0 {
        return 0.0;
    }
    let years = days as f64 / DAYS_PER_YEAR;
    (last.equity / first.equity).powf(1.0 / years) - 1.0
}

/// Annualized Sharpe ratio from daily returns (sample std, × √252).
///
/// Returns 0.0 if variance is zero or fewer than 2 returns.
pub fn sharpe_ratio(equity: &[f64]) -> f64 {
    let returns = daily_returns(equity);
    if returns.len() < 2 {
        return 0.0;
    }
    let std = std_dev(&returns);
    if std < 1e-15 {
        return 0.0;
    }
    mean_f64(&returns) / std * TRADING_DAYS.sqrt()
}

/// Annualized Sortino ratio. Downside deviation is taken over all returns,
/// counting non-negative ones as zero.
pub fn sortino_ratio(equity: &[f64]) -> f64 {
    let returns = daily_returns(equity);
    if returns.len() < 2 {
        return 0.0;
    }
    let downside_sq: f64 = returns.iter().filter(|r| **r < 0.0).map(|r| r * r).sum();
    let downside_std = (downside_sq / returns.len() as f64).sqrt();
    if downside_std < 1e-15 {
        return 0.0;
    }
    mean_f64(&returns) / downside_std * TRADING_DAYS.sqrt()
}

/// Maximum drawdown as a negative fraction (e.g., -0.15 = 15% drawdown).
///
/// Returns 0.0 if equity is constant or monotonically increasing.
pub fn max_drawdown(equity: &[f64]) -> f64 {
    drawdowns(equity).fold(0.0, f64::min)
}

/// Ulcer Index: sqrt(mean(drawdown_pct²)), in percent units.
pub fn ulcer_index(equity: &[f64]) -> f64 {
    if equity.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = drawdowns(equity).map(|dd| (dd * 100.0).powi(2)).sum();
    (sum_sq / equity.len() as f64).sqrt()
}

/// Average and longest drawdown spell in calendar days. A spell runs from
/// the peak date to the first date equity is back at or above the peak, or
/// to the last date if it never recovers.
pub fn drawdown_durations(curve: &[EquityPoint]) -> (f64, i64) {
    let Some(first) = curve.first() else {
        return (0.0, 0);
    };
    let mut peak = *first;
    let mut in_drawdown = false;
    let mut spells: Vec<i64> = Vec::new();

    for p in curve {
        if p.equity >= peak.equity {
            if in_drawdown {
                spells.push((p.date - peak.date).num_days());
                in_drawdown = false;
            }
            peak = *p;
        } else {
            in_drawdown = true;
        }
    }
    if in_drawdown {
        if let Some(last) = curve.last() {
            spells.push((last.date - peak.date).num_days());
        }
    }

    if spells.is_empty() {
        return (0.0, 0);
    }
    let avg = spells.iter().sum::<i64>() as f64 / spells.len() as f64;
    (avg, spells.iter().copied().max().unwrap_or(0))
}

// ─── Trade metrics ──────────────────────────────────────────────────

/// Fraction of closed trades that made money.
pub fn win_rate(trades: &[&Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().filter(|t| t.is_winner()).count() as f64 / trades.len() as f64
}

/// Gross profits / gross losses, capped at 100.0 when there are no losses.
pub fn profit_factor(trades: &[&Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let gross_profit: f64 = trades.iter().filter(|t| t.pnl > 0.0).map(|t| t.pnl).sum();
    let gross_loss: f64 = trades.iter().filter(|t| t.pnl < 0.0).map(|t| -t.pnl).sum();

    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { 100.0 } else { 0.0 };
    }
    (gross_profit / gross_loss).min(100.0)
}

/// Mean P&L per closed trade.
pub fn expectancy(trades: &[&Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().map(|t| t.pnl).sum::<f64>() / trades.len() as f64
}

fn avg_of(trades: &[&Trade], keep: impl Fn(f64) -> bool) -> f64 {
    let picked: Vec<f64> = trades.iter().map(|t| t.pnl).filter(|p| keep(*p)).collect();
    mean_f64(&picked)
}

/// Longest run of winners (or losers) in the order trades were closed.
fn max_consecutive(trades: &[&Trade], winners: bool) -> usize {
    let mut by_exit = trades.to_vec();
    by_exit.sort_by_key(|t| (t.exit_date, t.entry_date));

    let mut max_streak = 0;
    let mut current = 0;

    for trade in by_exit {
        if trade.is_winner() == winners {
            current += 1;
            max_streak = max_streak.max(current);
        } else {
            current = 0;
        }
    }
    max_streak
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Compute daily returns from an equity curve.
pub fn daily_returns(equity: &[f64]) -> Vec<f64> {
    equity
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

/// Drawdown from the running peak at every point (≤ 0).
fn drawdowns(equity: &[f64]) -> impl Iterator<Item = f64> + '_ {
    let mut peak = f64::NEG_INFINITY;
    equity.iter().map(move |&eq| {
        peak = peak.max(eq);
        if peak > 0.0 {
            (eq - peak) / peak
        } else {
            0.0
        }
    })
}

/// `value / |mdd|`, or 0.0 when there was no drawdown.
fn ratio_to_drawdown(value: f64, mdd: f64) -> f64 {
    if mdd >= 0.0 {
        return 0.0;
    }
    value / mdd.abs()
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use regimelab_core::domain::{Direction, ExitReason};

    fn d(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, 2).unwrap() + chrono::Duration::days(offset)
    }

    fn curve(values: &[f64]) -> Vec<EquityPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, &equity)| EquityPoint {
                date: d(i as i64),
                equity,
            })
            .collect()
    }

    fn make_trade(pnl: f64) -> Trade {
        let mut t = Trade::open("SPY", Direction::Long, d(0), 100.0, 50.0, 0.0);
        t.finalize(d(5), 100.0 + pnl / 50.0, 0.0, ExitReason::TimeExit);
        t
    }

    fn refs(trades: &[Trade]) -> Vec<&Trade> {
        trades.iter().collect()
    }

    // ── Total return ──

    #[test]
    fn total_return_positive() {
        let eq = vec![100_000.0, 100_500.0, 101_000.0, 110_000.0];
        assert!((total_return(&eq) - 0.1).abs() < 1e-10);
    }

    #[test]
    fn total_return_degenerate() {
        assert_eq!(total_return(&[100_000.0]), 0.0);
        assert_eq!(total_return(&[]), 0.0);
    }

    // ── CAGR ──

    #[test]
    fn cagr_uses_calendar_years() {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let c = vec![
            EquityPoint { date: start, equity: 100.0 },
            EquityPoint {
                date: start + chrono::Duration::days(730),
                equity: 121.0,
            },
        ];
        // 730 / 365.25 ≈ 1.9986 years
        let expected = 1.21_f64.powf(365.25 / 730.0) - 1.0;
        assert!((cagr(&c) - expected).abs() < 1e-12);
    }

    #[test]
    fn cagr_single_point_is_zero() {
        assert_eq!(cagr(&curve(&[100.0])), 0.0);
    }

    // ── Sharpe / Sortino ──

    #[test]
    fn sharpe_constant_equity_is_zero() {
        assert_eq!(sharpe_ratio(&[100_000.0; 100]), 0.0);
    }

    #[test]
    fn sharpe_known_returns() {
        let mut eq = vec![100_000.0];
        for i in 1..253 {
            let r = if i % 2 == 0 { 1.002 } else { 1.0005 };
            eq.push(eq[i - 1] * r);
        }
        let s = sharpe_ratio(&eq);
        assert!(s > 5.0, "Sharpe should be high, got {s}");
    }

    #[test]
    fn sortino_no_downside_is_zero() {
        let eq: Vec<f64> = (0..100).map(|i| 100_000.0 + i as f64 * 100.0).collect();
        assert_eq!(sortino_ratio(&eq), 0.0);
    }

    #[test]
    fn sortino_divides_by_all_returns() {
        // returns: +10%, -5%
        let eq = [100.0, 110.0, 104.5];
        let downside = (0.0025_f64 / 2.0).sqrt();
        let expected = 0.025 / downside * 252f64.sqrt();
        assert!((sortino_ratio(&eq) - expected).abs() < 1e-9);
    }

    // ── Drawdown family ──

    #[test]
    fn max_drawdown_known() {
        let eq = vec![100_000.0, 110_000.0, 90_000.0, 95_000.0];
        let expected = (90_000.0 - 110_000.0) / 110_000.0;
        assert!((max_drawdown(&eq) - expected).abs() < 1e-10);
        assert_eq!(max_drawdown(&[]), 0.0);
    }

    #[test]
    fn ulcer_index_known() {
        // drawdowns: 0, -10%, 0 → sqrt(100 / 3)
        let eq = [100.0, 90.0, 100.0];
        assert!((ulcer_index(&eq) - (100.0_f64 / 3.0).sqrt()).abs() < 1e-10);
    }

    #[test]
    fn drawdown_durations_recovered_and_open() {
        // peak d0, recover d3 (3 days); peak d4, never recovers to d6 (2 days)
        let c = curve(&[100.0, 95.0, 97.0, 100.0, 105.0, 101.0, 102.0]);
        let (avg, max) = drawdown_durations(&c);
        assert_eq!(max, 3);
        assert!((avg - 2.5).abs() < 1e-12);
    }

    #[test]
    fn calmar_zero_without_drawdown() {
        let c = curve(&[100.0, 101.0, 102.0]);
        let m = PerformanceMetrics::compute(&c, &[]);
        assert_eq!(m.calmar, 0.0);
        assert_eq!(m.recovery_factor, 0.0);
    }

    // ── Trades ──

    #[test]
    fn trade_statistics() {
        let trades = vec![
            make_trade(500.0),
            make_trade(-200.0),
            make_trade(300.0),
            make_trade(-100.0),
            make_trade(-100.0),
        ];
        let closed = refs(&trades);
        assert!((win_rate(&closed) - 0.4).abs() < 1e-10);
        assert!((profit_factor(&closed) - 2.0).abs() < 1e-10);
        assert!((expectancy(&closed) - 80.0).abs() < 1e-10);
        assert_eq!(max_consecutive(&closed, false), 2);
        assert_eq!(max_consecutive(&closed, true), 1);
    }

    #[test]
    fn streaks_follow_exit_order() {
        // Entered first but closed last: the two later losers exit between
        // the winners, so no win streak is longer than one.
        let mut long_hold = Trade::open("AAA", Direction::Long, d(0), 100.0, 10.0, 0.0);
        long_hold.finalize(d(30), 110.0, 0.0, ExitReason::TimeExit);
        let mut quick_win = Trade::open("BBB", Direction::Long, d(1), 100.0, 10.0, 0.0);
        quick_win.finalize(d(3), 105.0, 0.0, ExitReason::TakeProfit);
        let mut loss_a = Trade::open("CCC", Direction::Long, d(2), 100.0, 10.0, 0.0);
        loss_a.finalize(d(10), 95.0, 0.0, ExitReason::StopLoss);
        let mut loss_b = Trade::open("DDD", Direction::Long, d(4), 100.0, 10.0, 0.0);
        loss_b.finalize(d(12), 95.0, 0.0, ExitReason::StopLoss);

        let trades = vec![long_hold, quick_win, loss_a, loss_b];
        let closed = refs(&trades);
        assert_eq!(max_consecutive(&closed, true), 1);
        assert_eq!(max_consecutive(&closed, false), 2);
    }

    #[test]
    fn profit_factor_capped() {
        let trades = vec![make_trade(500.0), make_trade(300.0)];
        assert!((profit_factor(&refs(&trades)) - 100.0).abs() < 1e-10);
        assert_eq!(profit_factor(&[]), 0.0);
    }

    #[test]
    fn open_trades_are_ignored() {
        let mut trades = vec![make_trade(100.0)];
        trades.push(Trade::open("QQQ", Direction::Long, d(1), 50.0, 10.0, 0.0));
        let m = PerformanceMetrics::compute(&curve(&[100.0, 101.0]), &trades);
        assert_eq!(m.num_trades, 1);
        assert_eq!(m.largest_win, 100.0);
        assert_eq!(m.largest_loss, 0.0);
    }

    // ── Aggregate ──

    #[test]
    fn empty_inputs_are_zero() {
        let m = PerformanceMetrics::compute(&[], &[]);
        assert_eq!(m, PerformanceMetrics::default());
    }

    #[test]
    fn to_map_exposes_every_metric() {
        let mut eq = vec![100_000.0];
        for i in 1..253 {
            let r = if i % 3 == 0 { 0.998 } else { 1.002 };
            eq.push(eq[i - 1] * r);
        }
        let trades = vec![make_trade(500.0), make_trade(-200.0)];
        let m = PerformanceMetrics::compute(&curve(&eq), &trades);
        let map = m.to_map();
        assert_eq!(map["num_trades"], 2.0);
        assert_eq!(map["sharpe"], m.sharpe);
        assert!(map.values().all(|v| v.is_finite()));
    }
}
