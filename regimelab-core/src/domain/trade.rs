//! Trade — one entry/exit round trip in the append-only trade log.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Side of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1.0 for long, -1.0 for short.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    /// Direction implied by the sign of a target weight.
    pub fn from_weight(weight: f64) -> Self {
        if weight < 0.0 {
            Direction::Short
        } else {
            Direction::Long
        }
    }
}

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
    TimeExit,
    TrendReversal,
    RegimeExit,
    ChannelExit,
    RsiNormalized,
    DeathCross,
    /// The symbol left the target set without a strategy exit signal.
    Rebalance,
}

impl ExitReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ExitReason::TakeProfit => "take_profit",
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TimeExit => "time_exit",
            ExitReason::TrendReversal => "trend_reversal",
            ExitReason::RegimeExit => "regime_exit",
            ExitReason::ChannelExit => "channel_exit",
            ExitReason::RsiNormalized => "rsi_normalized",
            ExitReason::DeathCross => "death_cross",
            ExitReason::Rebalance => "rebalance",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A trade record. Open trades have no exit fields; a trade is finalized once.
///
/// Prices are fill prices, i.e. they already include slippage. Commissions are
/// carried separately so that
/// `pnl == (exit_price - entry_price) * size * sign - entry_commission - exit_commission`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub symbol: String,
    pub direction: Direction,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    /// Share count (always positive; the side lives in `direction`).
    pub size: f64,
    pub entry_commission: f64,
    pub exit_date: Option<NaiveDate>,
    pub exit_price: Option<f64>,
    pub exit_commission: f64,
    pub exit_reason: Option<ExitReason>,
    pub pnl: f64,
    pub pnl_pct: f64,
}

impl Trade {
    pub fn open(
        symbol: impl Into<String>,
        direction: Direction,
        entry_date: NaiveDate,
        entry_price: f64,
        size: f64,
        entry_commission: f64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            direction,
            entry_date,
            entry_price,
            size,
            entry_commission,
            exit_date: None,
            exit_price: None,
            exit_commission: 0.0,
            exit_reason: None,
            pnl: 0.0,
            pnl_pct: 0.0,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.exit_date.is_some()
    }

    /// Close the trade and realize its P&L.
    ///
    /// Returns `false` (and leaves the record untouched) if the trade was already closed.
    pub fn finalize(
        &mut self,
        exit_date: NaiveDate,
        exit_price: f64,
        exit_commission: f64,
        reason: ExitReason,
    ) -> bool {
        if self.is_closed() {
            return false;
        }
        let gross = (exit_price - self.entry_price) * self.size * self.direction.sign();
        self.pnl = gross - self.entry_commission - exit_commission;
        let basis = self.entry_price * self.size;
        self.pnl_pct = if basis > 0.0 { self.pnl / basis } else { 0.0 };
        self.exit_date = Some(exit_date);
        self.exit_price = Some(exit_price);
        self.exit_commission = exit_commission;
        self.exit_reason = Some(reason);
        true
    }

    pub fn is_winner(&self) -> bool {
        self.is_closed() && self.pnl > 0.0
    }

    /// Calendar days between entry and exit (0 while open).
    pub fn holding_days(&self) -> i64 {
        self.exit_date
            .map(|exit| (exit - self.entry_date).num_days())
            .unwrap_or(0)
    }
}
