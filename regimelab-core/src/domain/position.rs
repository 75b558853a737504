//! Strategy-owned open positions.
//!
//! Each strategy instance owns exactly one `PositionBook`. The book is the
//! strategy's own view of what it holds (entry reference, exit thresholds);
//! the portfolio ledger keeps the cash-side holding separately.

use super::trade::Direction;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A position a strategy has accepted and is managing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenPosition {
    pub symbol: String,
    pub direction: Direction,
    pub entry_date: NaiveDate,
    /// Reference close on the acceptance date (before slippage).
    pub entry_price: f64,
    /// Signed target weight the position was accepted with.
    pub weight: f64,
    pub stop_price: f64,
    pub take_profit_price: f64,
}

impl OpenPosition {
    /// Calendar days since entry.
    pub fn days_held(&self, today: NaiveDate) -> i64 {
        (today - self.entry_date).num_days()
    }

    /// Hard target: longs need the high to reach the target, shorts the low.
    pub fn target_hit(&self, high: f64, low: f64) -> bool {
        match self.direction {
            Direction::Long => high >= self.take_profit_price,
            Direction::Short => low <= self.take_profit_price,
        }
    }

    /// Protective stop, evaluated on the close.
    pub fn stop_hit(&self, close: f64) -> bool {
        match self.direction {
            Direction::Long => close <= self.stop_price,
            Direction::Short => close >= self.stop_price,
        }
    }

    /// Fill reference for a take-profit exit: the target level, or the open
    /// when the bar gapped through it.
    pub fn take_profit_fill(&self, open: f64) -> f64 {
        if open.is_nan() {
            return self.take_profit_price;
        }
        match self.direction {
            Direction::Long => open.max(self.take_profit_price),
            Direction::Short => open.min(self.take_profit_price),
        }
    }
}

/// Ordered map of symbol → open position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionBook {
    positions: BTreeMap<String, OpenPosition>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, position: OpenPosition) {
        self.positions.insert(position.symbol.clone(), position);
    }

    pub fn remove(&mut self, symbol: &str) -> Option<OpenPosition> {
        self.positions.remove(symbol)
    }

    pub fn get(&self, symbol: &str) -> Option<&OpenPosition> {
        self.positions.get(symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.positions.contains_key(symbol)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OpenPosition> {
        self.positions.values()
    }

    pub fn symbols(&self) -> Vec<String> {
        self.positions.keys().cloned().collect()
    }

    /// Sum of absolute weights across all open positions.
    pub fn gross_weight(&self) -> f64 {
        self.positions.values().map(|p| p.weight.abs()).sum()
    }
}
