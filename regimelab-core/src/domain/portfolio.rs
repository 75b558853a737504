//! PortfolioState — cash plus held positions, owned by the ledger.

use super::trade::Direction;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A position as the ledger sees it: shares bought or sold at a fill price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: String,
    pub direction: Direction,
    /// Share count, always positive.
    pub shares: f64,
    /// Fill price including slippage.
    pub entry_price: f64,
    pub entry_date: NaiveDate,
    /// Index of the matching open record in the trade log.
    pub trade_index: usize,
}

impl Holding {
    /// Shares with the side folded in (negative for shorts).
    pub fn signed_shares(&self) -> f64 {
        self.shares * self.direction.sign()
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.signed_shares() * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.signed_shares() * (price - self.entry_price)
    }
}

/// Aggregate portfolio state.
///
/// The accounting identity `equity == cash + Σ signed_shares × price` holds
/// after every mark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioState {
    pub cash: f64,
    pub holdings: BTreeMap<String, Holding>,
    /// Equity as of the most recent mark.
    pub equity: f64,
}

impl PortfolioState {
    pub fn new(initial_cash: f64) -> Self {
        Self {
            cash: initial_cash,
            holdings: BTreeMap::new(),
            equity: initial_cash,
        }
    }

    pub fn is_held(&self, symbol: &str) -> bool {
        self.holdings.contains_key(symbol)
    }

    /// Equity at the given prices. Symbols missing from `prices` are valued at entry.
    pub fn value_at(&self, prices: &HashMap<String, f64>) -> f64 {
        self.cash + self.exposure_terms(prices).map(|(_, value)| value).sum::<f64>()
    }

    /// Gross exposure: Σ |market value| at the given prices.
    pub fn gross_exposure(&self, prices: &HashMap<String, f64>) -> f64 {
        self.exposure_terms(prices).map(|(_, value)| value.abs()).sum()
    }

    fn exposure_terms<'a>(
        &'a self,
        prices: &'a HashMap<String, f64>,
    ) -> impl Iterator<Item = (&'a str, f64)> + 'a {
        self.holdings.iter().map(move |(symbol, holding)| {
            let price = prices.get(symbol).copied().unwrap_or(holding.entry_price);
            (symbol.as_str(), holding.market_value(price))
        })
    }
}
