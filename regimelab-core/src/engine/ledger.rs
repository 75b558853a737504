//! Portfolio ledger: cash, holdings, the trade log and the equity curve.
//!
//! The ledger is the only writer of `PortfolioState`. Signed share count q is
//! positive for longs and negative for shorts:
//! - open:  cash -= q × fill + commission
//! - close: cash += q × fill - commission
//! - equity = cash + Σ q × last close

use super::costs::{CostModel, OrderSide};
use crate::domain::{Direction, ExitReason, Holding, PortfolioState, Trade};
use crate::features::MarketView;
use crate::risk::RiskRejection;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{info, warn};

/// One point of the equity curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
}

/// Why an accepted target never became a holding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    ZeroShares,
    NonPositiveKelly { kelly_fraction: f64 },
    RiskLimit { rejection: RiskRejection },
    InsufficientCash { required: f64, available: f64 },
    NoPrice,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::ZeroShares => write!(f, "sized to zero shares"),
            SkipReason::NonPositiveKelly { kelly_fraction } => {
                write!(f, "kelly fraction {kelly_fraction:.4} is not positive")
            }
            SkipReason::RiskLimit { rejection } => write!(f, "{rejection}"),
            SkipReason::InsufficientCash {
                required,
                available,
            } => write!(f, "needs {required:.2} cash, {available:.2} available"),
            SkipReason::NoPrice => write!(f, "no usable price"),
        }
    }
}

/// Non-fatal things that happened during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    SkippedTrade {
        date: NaiveDate,
        symbol: String,
        reason: SkipReason,
    },
    StateDesync {
        date: NaiveDate,
        symbol: String,
        detail: String,
    },
}

impl LedgerEvent {
    pub fn date(&self) -> NaiveDate {
        match self {
            LedgerEvent::SkippedTrade { date, .. } | LedgerEvent::StateDesync { date, .. } => *date,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            LedgerEvent::SkippedTrade { symbol, .. } | LedgerEvent::StateDesync { symbol, .. } => {
                symbol
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct PortfolioLedger {
    state: PortfolioState,
    trades: Vec<Trade>,
    equity_curve: Vec<EquityPoint>,
    events: Vec<LedgerEvent>,
    last_close: HashMap<String, f64>,
    costs: CostModel,
}

/// Everything the ledger recorded, handed back at the end of a run.
#[derive(Debug, Clone)]
pub struct LedgerParts {
    pub state: PortfolioState,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub events: Vec<LedgerEvent>,
}

impl PortfolioLedger {
    pub fn new(initial_cash: f64, costs: CostModel) -> Self {
        Self {
            state: PortfolioState::new(initial_cash),
            trades: Vec::new(),
            equity_curve: Vec::new(),
            events: Vec::new(),
            last_close: HashMap::new(),
            costs,
        }
    }

    pub fn state(&self) -> &PortfolioState {
        &self.state
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    pub fn costs(&self) -> &CostModel {
        &self.costs
    }

    /// Remember today's closes for every universe symbol that traded.
    pub fn observe(&mut self, view: &MarketView<'_>) {
        for (symbol, row) in view.rows() {
            self.last_close.insert(symbol.to_string(), row.close);
        }
    }

    pub fn last_close(&self, symbol: &str) -> Option<f64> {
        self.last_close.get(symbol).copied()
    }

    /// Equity at the most recent known closes.
    pub fn equity(&self) -> f64 {
        self.state.value_at(&self.last_close)
    }

    pub fn gross_exposure(&self) -> f64 {
        self.state.gross_exposure(&self.last_close)
    }

    /// Open a new holding at `reference` adjusted for slippage.
    ///
    /// Longs pay shares × fill + commission; shorts must hold the same amount
    /// in cash as collateral.
    pub fn open(
        &mut self,
        date: NaiveDate,
        symbol: &str,
        direction: Direction,
        shares: u64,
        reference: f64,
    ) -> Result<(), SkipReason> {
        if shares == 0 {
            return Err(SkipReason::ZeroShares);
        }
        if !(reference.is_finite() && reference > 0.0) {
            return Err(SkipReason::NoPrice);
        }
        let qty = shares as f64;
        let fill = self.costs.fill_price(reference, OrderSide::opening(direction));
        let commission = self.costs.commission(qty * fill);
        let required = qty * fill + commission;
        if required > self.state.cash {
            return Err(SkipReason::InsufficientCash {
                required,
                available: self.state.cash,
            });
        }

        self.state.cash -= direction.sign() * qty * fill + commission;
        let trade_index = self.trades.len();
        self.trades
            .push(Trade::open(symbol, direction, date, fill, qty, commission));
        self.state.holdings.insert(
            symbol.to_string(),
            Holding {
                symbol: symbol.to_string(),
                direction,
                shares: qty,
                entry_price: fill,
                entry_date: date,
                trade_index,
            },
        );
        Ok(())
    }

    /// Close a holding at `reference` adjusted for slippage and finalize its
    /// trade. Returns the trade index, or None if the symbol is not held.
    pub fn close(
        &mut self,
        date: NaiveDate,
        symbol: &str,
        reference: f64,
        reason: ExitReason,
    ) -> Option<usize> {
        let holding = self.state.holdings.remove(symbol)?;
        let fill = self
            .costs
            .fill_price(reference, OrderSide::closing(holding.direction));
        let commission = self.costs.commission(holding.shares * fill);
        self.state.cash += holding.signed_shares() * fill - commission;
        if let Some(trade) = self.trades.get_mut(holding.trade_index) {
            trade.finalize(date, fill, commission, reason);
        }
        Some(holding.trade_index)
    }

    /// Mark to market and append today's equity point.
    pub fn mark(&mut self, date: NaiveDate) -> f64 {
        let equity = self.equity();
        self.state.equity = equity;
        self.equity_curve.push(EquityPoint { date, equity });
        equity
    }

    pub fn skip(&mut self, date: NaiveDate, symbol: &str, reason: SkipReason) {
        info!(%date, symbol, %reason, "skipped trade");
        self.events.push(LedgerEvent::SkippedTrade {
            date,
            symbol: symbol.to_string(),
            reason,
        });
    }

    pub fn desync(&mut self, date: NaiveDate, symbol: &str, detail: impl Into<String>) {
        let detail = detail.into();
        warn!(%date, symbol, detail = detail.as_str(), "strategy and ledger disagree");
        self.events.push(LedgerEvent::StateDesync {
            date,
            symbol: symbol.to_string(),
            detail,
        });
    }

    pub fn into_parts(self) -> LedgerParts {
        LedgerParts {
            state: self.state,
            trades: self.trades,
            equity_curve: self.equity_curve,
            events: self.events,
        }
    }
}
