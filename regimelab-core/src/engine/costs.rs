//! Cost model — slippage and commission calculation.
//!
//! Slippage is directional: buyers pay more (higher price), sellers receive less
//! (lower price). Commission is a flat fee plus a rate on fill notional, charged
//! on both entry and exit.

use crate::domain::Direction;

/// Which way an order moves shares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn opening(direction: Direction) -> Self {
        match direction {
            Direction::Long => OrderSide::Buy,
            Direction::Short => OrderSide::Sell,
        }
    }

    pub fn closing(direction: Direction) -> Self {
        match direction {
            Direction::Long => OrderSide::Sell,
            Direction::Short => OrderSide::Buy,
        }
    }
}

/// Execution friction (slippage + commission).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostModel {
    /// Fractional slippage, applied directionally.
    pub slippage_rate: f64,
    /// Fractional commission on notional.
    pub commission_rate: f64,
    /// Flat commission per fill.
    pub commission_flat: f64,
}

impl CostModel {
    pub fn new(slippage_rate: f64, commission_rate: f64, commission_flat: f64) -> Self {
        Self {
            slippage_rate,
            commission_rate,
            commission_flat,
        }
    }

    pub fn frictionless() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Reference price adjusted for slippage against the order.
    pub fn fill_price(&self, reference: f64, side: OrderSide) -> f64 {
        match side {
            OrderSide::Buy => reference * (1.0 + self.slippage_rate),
            OrderSide::Sell => reference * (1.0 - self.slippage_rate),
        }
    }

    /// Commission for one fill: flat + rate × |notional|.
    pub fn commission(&self, notional: f64) -> f64 {
        self.commission_flat + self.commission_rate * notional.abs()
    }
}
