//! RegimeLab Core — domain types, features, regime classifier, risk manager,
//! strategies and the simulation loop.
//!
//! This crate contains the deterministic heart of the backtester:
//! - Domain types (bars, trades, open positions, portfolio state)
//! - Indicators and the precomputed, causally indexed feature set
//! - Bull / bear / neutral regime classification from a benchmark
//! - Kelly sizing, ATR stops and exposure limits
//! - Six regime-gated strategies behind one trait
//! - Portfolio ledger and the date-by-date simulation loop

pub mod domain;
pub mod engine;
pub mod features;
pub mod indicators;
pub mod regime;
pub mod risk;
pub mod strategy;
