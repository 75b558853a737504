//! Date-by-date simulation loop — the heart of the backtesting engine.
//!
//! Per date inside the configured window:
//! 1. Observe closes, classify the regime
//! 2. Strategy exits, signals, risk model
//! 3. Reconcile targets against holdings (closes first, then entries)
//! 4. Mark to market and append the equity point
//!
//! The first in-range date is the inception date: it is marked at initial
//! cash and no orders are placed.

use super::config::{SimulationConfig, SizingMode};
use super::costs::{CostModel, OrderSide};
use super::ledger::{PortfolioLedger, SkipReason};
use super::{RunOutput, SimulationError};
use crate::domain::{ExitReason, OpenPosition};
use crate::features::FeatureSet;
use crate::regime::RegimePoint;
use crate::risk::RiskManager;
use crate::strategy::{create_strategy, ExitSignal, Strategy, TargetWeights};
use std::collections::HashMap;
use tracing::{debug, info};

/// Build the configured strategy and run it.
pub fn simulate(
    config: &SimulationConfig,
    features: &FeatureSet,
) -> Result<RunOutput, SimulationError> {
    let mut strategy = create_strategy(
        config.strategy(),
        *config.params(),
        config.knobs(),
        *config.risk(),
    )?;
    run_simulation(config, features, strategy.as_mut())
}

/// Run `strategy` over the configured window of `features`.
///
/// Fails only when the inputs cannot support a run: a universe or benchmark
/// symbol absent from the feature set, or no dates inside the window.
pub fn run_simulation(
    config: &SimulationConfig,
    features: &FeatureSet,
    strategy: &mut dyn Strategy,
) -> Result<RunOutput, SimulationError> {
    for symbol in config
        .universe()
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(config.benchmark()))
    {
        if !features.contains(symbol) {
            return Err(SimulationError::InsufficientData(format!(
                "symbol '{symbol}' missing from feature set"
            )));
        }
    }
    let range = features
        .index_range(config.start(), config.end())
        .ok_or_else(|| {
            SimulationError::InsufficientData(format!(
                "no dates between {} and {}",
                config.start(),
                config.end()
            ))
        })?;

    let classifier = config.regime();
    let bench_closes: Vec<f64> = features
        .series(config.benchmark())
        .map(|rows| rows.iter().map(|r| r.close).collect())
        .unwrap_or_default();
    let bench_ma = classifier.moving_average(&bench_closes);

    let costs = CostModel::new(
        config.slippage_rate(),
        config.commission_rate(),
        config.commission_flat(),
    );
    let risk = RiskManager::new(*config.risk());
    let mut ledger = PortfolioLedger::new(config.initial_cash(), costs);
    let mut regimes = Vec::new();

    for t in range.clone() {
        let view = features.view(t, config.universe());
        let date = view.date();
        ledger.observe(&view);

        let regime = classifier.classify(&bench_closes, &bench_ma, t);
        if config.record_regimes() {
            regimes.push(RegimePoint { date, regime });
        }

        if t == range.start {
            ledger.mark(date);
            continue;
        }

        let exits = strategy.evaluate_exits(&view, regime);
        let targets = strategy.generate_signals(&view, regime);
        let weights = strategy.risk_model(&targets, &view, ledger.state(), regime);
        debug!(%date, %regime, exits = exits.len(), targets = weights.len(), "step");

        close_positions(&mut ledger, &exits, &weights, date);
        open_positions(config, &risk, &mut ledger, strategy, &weights, date);

        ledger.mark(date);
    }

    let parts = ledger.into_parts();
    let closed = parts.trades.iter().filter(|t| t.is_closed()).count();
    info!(
        strategy = strategy.name(),
        days = parts.equity_curve.len(),
        trades = parts.trades.len(),
        closed,
        final_equity = parts.state.equity,
        skipped = parts.events.len(),
        "simulation complete"
    );

    Ok(RunOutput {
        equity_curve: parts.equity_curve,
        trades: parts.trades,
        regime_history: config.record_regimes().then_some(regimes),
        events: parts.events,
        final_state: parts.state,
    })
}

/// Close holdings that left the target map. Exit signals supply the reason
/// and reference price; anything else is a rebalance at the last close.
fn close_positions(
    ledger: &mut PortfolioLedger,
    exits: &[ExitSignal],
    weights: &TargetWeights,
    date: chrono::NaiveDate,
) {
    let by_symbol: HashMap<&str, &ExitSignal> =
        exits.iter().map(|e| (e.symbol.as_str(), e)).collect();

    for exit in exits {
        if !ledger.state().is_held(&exit.symbol) {
            ledger.desync(date, &exit.symbol, "exit signal for a symbol the ledger does not hold");
        }
    }

    let leaving: Vec<String> = ledger
        .state()
        .holdings
        .keys()
        .filter(|s| !weights.contains_key(*s))
        .cloned()
        .collect();

    for symbol in leaving {
        let (price, reason) = match by_symbol.get(symbol.as_str()) {
            Some(exit) => (exit.price, exit.reason),
            None => match ledger.last_close(&symbol) {
                Some(close) => (close, ExitReason::Rebalance),
                None => {
                    ledger.desync(date, &symbol, "no price to rebalance out of holding");
                    continue;
                }
            },
        };
        ledger.close(date, &symbol, price, reason);
    }
}

/// Size, validate and fill targets the ledger does not hold yet.
fn open_positions(
    config: &SimulationConfig,
    risk: &RiskManager,
    ledger: &mut PortfolioLedger,
    strategy: &mut dyn Strategy,
    weights: &TargetWeights,
    date: chrono::NaiveDate,
) {
    let equity = ledger.equity();
    let mut exposure = ledger.gross_exposure();

    for (symbol, &weight) in weights {
        if ledger.state().is_held(symbol) {
            continue;
        }
        let position = match strategy.open_positions().get(symbol) {
            Some(p) if p.entry_date == date => p.clone(),
            _ => {
                ledger.desync(date, symbol, "target for an open position the ledger never filled");
                strategy.cancel_entry(symbol);
                continue;
            }
        };

        let outcome = size_entry(config, risk, ledger, &position, weight, equity).and_then(|shares| {
            let fill = ledger
                .costs()
                .fill_price(position.entry_price, OrderSide::opening(position.direction));
            let value = shares as f64 * fill;
            risk.validate_trade(value, equity, exposure)
                .map_err(|rejection| SkipReason::RiskLimit { rejection })?;
            ledger.open(date, symbol, position.direction, shares, position.entry_price)?;
            Ok(value)
        });

        match outcome {
            Ok(value) => exposure += value,
            Err(reason) => {
                ledger.skip(date, symbol, reason);
                strategy.cancel_entry(symbol);
            }
        }
    }
}

/// Shares for one entry under the configured sizing mode.
fn size_entry(
    config: &SimulationConfig,
    risk: &RiskManager,
    ledger: &PortfolioLedger,
    position: &OpenPosition,
    weight: f64,
    equity: f64,
) -> Result<u64, SkipReason> {
    let fill = ledger
        .costs()
        .fill_price(position.entry_price, OrderSide::opening(position.direction));
    if !(fill.is_finite() && fill > 0.0) {
        return Err(SkipReason::NoPrice);
    }
    let by_weight = (weight.abs() * equity / fill).floor().max(0.0) as u64;

    let shares = match config.sizing() {
        SizingMode::TargetWeight => by_weight,
        SizingMode::Kelly { win_probability } => {
            // Same reward:risk the take-profit target is placed at
            let reward_risk = config
                .params()
                .take_profit_multiplier
                .max(risk.limits().min_rr_ratio);
            let size = risk.position_size(
                fill,
                position.stop_price,
                win_probability,
                reward_risk,
                equity,
            );
            if size.kelly_fraction <= 0.0 {
                return Err(SkipReason::NonPositiveKelly {
                    kelly_fraction: size.kelly_fraction,
                });
            }
            size.shares.min(by_weight)
        }
    };

    if shares == 0 {
        return Err(SkipReason::ZeroShares);
    }
    Ok(shares)
}
