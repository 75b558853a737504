//! Regime-gated strategies.
//!
//! A strategy turns a causal market view plus the current regime into exit
//! signals and target weights, and owns the book of positions it has
//! accepted. Six variants share `StrategyCore` for selection, budgeting and
//! exit priority; each supplies its own regime gate, entry predicates,
//! ranking score and invalidation rule.

pub mod factory;
pub mod mean_reversion;
pub mod momentum_breakout;
pub mod params;
pub mod range_reversion;
pub mod relative_strength;
pub mod shared;
pub mod short_momentum;
pub mod trend_following;

pub use factory::{create_strategy, validate_knobs, StrategyKnobs};
pub use mean_reversion::MeanReversion;
pub use momentum_breakout::MomentumBreakout;
pub use params::{ParamError, StrategyKind, StrategyParams};
pub use range_reversion::RangeReversion;
pub use relative_strength::RelativeStrength;
pub use shared::StrategyCore;
pub use short_momentum::ShortMomentum;
pub use trend_following::TrendFollowing;

use crate::domain::{Direction, ExitReason, OpenPosition, PortfolioState, PositionBook};
use crate::features::MarketView;
use crate::regime::MarketRegime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Signed target weights by symbol. Negative = short.
pub type TargetWeights = BTreeMap<String, f64>;

/// A strategy's decision to close one of its positions today.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitSignal {
    pub symbol: String,
    pub reason: ExitReason,
    /// Reference fill price before slippage.
    pub price: f64,
}

/// Strategy contract driven once per date by the simulation loop.
///
/// Call order per date: `evaluate_exits`, `generate_signals`, `risk_model`.
/// The strategy's book is updated by those calls; the ledger reports fills it
/// could not make through `cancel_entry`.
pub trait Strategy: Send {
    fn name(&self) -> &str;

    fn kind(&self) -> StrategyKind;

    /// Long-biased variants emit positive weights, short-biased negative.
    fn bias(&self) -> Direction;

    /// Regime gate for new entries.
    fn trades_in(&self, regime: MarketRegime) -> bool;

    fn core(&self) -> &StrategyCore;

    fn core_mut(&mut self) -> &mut StrategyCore;

    /// Exit checks for every open position, in priority order: hard target,
    /// protective stop, variant invalidation, holding period. Fired
    /// positions leave the book.
    fn evaluate_exits(&mut self, view: &MarketView<'_>, regime: MarketRegime) -> Vec<ExitSignal>;

    /// Equal-weight picks among new candidates; empty when the gate rejects.
    fn generate_signals(&mut self, view: &MarketView<'_>, regime: MarketRegime) -> TargetWeights;

    /// Regime the variant is built for.
    fn favored_regime(&self) -> MarketRegime {
        match self.bias() {
            Direction::Long => MarketRegime::Bull,
            Direction::Short => MarketRegime::Bear,
        }
    }

    fn risk_budget(&self, regime: MarketRegime) -> f64 {
        let params = self.core().params();
        if regime == self.favored_regime() {
            params.normal_risk_budget
        } else {
            params.defensive_risk_budget
        }
    }

    /// Fit `targets` into the regime's budget and record accepted entries.
    /// Returns open and new weights together.
    fn risk_model(
        &mut self,
        targets: &TargetWeights,
        view: &MarketView<'_>,
        portfolio: &PortfolioState,
        regime: MarketRegime,
    ) -> TargetWeights {
        let budget = self.risk_budget(regime);
        self.core_mut().apply_budget(targets, view, portfolio, budget)
    }

    /// Forget a position the ledger could not fill.
    fn cancel_entry(&mut self, symbol: &str) -> Option<OpenPosition> {
        self.core_mut().book_mut().remove(symbol)
    }

    fn open_positions(&self) -> &PositionBook {
        self.core().book()
    }
}
