//! State and helpers shared by every strategy variant.

use super::{ExitSignal, StrategyParams, TargetWeights};
use crate::domain::{Direction, ExitReason, OpenPosition, PortfolioState, PositionBook};
use crate::features::{FeatureRow, MarketView};
use crate::risk::RiskManager;

/// Params, risk formulas and the position book a variant wraps.
#[derive(Debug, Clone)]
pub struct StrategyCore {
    params: StrategyParams,
    risk: RiskManager,
    book: PositionBook,
}

impl StrategyCore {
    pub fn new(params: StrategyParams, risk: RiskManager) -> Self {
        Self {
            params,
            risk,
            book: PositionBook::new(),
        }
    }

    pub fn params(&self) -> &StrategyParams {
        &self.params
    }

    pub fn risk(&self) -> &RiskManager {
        &self.risk
    }

    pub fn book(&self) -> &PositionBook {
        &self.book
    }

    pub fn book_mut(&mut self) -> &mut PositionBook {
        &mut self.book
    }

    /// Rank scored candidates and assign equal signed weights to the best
    /// `top_k - open` of them. Ties break by symbol.
    pub fn select(&self, mut candidates: Vec<(String, f64)>, bias: Direction) -> TargetWeights {
        let slots = self.params.top_k.saturating_sub(self.book.len());
        candidates.retain(|(symbol, score)| score.is_finite() && !self.book.contains(symbol));
        candidates.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        candidates.truncate(slots);
        if candidates.is_empty() {
            return TargetWeights::new();
        }
        let weight = bias.sign() / candidates.len() as f64;
        candidates.into_iter().map(|(s, _)| (s, weight)).collect()
    }

    /// Fit new targets into `budget` next to the open book.
    ///
    /// Open positions keep their weights (scaled down only for reporting when
    /// they alone exceed the budget). New weights are scaled into the room
    /// left, then each is capped at `budget / top_k`. Candidates the ledger
    /// still holds, or without a usable close and ATR today, are dropped.
    pub fn apply_budget(
        &mut self,
        targets: &TargetWeights,
        view: &MarketView<'_>,
        portfolio: &PortfolioState,
        budget: f64,
    ) -> TargetWeights {
        let open_gross = self.book.gross_weight();
        let open_scale = if open_gross > budget && open_gross > 0.0 {
            budget / open_gross
        } else {
            1.0
        };
        let mut out: TargetWeights = self
            .book
            .iter()
            .map(|p| (p.symbol.clone(), p.weight * open_scale))
            .collect();

        let remaining = (budget - open_gross).max(0.0);
        let fresh: Vec<(&String, f64, &FeatureRow)> = targets
            .iter()
            .filter(|(s, w)| {
                w.is_finite() && **w != 0.0 && !self.book.contains(s) && !portfolio.is_held(s)
            })
            .filter_map(|(s, w)| {
                view.row(s)
                    .filter(|r| r.close > 0.0 && r.atr_14.is_finite() && r.atr_14 > 0.0)
                    .map(|r| (s, *w, r))
            })
            .collect();
        if fresh.is_empty() || remaining <= 0.0 {
            return out;
        }

        let fresh_gross: f64 = fresh.iter().map(|(_, w, _)| w.abs()).sum();
        let scale = if fresh_gross > remaining {
            remaining / fresh_gross
        } else {
            1.0
        };
        let cap = budget / self.params.top_k as f64;

        for (symbol, w, row) in fresh {
            let magnitude = (w.abs() * scale).min(cap);
            if magnitude <= 0.0 {
                continue;
            }
            let direction = Direction::from_weight(w);
            let entry = row.close;
            let stop = self.risk.stop_loss(entry, row.atr_14, direction);
            let take_profit =
                self.risk
                    .take_profit(entry, stop, self.params.take_profit_multiplier, direction);
            let weight = magnitude * direction.sign();
            self.book.insert(OpenPosition {
                symbol: symbol.clone(),
                direction,
                entry_date: view.date(),
                entry_price: entry,
                weight,
                stop_price: stop,
                take_profit_price: take_profit,
            });
            out.insert(symbol.clone(), weight);
        }
        out
    }

    /// Run exit checks in priority order and drop fired positions from the book.
    ///
    /// `invalidated` supplies the variant's trend/regime rule. Positions with
    /// no usable row today are left alone.
    pub fn check_exits<F>(&mut self, view: &MarketView<'_>, mut invalidated: F) -> Vec<ExitSignal>
    where
        F: FnMut(&OpenPosition, &FeatureRow) -> Option<ExitReason>,
    {
        let today = view.date();
        let holding = i64::from(self.params.holding_period_days);
        let mut signals = Vec::new();

        for pos in self.book.iter() {
            let Some(row) = view.row(&pos.symbol) else {
                continue;
            };
            let fired = if pos.target_hit(row.high, row.low) {
                Some((ExitReason::TakeProfit, pos.take_profit_fill(row.open)))
            } else if pos.stop_hit(row.close) {
                Some((ExitReason::StopLoss, row.close))
            } else if let Some(reason) = invalidated(pos, row) {
                Some((reason, row.close))
            } else if pos.days_held(today) >= holding {
                Some((ExitReason::TimeExit, row.close))
            } else {
                None
            };
            if let Some((reason, price)) = fired {
                signals.push(ExitSignal {
                    symbol: pos.symbol.clone(),
                    reason,
                    price,
                });
            }
        }

        for signal in &signals {
            self.book.remove(&signal.symbol);
        }
        signals
    }
}
