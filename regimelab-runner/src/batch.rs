//! Parameter grids and parallel batch execution.

use rayon::prelude::*;
use regimelab_core::engine::{SimulationConfig, SimulationConfigBuilder, SimulationError};
use regimelab_core::features::FeatureSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::fitness::FitnessMetric;
use crate::runner::{run_config, SimulationResult};

/// Parameter grid specification.
///
/// Each non-empty axis is swept; an empty axis keeps the base config's value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamGrid {
    pub top_k: Vec<usize>,
    pub holding_period_days: Vec<u32>,
    pub take_profit_multiplier: Vec<f64>,
    /// Strategy-specific knob name → values to try.
    pub knobs: BTreeMap<String, Vec<f64>>,
}

impl ParamGrid {
    /// Number of combinations before invalid ones are dropped.
    pub fn size(&self) -> usize {
        let axis = |n: usize| n.max(1);
        axis(self.top_k.len())
            * axis(self.holding_period_days.len())
            * axis(self.take_profit_multiplier.len())
            * self.knobs.values().map(|v| axis(v.len())).product::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.top_k.is_empty()
            && self.holding_period_days.is_empty()
            && self.take_profit_multiplier.is_empty()
            && self.knobs.values().all(Vec::is_empty)
    }

    /// Every valid combination applied to `base`, in a stable order.
    /// Combinations that fail validation are skipped.
    pub fn generate_configs(&self, base: &SimulationConfig) -> Vec<SimulationConfig> {
        let mut drafts: Vec<SimulationConfigBuilder> = vec![base.to_builder()];

        drafts = expand(drafts, &self.top_k, |d, v| d.params.top_k = v);
        drafts = expand(drafts, &self.holding_period_days, |d, v| {
            d.params.holding_period_days = v
        });
        drafts = expand(drafts, &self.take_profit_multiplier, |d, v| {
            d.params.take_profit_multiplier = v
        });
        for (name, values) in &self.knobs {
            drafts = expand(drafts, values, |d, v| {
                d.knobs.insert(name.clone(), v);
            });
        }

        drafts
            .into_iter()
            .filter_map(|draft| match draft.build() {
                Ok(config) => Some(config),
                Err(e) => {
                    debug!(error = %e, "skipping invalid grid combination");
                    None
                }
            })
            .collect()
    }
}

fn expand<T: Copy>(
    drafts: Vec<SimulationConfigBuilder>,
    values: &[T],
    apply: impl Fn(&mut SimulationConfigBuilder, T),
) -> Vec<SimulationConfigBuilder> {
    if values.is_empty() {
        return drafts;
    }
    let apply = &apply;
    drafts
        .into_iter()
        .flat_map(|draft| {
            values.iter().map(move |&v| {
                let mut d = draft.clone();
                apply(&mut d, v);
                d
            })
        })
        .collect()
}

/// Batch executor. Runs share the feature set read-only; each run builds its
/// own strategy and ledger.
#[derive(Debug, Clone, Copy)]
pub struct BatchRunner {
    parallel: bool,
}

impl Default for BatchRunner {
    fn default() -> Self {
        Self { parallel: true }
    }
}

impl BatchRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables parallel execution.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Run every config. Results are in input order; one failure never
    /// aborts its siblings.
    pub fn run(
        &self,
        configs: &[SimulationConfig],
        features: &FeatureSet,
    ) -> Vec<Result<SimulationResult, SimulationError>> {
        if self.parallel {
            configs
                .par_iter()
                .map(|config| run_config(config, features))
                .collect()
        } else {
            configs
                .iter()
                .map(|config| run_config(config, features))
                .collect()
        }
    }
}

/// Run every config in parallel.
pub fn run_batch(
    configs: &[SimulationConfig],
    features: &FeatureSet,
) -> Vec<Result<SimulationResult, SimulationError>> {
    BatchRunner::new().run(configs, features)
}

/// The successful result with the best fitness. Ties keep the earlier one.
pub fn best_by<'a>(
    results: &'a [Result<SimulationResult, SimulationError>],
    fitness: FitnessMetric,
) -> Option<&'a SimulationResult> {
    results
        .iter()
        .filter_map(|r| r.as_ref().ok())
        .fold(None, |best: Option<&SimulationResult>, r| match best {
            Some(b) if !fitness.is_better(fitness.extract(&r.metrics), fitness.extract(&b.metrics)) => {
                Some(b)
            }
            _ => Some(r),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use regimelab_core::strategy::StrategyKind;

    fn base(kind: StrategyKind) -> SimulationConfig {
        SimulationConfigBuilder::new(
            kind,
            vec!["AAA".into()],
            "SPY",
            NaiveDate::from_ymd_opt(2023, 1, 2).unwrap(),
            NaiveDate::from_ymd_opt(2023, 6, 30).unwrap(),
        )
        .build()
        .unwrap()
    }

    #[test]
    fn empty_grid_yields_base() {
        let grid = ParamGrid::default();
        assert!(grid.is_empty());
        assert_eq!(grid.size(), 1);
        let configs = grid.generate_configs(&base(StrategyKind::TrendFollowing));
        assert_eq!(configs, vec![base(StrategyKind::TrendFollowing)]);
    }

    #[test]
    fn cartesian_product_in_stable_order() {
        let grid = ParamGrid {
            top_k: vec![1, 3],
            holding_period_days: vec![5, 10, 20],
            ..ParamGrid::default()
        };
        assert_eq!(grid.size(), 6);
        let configs = grid.generate_configs(&base(StrategyKind::MomentumBreakout));
        let pairs: Vec<(usize, u32)> = configs
            .iter()
            .map(|c| (c.params().top_k, c.params().holding_period_days))
            .collect();
        assert_eq!(pairs, vec![(1, 5), (1, 10), (1, 20), (3, 5), (3, 10), (3, 20)]);
    }

    #[test]
    fn invalid_combinations_are_dropped() {
        let mut knobs = BTreeMap::new();
        knobs.insert("rsi_exit".to_string(), vec![25.0, 60.0]);
        let grid = ParamGrid {
            take_profit_multiplier: vec![0.5, 2.0],
            knobs,
            ..ParamGrid::default()
        };
        assert_eq!(grid.size(), 4);
        // tp 0.5 is invalid; rsi_exit 25 sits below the default oversold level
        let configs = grid.generate_configs(&base(StrategyKind::MeanReversion));
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].params().take_profit_multiplier, 2.0);
        assert_eq!(configs[0].knobs().get("rsi_exit"), Some(&60.0));
    }

    #[test]
    fn grid_parses_from_toml() {
        let grid: ParamGrid = toml::from_str(
            r#"
            top_k = [2, 4]
            [knobs]
            min_breakout = [0.0, 0.01]
            "#,
        )
        .unwrap();
        assert_eq!(grid.size(), 4);
        assert!(grid.holding_period_days.is_empty());
    }
}
