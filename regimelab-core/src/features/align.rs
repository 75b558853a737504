//! Multi-symbol time alignment.
//!
//! Given bars for multiple symbols, align them to a common timeline.
//! Missing bars become void bars (NaN prices); tradable prices are never
//! forward-filled.

use crate::domain::Bar;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Bar data for multiple symbols on a common timeline.
#[derive(Debug, Clone)]
pub struct AlignedBars {
    /// The common date axis (sorted ascending).
    pub dates: Vec<NaiveDate>,
    /// Bars per symbol; each inner Vec has the same length as `dates`.
    pub bars: BTreeMap<String, Vec<Bar>>,
}

/// Align symbols on the union of their dates.
///
/// Duplicate dates within one symbol keep the last bar seen.
pub fn align_symbols(symbol_bars: BTreeMap<String, Vec<Bar>>) -> AlignedBars {
    let dates: Vec<NaiveDate> = symbol_bars
        .values()
        .flat_map(|bars| bars.iter().map(|b| b.date))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let bars = symbol_bars
        .into_iter()
        .map(|(symbol, bars)| {
            let by_date: HashMap<NaiveDate, Bar> =
                bars.into_iter().map(|b| (b.date, b)).collect();
            let aligned = dates
                .iter()
                .map(|d| {
                    by_date
                        .get(d)
                        .cloned()
                        .unwrap_or_else(|| Bar::void(&symbol, *d))
                })
                .collect();
            (symbol, aligned)
        })
        .collect();

    AlignedBars { dates, bars }
}
