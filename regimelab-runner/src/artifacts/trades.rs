//! Trade log export (CSV).

use chrono::NaiveDate;
use regimelab_core::domain::{Direction, Trade};
use serde::Serialize;
use std::path::Path;

use super::ArtifactError;

#[derive(Debug, Serialize)]
struct TradeRow<'a> {
    symbol: &'a str,
    direction: &'static str,
    entry_date: NaiveDate,
    entry_price: f64,
    size: f64,
    entry_commission: f64,
    exit_date: Option<NaiveDate>,
    exit_price: Option<f64>,
    exit_commission: f64,
    exit_reason: Option<&'static str>,
    pnl: f64,
    pnl_pct: f64,
    holding_days: Option<i64>,
}

impl<'a> From<&'a Trade> for TradeRow<'a> {
    fn from(t: &'a Trade) -> Self {
        Self {
            symbol: &t.symbol,
            direction: match t.direction {
                Direction::Long => "long",
                Direction::Short => "short",
            },
            entry_date: t.entry_date,
            entry_price: t.entry_price,
            size: t.size,
            entry_commission: t.entry_commission,
            exit_date: t.exit_date,
            exit_price: t.exit_price,
            exit_commission: t.exit_commission,
            exit_reason: t.exit_reason.map(|r| r.as_str()),
            pnl: t.pnl,
            pnl_pct: t.pnl_pct,
            holding_days: t.is_closed().then(|| t.holding_days()),
        }
    }
}

/// One row per trade, open trades included with empty exit columns.
pub fn write_trades_csv(path: &Path, trades: &[Trade]) -> Result<(), ArtifactError> {
    let csv_err = |source| ArtifactError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    if trades.is_empty() {
        // serde-driven headers only appear with the first row
        writer
            .write_record([
                "symbol",
                "direction",
                "entry_date",
                "entry_price",
                "size",
                "entry_commission",
                "exit_date",
                "exit_price",
                "exit_commission",
                "exit_reason",
                "pnl",
                "pnl_pct",
                "holding_days",
            ])
            .map_err(csv_err)?;
    }
    for trade in trades {
        writer.serialize(TradeRow::from(trade)).map_err(csv_err)?;
    }
    writer.flush().map_err(|e| csv_err(e.into()))?;
    Ok(())
}
