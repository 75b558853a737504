//! Equity curve and regime history export (CSV).

use regimelab_core::engine::EquityPoint;
use regimelab_core::regime::RegimePoint;
use std::path::Path;

use super::ArtifactError;

/// `date,equity,drawdown` with drawdown as a fraction of the running peak.
pub fn write_equity_csv(path: &Path, curve: &[EquityPoint]) -> Result<(), ArtifactError> {
    let csv_err = |source| ArtifactError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    writer
        .write_record(["date", "equity", "drawdown"])
        .map_err(csv_err)?;

    let mut peak = f64::NEG_INFINITY;
    for p in curve {
        peak = peak.max(p.equity);
        let dd = if peak > 0.0 { (p.equity - peak) / peak } else { 0.0 };
        writer
            .write_record(&[p.date.to_string(), p.equity.to_string(), dd.to_string()])
            .map_err(csv_err)?;
    }
    writer.flush().map_err(|e| csv_err(e.into()))?;
    Ok(())
}

pub fn write_regimes_csv(path: &Path, history: &[RegimePoint]) -> Result<(), ArtifactError> {
    let csv_err = |source| ArtifactError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    writer.write_record(["date", "regime"]).map_err(csv_err)?;
    for p in history {
        writer
            .write_record([p.date.to_string().as_str(), p.regime.as_str()])
            .map_err(csv_err)?;
    }
    writer.flush().map_err(|e| csv_err(e.into()))?;
    Ok(())
}
