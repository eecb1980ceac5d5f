//! CSV report adapter.
//!
//! Writes four files into the output directory: `trades.csv` (one row per
//! fill), `round_trips.csv` (closed trades), `equity.csv` (one row per bar)
//! and `summary.csv` (key/value pairs).

use std::fs;
use std::path::Path;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::TradebotError;
use crate::ports::report_port::ReportPort;

pub const TRADES_FILE: &str = "trades.csv";
pub const ROUND_TRIPS_FILE: &str = "round_trips.csv";
pub const EQUITY_FILE: &str = "equity.csv";
pub const SUMMARY_FILE: &str = "summary.csv";

pub struct CsvReportAdapter;

impl CsvReportAdapter {
    fn write_rows<T: serde::Serialize>(
        path: &Path,
        headers: &[&str],
        rows: &[T],
    ) -> Result<(), TradebotError> {
        let mut writer = csv::Writer::from_path(path)?;
        if rows.is_empty() {
            // serde only emits headers alongside the first record
            writer.write_record(headers)?;
        }
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    fn summary_rows(result: &BacktestResult) -> Vec<(String, String)> {
        let mut rows = vec![
            ("symbol".to_string(), result.symbol.clone()),
            ("strategy".to_string(), result.strategy.to_string()),
            ("bars".to_string(), result.equity_curve.len().to_string()),
            ("buy_signals".to_string(), result.signal_counts.buy.to_string()),
            ("sell_signals".to_string(), result.signal_counts.sell.to_string()),
            ("hold_signals".to_string(), result.signal_counts.hold.to_string()),
        ];
        rows.extend(
            result
                .metrics
                .to_rows()
                .into_iter()
                .map(|(k, v)| (k.to_string(), v)),
        );
        rows
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, result: &BacktestResult, output_dir: &Path) -> Result<(), TradebotError> {
        fs::create_dir_all(output_dir)?;

        Self::write_rows(
            &output_dir.join(TRADES_FILE),
            &["timestamp", "symbol", "side", "quantity", "fill_price", "fee", "reason"],
            &result.trades,
        )?;
        Self::write_rows(
            &output_dir.join(ROUND_TRIPS_FILE),
            &[
                "symbol",
                "quantity",
                "entry_price",
                "exit_price",
                "opened_at",
                "closed_at",
                "pnl",
                "fees",
            ],
            &result.closed_trades,
        )?;
        Self::write_rows(
            &output_dir.join(EQUITY_FILE),
            &["timestamp", "equity"],
            &result.equity_curve,
        )?;

        let mut writer = csv::Writer::from_path(output_dir.join(SUMMARY_FILE))?;
        writer.write_record(["key", "value"])?;
        for (key, value) in Self::summary_rows(result) {
            writer.write_record([key, value])?;
        }
        writer.flush()?;

        Ok(())
    }
}
