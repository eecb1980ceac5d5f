//! CSV file data adapter.
//!
//! One file per symbol, `<base>/<symbol>.csv`, with a header row and columns
//! `timestamp,open,high,low,close,volume`. Timestamps may be RFC 3339,
//! `YYYY-MM-DD HH:MM:SS` (UTC), `YYYY-MM-DD` or unix seconds. Rows are kept
//! in file order so that ordering problems surface in series validation.

use crate::domain::error::TradebotError;
use crate::domain::ohlcv::{parse_timestamp, PriceBar};
use crate::ports::data_port::DataPort;
use chrono::{DateTime, Utc};
use csv::StringRecord;
use std::fs;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol))
    }
}

/// Read every bar from one CSV file.
pub fn read_bars(path: &std::path::Path) -> Result<Vec<PriceBar>, TradebotError> {
    let content = fs::read_to_string(path).map_err(|e| TradebotError::Data {
        reason: format!("failed to read {}: {}", path.display(), e),
    })?;

    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());
    let mut bars = Vec::new();

    for (row, result) in rdr.records().enumerate() {
        let record = result?;
        bars.push(parse_record(&record, row + 1)?);
    }

    Ok(bars)
}

fn parse_record(record: &StringRecord, row: usize) -> Result<PriceBar, TradebotError> {
    let raw_ts = column(record, 0, "timestamp", row)?;
    let timestamp = parse_timestamp(raw_ts).ok_or_else(|| TradebotError::Data {
        reason: format!("row {}: invalid timestamp '{}'", row, raw_ts),
    })?;

    Ok(PriceBar {
        timestamp,
        open: number(record, 1, "open", row)?,
        high: number(record, 2, "high", row)?,
        low: number(record, 3, "low", row)?,
        close: number(record, 4, "close", row)?,
        volume: number(record, 5, "volume", row)?,
    })
}

fn column<'a>(
    record: &'a StringRecord,
    index: usize,
    name: &str,
    row: usize,
) -> Result<&'a str, TradebotError> {
    record.get(index).ok_or_else(|| TradebotError::Data {
        reason: format!("row {}: missing {} column", row, name),
    })
}

fn number(record: &StringRecord, index: usize, name: &str, row: usize) -> Result<f64, TradebotError> {
    column(record, index, name, row)?
        .parse()
        .map_err(|e| TradebotError::Data {
            reason: format!("row {}: invalid {} value: {}", row, name, e),
        })
}

impl DataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        symbol: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<PriceBar>, TradebotError> {
        let bars = read_bars(&self.csv_path(symbol))?;
        Ok(bars
            .into_iter()
            .filter(|b| start.is_none_or(|s| b.timestamp >= s))
            .filter(|b| end.is_none_or(|e| b.timestamp <= e))
            .collect())
    }

    fn list_symbols(&self) -> Result<Vec<String>, TradebotError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| TradebotError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "csv") {
                if let Some(stem) = path.file_stem() {
                    symbols.push(stem.to_string_lossy().into_owned());
                }
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        let csv_content = "timestamp,open,high,low,close,volume\n\
            2024-01-15T00:00:00Z,100.0,110.0,90.0,105.0,50000\n\
            2024-01-15T01:00:00Z,105.0,115.0,100.0,110.0,60000.5\n\
            2024-01-15T02:00:00Z,110.0,120.0,105.0,115.0,55000\n";

        fs::write(path.join("BTC-USD.csv"), csv_content).unwrap();
        fs::write(
            path.join("ETH-USD.csv"),
            "timestamp,open,high,low,close,volume\n",
        )
        .unwrap();
        fs::write(path.join("notes.txt"), "not data").unwrap();

        (dir, path)
    }

    #[test]
    fn fetch_bars_returns_all_rows() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let bars = adapter.fetch_bars("BTC-USD", None, None).unwrap();

        assert_eq!(bars.len(), 3);
        assert_eq!(
            bars[0].timestamp,
            Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap()
        );
        assert_eq!(bars[0].open, 100.0);
        assert_eq!(bars[0].high, 110.0);
        assert_eq!(bars[0].low, 90.0);
        assert_eq!(bars[0].close, 105.0);
        assert_eq!(bars[1].volume, 60000.5);
    }

    #[test]
    fn fetch_bars_filters_inclusive_range() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let start = Utc.with_ymd_and_hms(2024, 1, 15, 1, 0, 0).unwrap();
        let bars = adapter.fetch_bars("BTC-USD", Some(start), None).unwrap();
        assert_eq!(bars.len(), 2);

        let bars = adapter
            .fetch_bars("BTC-USD", Some(start), Some(start))
            .unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].close, 110.0);
    }

    #[test]
    fn fetch_bars_empty_file() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        assert!(adapter.fetch_bars("ETH-USD", None, None).unwrap().is_empty());
    }

    #[test]
    fn fetch_bars_missing_file_is_data_error() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        assert!(matches!(
            adapter.fetch_bars("DOGE-USD", None, None),
            Err(TradebotError::Data { .. })
        ));
    }

    #[test]
    fn invalid_number_reports_row() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("X.csv"),
            "timestamp,open,high,low,close,volume\n2024-01-01,1,1,1,abc,1\n",
        )
        .unwrap();
        let err = CsvAdapter::new(dir.path().to_path_buf())
            .fetch_bars("X", None, None)
            .unwrap_err();
        assert!(err.to_string().contains("row 1"));
        assert!(err.to_string().contains("close"));
    }

    #[test]
    fn rows_keep_file_order() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("X.csv"),
            "timestamp,open,high,low,close,volume\n\
             2024-01-02,1,1,1,1,1\n\
             2024-01-01,1,1,1,1,1\n",
        )
        .unwrap();
        let bars = CsvAdapter::new(dir.path().to_path_buf())
            .fetch_bars("X", None, None)
            .unwrap();
        assert!(bars[0].timestamp > bars[1].timestamp);
    }

    #[test]
    fn list_symbols_finds_csv_files() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        assert_eq!(adapter.list_symbols().unwrap(), vec!["BTC-USD", "ETH-USD"]);
    }

    #[test]
    fn list_symbols_missing_directory() {
        let adapter = CsvAdapter::new(PathBuf::from("/nonexistent/data/dir"));
        assert!(adapter.list_symbols().is_err());
    }
}
