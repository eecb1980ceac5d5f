//! OHLCV price bar representation.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use super::error::TradebotError;

#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

/// Closing prices of `bars`, in order.
pub fn closes(bars: &[PriceBar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

/// Parse a bar or config timestamp. Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`
/// and `YYYY-MM-DD` (both read as UTC, a bare date as midnight), or unix
/// seconds.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

/// Check that a series is non-empty, strictly increasing in time and carries
/// finite positive prices. Reports the first offending index.
pub fn validate_series(bars: &[PriceBar]) -> Result<(), TradebotError> {
    if bars.is_empty() {
        return Err(TradebotError::MalformedSeries {
            index: 0,
            reason: "empty series".into(),
        });
    }

    for (i, bar) in bars.iter().enumerate() {
        let prices = [bar.open, bar.high, bar.low, bar.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return Err(TradebotError::MalformedSeries {
                index: i,
                reason: "prices must be finite and positive".into(),
            });
        }
        if bar.low > bar.high {
            return Err(TradebotError::MalformedSeries {
                index: i,
                reason: format!("low {} above high {}", bar.low, bar.high),
            });
        }
        if i > 0 && bar.timestamp <= bars[i - 1].timestamp {
            return Err(TradebotError::MalformedSeries {
                index: i,
                reason: format!(
                    "timestamp {} not after {}",
                    bar.timestamp,
                    bars[i - 1].timestamp
                ),
            });
        }
    }

    Ok(())
}
