//! Configuration access port trait.
//!
//! Implementors only need to provide raw string lookup. The typed getters
//! are strict: a key that is present but does not parse is an error, never a
//! silent fallback to a default.

use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::domain::error::TradebotError;
use crate::domain::ohlcv::parse_timestamp;

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;

    fn get_double(&self, section: &str, key: &str) -> Result<Option<f64>, TradebotError> {
        parse_value(self.get_string(section, key), section, key, "a number")
    }

    fn get_usize(&self, section: &str, key: &str) -> Result<Option<usize>, TradebotError> {
        parse_value(self.get_string(section, key), section, key, "a non-negative integer")
    }

    fn get_u64(&self, section: &str, key: &str) -> Result<Option<u64>, TradebotError> {
        parse_value(self.get_string(section, key), section, key, "a non-negative integer")
    }

    /// `true`/`yes`/`1` or `false`/`no`/`0`, case-insensitive.
    fn get_bool(&self, section: &str, key: &str) -> Result<Option<bool>, TradebotError> {
        let Some(raw) = self.get_string(section, key) else {
            return Ok(None);
        };
        match raw.trim().to_lowercase().as_str() {
            "" => Ok(None),
            "true" | "yes" | "1" => Ok(Some(true)),
            "false" | "no" | "0" => Ok(Some(false)),
            other => Err(TradebotError::config_invalid(
                section,
                key,
                format!("expected true or false, got '{}'", other),
            )),
        }
    }

    /// A timestamp in any format [`parse_timestamp`] accepts.
    fn get_timestamp(&self, section: &str, key: &str) -> Result<Option<DateTime<Utc>>, TradebotError> {
        let Some(raw) = self.get_string(section, key) else {
            return Ok(None);
        };
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        parse_timestamp(trimmed).map(Some).ok_or_else(|| {
            TradebotError::config_invalid(
                section,
                key,
                format!("expected a date or timestamp, got '{}'", trimmed),
            )
        })
    }
}

fn parse_value<T: FromStr>(
    raw: Option<String>,
    section: &str,
    key: &str,
    expected: &str,
) -> Result<Option<T>, TradebotError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed.parse::<T>().map(Some).map_err(|_| {
        TradebotError::config_invalid(section, key, format!("expected {}, got '{}'", expected, trimmed))
    })
}
