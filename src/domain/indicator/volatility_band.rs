//! Volatility band.
//!
//! - Middle: SMA over the lookback
//! - Upper: middle + (multiplier × stddev)
//! - Lower: middle - (multiplier × stddev)
//!
//! The band is evaluated over the last `lookback` values of the slice it is
//! given. Callers that must avoid look-ahead pass the history *before* the
//! bar being judged.

use super::{sma, stddev};
use crate::domain::error::TradebotError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolatilityBand {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

impl VolatilityBand {
    pub fn is_above(&self, price: f64) -> bool {
        price > self.upper
    }

    pub fn is_below(&self, price: f64) -> bool {
        price < self.lower
    }
}

pub fn volatility_band(
    values: &[f64],
    lookback: usize,
    multiplier: f64,
) -> Result<VolatilityBand, TradebotError> {
    let middle = sma(values, lookback)?;
    let deviation = stddev(values, lookback)?;

    Ok(VolatilityBand {
        upper: middle + multiplier * deviation,
        middle,
        lower: middle - multiplier * deviation,
    })
}
