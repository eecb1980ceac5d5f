//! Simple Moving Average.
//!
//! SMA(n) = sum(values[last n]) / n

use super::trailing;
use crate::domain::error::TradebotError;

pub fn sma(values: &[f64], window: usize) -> Result<f64, TradebotError> {
    let window_values = trailing(values, window)?;
    Ok(window_values.iter().sum::<f64>() / window as f64)
}
