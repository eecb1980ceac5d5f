//! Standard Deviation indicator.
//!
//! Sample standard deviation over the last n values:
//! STDDEV(n) = sqrt(sum((v - SMA(n))^2) / (n - 1))
//! Requires n >= 2.

use super::trailing;
use crate::domain::error::TradebotError;

pub fn stddev(values: &[f64], window: usize) -> Result<f64, TradebotError> {
    if window < 2 {
        return Err(TradebotError::InvalidWindow { window, min: 2 });
    }
    let window_values = trailing(values, window)?;
    let n = window_values.len() as f64;
    let mean = window_values.iter().sum::<f64>() / n;

    let variance = window_values
        .iter()
        .map(|v| {
            let diff = v - mean;
            diff * diff
        })
        .sum::<f64>()
        / (n - 1.0);

    Ok(variance.sqrt())
}
