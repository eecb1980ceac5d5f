//! RSI (Relative Strength Index) indicator.
//!
//! Uses Wilder's smoothing for average gain/loss calculation:
//! - First average: simple mean of gains/losses over the first n changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0 and avg_gain > 0: RSI = 100.
//! If both averages are 0 (no movement at all): RSI = 50, the neutral value.
//!
//! Warmup: the first n values have no RSI (need n price changes).

use crate::domain::error::TradebotError;

/// Returned when the window shows no price movement at all.
pub const RSI_NEUTRAL: f64 = 50.0;

/// RSI at every index of `values`; `None` during warm-up.
pub fn rsi_series(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() <= period {
        return out;
    }

    let changes: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
    let gain = |c: f64| if c > 0.0 { c } else { 0.0 };
    let loss = |c: f64| if c < 0.0 { -c } else { 0.0 };

    let mut avg_gain = changes[..period].iter().map(|&c| gain(c)).sum::<f64>() / period as f64;
    let mut avg_loss = changes[..period].iter().map(|&c| loss(c)).sum::<f64>() / period as f64;
    out[period] = Some(rsi_from_averages(avg_gain, avg_loss));

    for (i, &change) in changes.iter().enumerate().skip(period) {
        avg_gain = (avg_gain * (period - 1) as f64 + gain(change)) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + loss(change)) / period as f64;
        out[i + 1] = Some(rsi_from_averages(avg_gain, avg_loss));
    }

    out
}

/// RSI evaluated at the last value.
pub fn rsi(values: &[f64], period: usize) -> Result<f64, TradebotError> {
    if period == 0 || values.len() <= period {
        return Err(TradebotError::InsufficientData {
            have: values.len(),
            need: period + 1,
        });
    }
    rsi_series(values, period)
        .last()
        .copied()
        .flatten()
        .ok_or(TradebotError::InsufficientData {
            have: values.len(),
            need: period + 1,
        })
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    let value = if avg_loss == 0.0 {
        if avg_gain == 0.0 { RSI_NEUTRAL } else { 100.0 }
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    };
    value.clamp(0.0, 100.0)
}
