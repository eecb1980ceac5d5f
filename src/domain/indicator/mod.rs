//! Technical indicators over closing prices.
//!
//! Every function here is pure: it reads the slice it is given and nothing
//! else. The slice is ordered oldest first and the indicator is evaluated at
//! its last element.
//! - `sma`: simple moving average
//! - `rsi` / `rsi_series`: Wilder's relative strength index
//! - `stddev`: sample standard deviation
//! - `volatility_band`: mean ± multiplier × stddev

pub mod rsi;
pub mod sma;
pub mod stddev;
pub mod volatility_band;

pub use rsi::{rsi, rsi_series, RSI_NEUTRAL};
pub use sma::sma;
pub use stddev::stddev;
pub use volatility_band::{volatility_band, VolatilityBand};

use std::fmt;

use super::error::TradebotError;

/// Indicator identity plus parameters, used to label signals and logs.
#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorType {
    Sma(usize),
    Rsi(usize),
    Stddev(usize),
    VolatilityBand { lookback: usize, multiplier: f64 },
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Stddev(period) => write!(f, "STDDEV({})", period),
            IndicatorType::VolatilityBand {
                lookback,
                multiplier,
            } => write!(f, "BAND({},{})", lookback, multiplier),
        }
    }
}

/// The trailing `window` values, or `InsufficientData`.
pub(crate) fn trailing(values: &[f64], window: usize) -> Result<&[f64], TradebotError> {
    if window == 0 || values.len() < window {
        return Err(TradebotError::InsufficientData {
            have: values.len(),
            need: window.max(1),
        });
    }
    Ok(&values[values.len() - window..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indicator_type_display() {
        assert_eq!(IndicatorType::Sma(20).to_string(), "SMA(20)");
        assert_eq!(IndicatorType::Rsi(14).to_string(), "RSI(14)");
        assert_eq!(
            IndicatorType::VolatilityBand {
                lookback: 20,
                multiplier: 2.0
            }
            .to_string(),
            "BAND(20,2)"
        );
    }

    #[test]
    fn trailing_takes_last_window() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(trailing(&values, 2).unwrap(), &[3.0, 4.0]);
    }

    #[test]
    fn trailing_rejects_short_input() {
        let err = trailing(&[1.0], 2).unwrap_err();
        assert!(matches!(
            err,
            TradebotError::InsufficientData { have: 1, need: 2 }
        ));
    }

    #[test]
    fn trailing_rejects_zero_window() {
        assert!(trailing(&[1.0, 2.0], 0).is_err());
    }
}
