//! RSI mean reversion: BUY on the bar RSI drops below the oversold level,
//! SELL on the bar it rises above the overbought level.

use crate::domain::error::TradebotError;
use crate::domain::indicator::rsi_series;
use crate::domain::signal::SignalKind;

#[derive(Debug, Clone, PartialEq)]
pub struct RsiParams {
    pub rsi_period: usize,
    pub oversold_threshold: f64,
    pub overbought_threshold: f64,
}

impl Default for RsiParams {
    fn default() -> Self {
        RsiParams {
            rsi_period: 14,
            oversold_threshold: 30.0,
            overbought_threshold: 70.0,
        }
    }
}

impl RsiParams {
    pub fn validate(&self) -> Result<(), TradebotError> {
        if self.rsi_period < 2 {
            return Err(TradebotError::config_invalid(
                "strategy",
                "rsi_period",
                "rsi_period must be at least 2",
            ));
        }
        for (key, value) in [
            ("oversold_threshold", self.oversold_threshold),
            ("overbought_threshold", self.overbought_threshold),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(TradebotError::config_invalid(
                    "strategy",
                    key,
                    format!("{} must be between 0 and 100", key),
                ));
            }
        }
        if self.oversold_threshold >= self.overbought_threshold {
            return Err(TradebotError::config_invalid(
                "strategy",
                "oversold_threshold",
                "oversold_threshold must be less than overbought_threshold",
            ));
        }
        Ok(())
    }

    pub fn required_history(&self) -> usize {
        self.rsi_period + 1
    }

    pub fn describe(&self) -> String {
        format!(
            "RSI strategy using {}-period RSI. BUY when RSI drops below {}, SELL when it rises above {}.",
            self.rsi_period, self.oversold_threshold, self.overbought_threshold
        )
    }

    pub fn evaluate(&self, closes: &[f64]) -> SignalKind {
        let n = closes.len();
        if n < self.required_history() {
            return SignalKind::Hold;
        }

        let series = rsi_series(closes, self.rsi_period);
        let Some(current) = series[n - 1] else {
            return SignalKind::Hold;
        };
        let previous = if n >= 2 { series[n - 2] } else { None };

        let entered_oversold = current < self.oversold_threshold
            && previous.is_none_or(|p| p >= self.oversold_threshold);
        let entered_overbought = current > self.overbought_threshold
            && previous.is_none_or(|p| p <= self.overbought_threshold);

        if entered_oversold {
            tracing::debug!(rsi = current, "RSI crossed into oversold");
            SignalKind::Buy
        } else if entered_overbought {
            tracing::debug!(rsi = current, "RSI crossed into overbought");
            SignalKind::Sell
        } else {
            SignalKind::Hold
        }
    }
}
