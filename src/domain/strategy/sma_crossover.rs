//! SMA crossover: BUY when the short average crosses above the long one,
//! SELL when it crosses back below.

use crate::domain::error::TradebotError;
use crate::domain::indicator::sma;
use crate::domain::signal::SignalKind;

#[derive(Debug, Clone, PartialEq)]
pub struct SmaCrossoverParams {
    pub short_window: usize,
    pub long_window: usize,
}

impl Default for SmaCrossoverParams {
    fn default() -> Self {
        SmaCrossoverParams {
            short_window: 10,
            long_window: 30,
        }
    }
}

impl SmaCrossoverParams {
    pub fn validate(&self) -> Result<(), TradebotError> {
        if self.short_window < 2 {
            return Err(TradebotError::config_invalid(
                "strategy",
                "short_window",
                "short_window must be at least 2",
            ));
        }
        if self.long_window < 2 {
            return Err(TradebotError::config_invalid(
                "strategy",
                "long_window",
                "long_window must be at least 2",
            ));
        }
        if self.short_window >= self.long_window {
            return Err(TradebotError::config_invalid(
                "strategy",
                "short_window",
                "short_window must be less than long_window",
            ));
        }
        Ok(())
    }

    /// One bar beyond the long window, to see the crossover edge.
    pub fn required_history(&self) -> usize {
        self.long_window + 1
    }

    pub fn describe(&self) -> String {
        format!(
            "SMA crossover using {}-period and {}-period moving averages. \
             BUY when the short average crosses above the long one, SELL when it crosses below.",
            self.short_window, self.long_window
        )
    }

    pub fn evaluate(&self, closes: &[f64]) -> SignalKind {
        let n = closes.len();
        if n < self.required_history() {
            return SignalKind::Hold;
        }

        let Some((short, long)) = self.averages(closes) else {
            return SignalKind::Hold;
        };

        let previous = if n > self.required_history() {
            self.averages(&closes[..n - 1])
        } else {
            None
        };

        let was_above = previous.is_some_and(|(s, l)| s > l);
        let was_below = previous.is_some_and(|(s, l)| s < l);

        if short > long && !was_above {
            tracing::debug!(short, long, "SMA crossover: short crossed above long");
            SignalKind::Buy
        } else if short < long && !was_below {
            tracing::debug!(short, long, "SMA crossover: short crossed below long");
            SignalKind::Sell
        } else {
            SignalKind::Hold
        }
    }

    fn averages(&self, closes: &[f64]) -> Option<(f64, f64)> {
        let short = sma(closes, self.short_window).ok()?;
        let long = sma(closes, self.long_window).ok()?;
        Some((short, long))
    }
}
