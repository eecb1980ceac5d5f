//! Volatility breakout: BUY when the close breaks above the band built from
//! the preceding bars, SELL when it breaks below.
//!
//! The band for bar i is computed over bars `i-lookback..i`, never including
//! bar i itself. With `mean_reversion_exit` set, a held long is closed once
//! the close falls back to the band middle.

use crate::domain::error::TradebotError;
use crate::domain::indicator::volatility_band;
use crate::domain::signal::SignalKind;

#[derive(Debug, Clone, PartialEq)]
pub struct VolatilityBreakoutParams {
    pub lookback_period: usize,
    pub volatility_multiplier: f64,
    pub mean_reversion_exit: bool,
}

impl Default for VolatilityBreakoutParams {
    fn default() -> Self {
        VolatilityBreakoutParams {
            lookback_period: 20,
            volatility_multiplier: 2.0,
            mean_reversion_exit: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BandPosition {
    Above,
    Inside,
    Below,
}

impl VolatilityBreakoutParams {
    pub fn validate(&self) -> Result<(), TradebotError> {
        if self.lookback_period < 2 {
            return Err(TradebotError::config_invalid(
                "strategy",
                "lookback_period",
                "lookback_period must be at least 2",
            ));
        }
        if !self.volatility_multiplier.is_finite() || self.volatility_multiplier <= 0.0 {
            return Err(TradebotError::config_invalid(
                "strategy",
                "volatility_multiplier",
                "volatility_multiplier must be positive",
            ));
        }
        Ok(())
    }

    pub fn required_history(&self) -> usize {
        self.lookback_period + 1
    }

    pub fn describe(&self) -> String {
        let exit = if self.mean_reversion_exit {
            " Held longs exit when the close returns to the middle band."
        } else {
            ""
        };
        format!(
            "Volatility breakout using {}-period bands at {}x standard deviation. \
             BUY on a close above the upper band, SELL on a close below the lower band.{}",
            self.lookback_period, self.volatility_multiplier, exit
        )
    }

    /// True when the last close is at or below the middle of the band built
    /// from the bars before it. Always false with the exit disabled.
    pub fn should_exit_long(&self, closes: &[f64]) -> bool {
        if !self.mean_reversion_exit {
            return false;
        }
        let Some(index) = closes.len().checked_sub(1) else {
            return false;
        };
        if index < self.lookback_period {
            return false;
        }
        match volatility_band(&closes[..index], self.lookback_period, self.volatility_multiplier) {
            Ok(band) => closes[index] <= band.middle,
            Err(_) => false,
        }
    }

    pub fn evaluate(&self, closes: &[f64]) -> SignalKind {
        let n = closes.len();
        let Some(current) = n.checked_sub(1).and_then(|i| self.position_at(closes, i)) else {
            return SignalKind::Hold;
        };
        let previous = n
            .checked_sub(2)
            .and_then(|i| self.position_at(closes, i))
            .unwrap_or(BandPosition::Inside);

        match (current, previous) {
            (BandPosition::Above, BandPosition::Inside | BandPosition::Below) => {
                tracing::debug!(close = closes[n - 1], "volatility breakout above band");
                SignalKind::Buy
            }
            (BandPosition::Below, BandPosition::Inside | BandPosition::Above) => {
                tracing::debug!(close = closes[n - 1], "volatility breakdown below band");
                SignalKind::Sell
            }
            _ => SignalKind::Hold,
        }
    }

    /// Where close `index` sits relative to the band of the bars before it.
    fn position_at(&self, closes: &[f64], index: usize) -> Option<BandPosition> {
        if index >= closes.len() || index < self.lookback_period {
            return None;
        }
        let band = volatility_band(
            &closes[..index],
            self.lookback_period,
            self.volatility_multiplier,
        )
        .ok()?;

        let close = closes[index];
        Some(if band.is_above(close) {
            BandPosition::Above
        } else if band.is_below(close) {
            BandPosition::Below
        } else {
            BandPosition::Inside
        })
    }
}
