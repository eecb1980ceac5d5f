//! Strategy engine.
//!
//! A strategy maps a price history to a [`Signal`] evaluated at the last bar
//! of that history. The set of strategies is closed: each variant of
//! [`StrategyConfig`] carries its own typed parameters and evaluation rule.
//!
//! Two rules hold for every variant:
//! - Only bars up to and including the evaluation bar are read.
//! - Signals are edge-triggered. The "previous" state is taken from the bar
//!   before the evaluation bar; if that bar was still inside the warm-up
//!   period the previous state is neutral, so an existing condition on the
//!   first evaluable bar counts as an edge.
//!
//! SMA crossover and volatility breakout read a bounded trailing window, so
//! `evaluate` hands them only the last `required_history() + 1` closes. RSI
//! uses Wilder smoothing seeded at the first bar and is given the full
//! history, making a replay over n bars O(n²) for that variant.

pub mod rsi_reversion;
pub mod sma_crossover;
pub mod volatility_breakout;

pub use rsi_reversion::RsiParams;
pub use sma_crossover::SmaCrossoverParams;
pub use volatility_breakout::VolatilityBreakoutParams;

use std::fmt;

use super::error::TradebotError;
use super::indicator::IndicatorType;
use super::ohlcv::{closes, PriceBar};
use super::signal::{Signal, SignalKind};

#[derive(Debug, Clone, PartialEq)]
pub enum StrategyConfig {
    SmaCrossover(SmaCrossoverParams),
    Rsi(RsiParams),
    VolatilityBreakout(VolatilityBreakoutParams),
}

impl StrategyConfig {
    /// Identifier used in config files (`[strategy] kind`).
    pub fn kind(&self) -> &'static str {
        match self {
            StrategyConfig::SmaCrossover(_) => "sma_crossover",
            StrategyConfig::Rsi(_) => "rsi",
            StrategyConfig::VolatilityBreakout(_) => "volatility_breakout",
        }
    }

    pub fn validate(&self) -> Result<(), TradebotError> {
        match self {
            StrategyConfig::SmaCrossover(p) => p.validate(),
            StrategyConfig::Rsi(p) => p.validate(),
            StrategyConfig::VolatilityBreakout(p) => p.validate(),
        }
    }

    /// Bars needed before the first possible non-HOLD signal.
    pub fn required_history(&self) -> usize {
        match self {
            StrategyConfig::SmaCrossover(p) => p.required_history(),
            StrategyConfig::Rsi(p) => p.required_history(),
            StrategyConfig::VolatilityBreakout(p) => p.required_history(),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            StrategyConfig::SmaCrossover(p) => p.describe(),
            StrategyConfig::Rsi(p) => p.describe(),
            StrategyConfig::VolatilityBreakout(p) => p.describe(),
        }
    }

    /// Indicators the strategy reads, in evaluation order.
    pub fn indicators(&self) -> Vec<IndicatorType> {
        match self {
            StrategyConfig::SmaCrossover(p) => {
                vec![IndicatorType::Sma(p.short_window), IndicatorType::Sma(p.long_window)]
            }
            StrategyConfig::Rsi(p) => vec![IndicatorType::Rsi(p.rsi_period)],
            StrategyConfig::VolatilityBreakout(p) => vec![IndicatorType::VolatilityBand {
                lookback: p.lookback_period,
                multiplier: p.volatility_multiplier,
            }],
        }
    }

    /// Trailing bars that determine the current and previous state, or
    /// `None` when the whole history matters.
    pub fn evaluation_window(&self) -> Option<usize> {
        match self {
            StrategyConfig::SmaCrossover(_) | StrategyConfig::VolatilityBreakout(_) => {
                Some(self.required_history() + 1)
            }
            StrategyConfig::Rsi(_) => None,
        }
    }

    fn signal_kind(&self, closes: &[f64]) -> SignalKind {
        match self {
            StrategyConfig::SmaCrossover(p) => p.evaluate(closes),
            StrategyConfig::Rsi(p) => p.evaluate(closes),
            StrategyConfig::VolatilityBreakout(p) => p.evaluate(closes),
        }
    }
}

impl fmt::Display for StrategyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyConfig::SmaCrossover(p) => write!(
                f,
                "sma_crossover(short={},long={})",
                p.short_window, p.long_window
            ),
            StrategyConfig::Rsi(p) => write!(
                f,
                "rsi(period={},oversold={},overbought={})",
                p.rsi_period, p.oversold_threshold, p.overbought_threshold
            ),
            StrategyConfig::VolatilityBreakout(p) => write!(
                f,
                "volatility_breakout(lookback={},multiplier={})",
                p.lookback_period, p.volatility_multiplier
            ),
        }
    }
}

/// Evaluate `config` at the last bar of `history`.
///
/// Warm-up is not an error: too little history yields HOLD. Only an empty
/// history is rejected, since there is no bar to evaluate at.
pub fn evaluate(history: &[PriceBar], config: &StrategyConfig) -> Result<Signal, TradebotError> {
    let last = history.last().ok_or_else(|| TradebotError::MalformedSeries {
        index: 0,
        reason: "empty series".into(),
    })?;

    let kind = config.signal_kind(&closes(trailing_bars(history, config)));

    Ok(Signal {
        kind,
        strategy: config.clone(),
        bar_index: history.len() - 1,
        timestamp: last.timestamp,
        price: last.close,
    })
}

/// True when `config` wants a held long closed at the last bar of `history`.
pub fn should_exit_long(history: &[PriceBar], config: &StrategyConfig) -> bool {
    match config {
        StrategyConfig::VolatilityBreakout(p) => {
            p.should_exit_long(&closes(trailing_bars(history, config)))
        }
        StrategyConfig::SmaCrossover(_) | StrategyConfig::Rsi(_) => false,
    }
}

fn trailing_bars<'a>(history: &'a [PriceBar], config: &StrategyConfig) -> &'a [PriceBar] {
    match config.evaluation_window() {
        Some(window) if history.len() > window => &history[history.len() - window..],
        _ => history,
    }
}
