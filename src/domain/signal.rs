//! Trading signals produced by the strategy engine.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use super::strategy::StrategyConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalKind {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKind::Buy => write!(f, "BUY"),
            SignalKind::Sell => write!(f, "SELL"),
            SignalKind::Hold => write!(f, "HOLD"),
        }
    }
}

/// A directional recommendation, tagged with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub kind: SignalKind,
    pub strategy: StrategyConfig,
    pub bar_index: usize,
    pub timestamp: DateTime<Utc>,
    /// Close of the bar the signal was evaluated at.
    pub price: f64,
}

impl Signal {
    pub fn is_hold(&self) -> bool {
        self.kind == SignalKind::Hold
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {:.4} [{} bar {} {}]",
            self.kind,
            self.price,
            self.strategy,
            self.bar_index,
            self.timestamp.to_rfc3339()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::strategy::SmaCrossoverParams;
    use chrono::TimeZone;

    #[test]
    fn signal_kind_display() {
        assert_eq!(SignalKind::Buy.to_string(), "BUY");
        assert_eq!(SignalKind::Sell.to_string(), "SELL");
        assert_eq!(SignalKind::Hold.to_string(), "HOLD");
    }

    #[test]
    fn signal_display_includes_strategy() {
        let signal = Signal {
            kind: SignalKind::Buy,
            strategy: StrategyConfig::SmaCrossover(SmaCrossoverParams {
                short_window: 2,
                long_window: 4,
            }),
            bar_index: 4,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap(),
            price: 14.0,
        };
        let text = signal.to_string();
        assert!(text.starts_with("BUY @ 14.0000"));
        assert!(text.contains("sma_crossover(short=2,long=4)"));
        assert!(text.contains("bar 4"));
        assert!(!signal.is_hold());
    }
}
