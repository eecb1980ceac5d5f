//! Position tracking.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// An open holding in one symbol. Quantity is positive for a long; a flat
/// position is removed from the account rather than kept at zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub quantity: f64,
    pub avg_entry_price: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    /// Fees paid on the fills that opened or grew this position.
    pub entry_fees: f64,
    pub opened_at: DateTime<Utc>,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.quantity > 0.0
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity.abs() * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.quantity * (price - self.avg_entry_price)
    }

    /// True when a bar trading down to `low` reaches the stop.
    pub fn should_stop_loss(&self, low: f64) -> bool {
        match self.stop_loss {
            Some(stop) if self.is_long() => low <= stop,
            _ => false,
        }
    }

    /// True when a bar trading up to `high` reaches the profit target.
    pub fn should_take_profit(&self, high: f64) -> bool {
        match self.take_profit {
            Some(target) if self.is_long() => high >= target,
            _ => false,
        }
    }
}

/// A round trip from first entry to full exit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClosedTrade {
    pub symbol: String,
    pub quantity: f64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub opened_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
    /// Net of entry and exit fees.
    pub pnl: f64,
    pub fees: f64,
}

impl ClosedTrade {
    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }
}
