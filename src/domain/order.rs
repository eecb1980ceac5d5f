//! Orders and fills.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrderType {
    Market,
    Limit { price: f64 },
}

/// Why the risk manager created an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderReason {
    Signal,
    StopLoss,
    TakeProfit,
    /// The strategy asked to close early, e.g. a return to the band middle.
    MeanReversion,
}

impl fmt::Display for OrderReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderReason::Signal => write!(f, "signal"),
            OrderReason::StopLoss => write!(f, "stop_loss"),
            OrderReason::TakeProfit => write!(f, "take_profit"),
            OrderReason::MeanReversion => write!(f, "mean_reversion"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: f64,
    pub order_type: OrderType,
    pub stop_price: Option<f64>,
    pub reason: OrderReason,
}

impl Order {
    pub fn market(symbol: &str, side: OrderSide, quantity: f64) -> Self {
        Order {
            symbol: symbol.to_string(),
            side,
            quantity,
            order_type: OrderType::Market,
            stop_price: None,
            reason: OrderReason::Signal,
        }
    }

    pub fn notional(&self, price: f64) -> f64 {
        self.quantity * price
    }
}

/// A confirmed execution of an order.
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub order: Order,
    pub price: f64,
    pub fee: f64,
    pub timestamp: DateTime<Utc>,
}

impl Fill {
    pub fn notional(&self) -> f64 {
        self.order.quantity * self.price
    }
}
