//! Account state: balance, open positions and realized P&L.
//!
//! The account is mutated only by fills. A fill that would oversell a
//! position or overdraw the balance is rejected and leaves the account as it
//! was.

use std::collections::{BTreeMap, HashMap};

use super::error::TradebotError;
use super::order::{Fill, OrderSide};
use super::position::{ClosedTrade, Position};

/// Relative tolerance when deciding whether a sell flattens a position.
const FLAT_TOLERANCE: f64 = 1e-9;
/// Absolute tolerance on cash checks, to absorb float rounding.
const CASH_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct AccountState {
    pub available_balance: f64,
    pub positions: BTreeMap<String, Position>,
    pub realized_pnl: f64,
}

impl AccountState {
    pub fn new(available_balance: f64) -> Self {
        AccountState {
            available_balance,
            positions: BTreeMap::new(),
            realized_pnl: 0.0,
        }
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn position_mut(&mut self, symbol: &str) -> Option<&mut Position> {
        self.positions.get_mut(symbol)
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.positions.contains_key(symbol)
    }

    pub fn held_quantity(&self, symbol: &str) -> f64 {
        self.positions.get(symbol).map_or(0.0, |p| p.quantity)
    }

    /// Unrealized P&L across positions; positions without a price are marked
    /// at their entry.
    pub fn unrealized_pnl(&self, prices: &HashMap<String, f64>) -> f64 {
        self.positions
            .values()
            .map(|pos| {
                let price = prices.get(&pos.symbol).copied().unwrap_or(pos.avg_entry_price);
                pos.unrealized_pnl(price)
            })
            .sum()
    }

    /// Balance plus the market value of every position.
    pub fn total_equity(&self, prices: &HashMap<String, f64>) -> f64 {
        let position_value: f64 = self
            .positions
            .values()
            .map(|pos| {
                let price = prices.get(&pos.symbol).copied().unwrap_or(pos.avg_entry_price);
                pos.market_value(price)
            })
            .sum();
        self.available_balance + position_value
    }

    /// Equity when only `symbol` needs a fresh mark.
    pub fn equity_at(&self, symbol: &str, price: f64) -> f64 {
        let mut prices = HashMap::new();
        prices.insert(symbol.to_string(), price);
        self.total_equity(&prices)
    }

    /// Apply a confirmed fill. A sell returns the closed trade for the
    /// quantity it sold.
    pub fn apply_fill(&mut self, fill: &Fill) -> Result<Option<ClosedTrade>, TradebotError> {
        let symbol = fill.order.symbol.as_str();
        let quantity = fill.order.quantity;

        if !(quantity.is_finite() && quantity > 0.0) {
            return Err(invalid(symbol, format!("quantity {} must be positive", quantity)));
        }
        if !(fill.price.is_finite() && fill.price > 0.0) || !(fill.fee.is_finite() && fill.fee >= 0.0)
        {
            return Err(invalid(symbol, "fill price and fee must be finite"));
        }

        match fill.order.side {
            OrderSide::Buy => {
                self.apply_buy(fill)?;
                Ok(None)
            }
            OrderSide::Sell => self.apply_sell(fill).map(Some),
        }
    }

    fn apply_buy(&mut self, fill: &Fill) -> Result<(), TradebotError> {
        let symbol = &fill.order.symbol;
        let quantity = fill.order.quantity;
        let cost = quantity * fill.price + fill.fee;

        if cost - self.available_balance > CASH_TOLERANCE {
            return Err(invalid(
                symbol,
                format!(
                    "cost {:.8} exceeds available balance {:.8}",
                    cost, self.available_balance
                ),
            ));
        }

        self.available_balance -= cost;

        match self.positions.get_mut(symbol) {
            Some(pos) => {
                let new_quantity = pos.quantity + quantity;
                pos.avg_entry_price =
                    (pos.quantity * pos.avg_entry_price + quantity * fill.price) / new_quantity;
                pos.quantity = new_quantity;
                pos.entry_fees += fill.fee;
            }
            None => {
                self.positions.insert(
                    symbol.clone(),
                    Position {
                        symbol: symbol.clone(),
                        quantity,
                        avg_entry_price: fill.price,
                        stop_loss: None,
                        take_profit: None,
                        entry_fees: fill.fee,
                        opened_at: fill.timestamp,
                    },
                );
            }
        }

        Ok(())
    }

    fn apply_sell(&mut self, fill: &Fill) -> Result<ClosedTrade, TradebotError> {
        let symbol = &fill.order.symbol;
        let quantity = fill.order.quantity;

        let Some(pos) = self.positions.get_mut(symbol) else {
            return Err(invalid(symbol, "no open position to sell"));
        };
        if quantity > pos.quantity * (1.0 + FLAT_TOLERANCE) {
            return Err(invalid(
                symbol,
                format!("sell quantity {} exceeds held {}", quantity, pos.quantity),
            ));
        }

        let sold = quantity.min(pos.quantity);
        let entry_fee_share = pos.entry_fees * sold / pos.quantity;
        let pnl = sold * (fill.price - pos.avg_entry_price) - fill.fee - entry_fee_share;

        let trade = ClosedTrade {
            symbol: symbol.clone(),
            quantity: sold,
            entry_price: pos.avg_entry_price,
            exit_price: fill.price,
            opened_at: pos.opened_at,
            closed_at: fill.timestamp,
            pnl,
            fees: fill.fee + entry_fee_share,
        };

        pos.quantity -= sold;
        pos.entry_fees -= entry_fee_share;
        let flat = pos.quantity <= sold * FLAT_TOLERANCE;

        self.available_balance += sold * fill.price - fill.fee;
        self.realized_pnl += pnl;
        if flat {
            self.positions.remove(symbol);
        }

        Ok(trade)
    }
}

fn invalid(symbol: &str, reason: impl Into<String>) -> TradebotError {
    TradebotError::InvalidFill {
        symbol: symbol.to_string(),
        reason: reason.into(),
    }
}
