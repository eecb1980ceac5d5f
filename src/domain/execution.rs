//! Fill simulation: slippage, fees and lot rounding.
//!
//! Market orders fill at the reference price adjusted by slippage: buys pay
//! `price * (1 + bps / 10_000)`, sells receive `price * (1 - bps / 10_000)`.
//! Stop-loss orders use their stop price as the reference and limit orders
//! their limit price; market orders use the close. Fees are `fee_flat + notional * fee_bps / 10_000`.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::order::{Fill, Order, OrderSide, OrderType};

const BPS: f64 = 10_000.0;

#[derive(Debug, Clone, PartialEq)]
pub enum SlippageModel {
    None,
    Fixed { bps: f64 },
    /// Uniform draw in `[0, max_bps]` per fill from a PRNG seeded with `seed`.
    SeededRandom { max_bps: f64, seed: u64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    pub fee_flat: f64,
    pub fee_bps: f64,
    pub slippage: SlippageModel,
    pub lot_size: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            fee_flat: 0.0,
            fee_bps: 0.0,
            slippage: SlippageModel::None,
            lot_size: 1e-8,
        }
    }
}

/// Fee for a fill of the given notional.
pub fn calculate_fee(notional: f64, config: &ExecutionConfig) -> f64 {
    config.fee_flat + notional * config.fee_bps / BPS
}

/// Move `price` against the taker by `bps` basis points.
pub fn apply_slippage(price: f64, side: OrderSide, bps: f64) -> f64 {
    match side {
        OrderSide::Buy => price * (1.0 + bps / BPS),
        OrderSide::Sell => price * (1.0 - bps / BPS),
    }
}

/// Round `quantity` down to a whole number of lots. A non-positive lot size
/// leaves the quantity unrounded.
pub fn floor_to_lot(quantity: f64, lot_size: f64) -> f64 {
    if !quantity.is_finite() || quantity <= 0.0 {
        return 0.0;
    }
    if lot_size <= 0.0 {
        return quantity;
    }
    (quantity / lot_size).floor() * lot_size
}

/// Turns orders into fills. Owns the slippage PRNG so that a run is
/// reproducible from its seed.
#[derive(Debug, Clone)]
pub struct FillSimulator {
    config: ExecutionConfig,
    rng: Option<StdRng>,
}

impl FillSimulator {
    pub fn new(config: ExecutionConfig) -> Self {
        let rng = match config.slippage {
            SlippageModel::SeededRandom { seed, .. } => Some(StdRng::seed_from_u64(seed)),
            _ => None,
        };
        FillSimulator { config, rng }
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    fn next_slippage_bps(&mut self) -> f64 {
        match self.config.slippage {
            SlippageModel::None => 0.0,
            SlippageModel::Fixed { bps } => bps,
            SlippageModel::SeededRandom { max_bps, .. } => match self.rng.as_mut() {
                Some(rng) if max_bps > 0.0 => rng.gen_range(0.0..=max_bps),
                _ => 0.0,
            },
        }
    }

    /// Simulate filling `order` against `market_price`.
    ///
    /// A buy whose cost plus fee exceeds `available_balance` is shrunk to the
    /// largest affordable lot-rounded quantity. Returns `None` when nothing
    /// can be filled.
    pub fn fill(
        &mut self,
        order: &Order,
        market_price: f64,
        available_balance: f64,
        timestamp: DateTime<Utc>,
    ) -> Option<Fill> {
        let reference = match (order.stop_price, order.order_type) {
            (Some(stop), _) => stop,
            (None, OrderType::Limit { price }) => price,
            (None, OrderType::Market) => market_price,
        };
        let bps = self.next_slippage_bps();
        let price = apply_slippage(reference, order.side, bps);
        if !(price.is_finite() && price > 0.0) {
            return None;
        }

        let mut quantity = order.quantity;
        if order.side == OrderSide::Buy {
            let cost = quantity * price + calculate_fee(quantity * price, &self.config);
            if cost > available_balance {
                let per_unit = price * (1.0 + self.config.fee_bps / BPS);
                let affordable = (available_balance - self.config.fee_flat) / per_unit;
                quantity = floor_to_lot(affordable.min(order.quantity), self.config.lot_size);
                tracing::debug!(
                    symbol = %order.symbol,
                    requested = order.quantity,
                    filled = quantity,
                    "buy shrunk to available balance"
                );
            }
        }
        if quantity <= 0.0 {
            return None;
        }

        let mut order = order.clone();
        order.quantity = quantity;
        let fee = calculate_fee(quantity * price, &self.config);

        Some(Fill {
            order,
            price,
            fee,
            timestamp,
        })
    }
}
