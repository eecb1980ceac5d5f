//! Exchange access port trait.
//!
//! Any `Err` from `place_order` means the order was not filled; callers must
//! not apply partial state for it.

use chrono::{DateTime, Utc};

use crate::domain::account::AccountState;
use crate::domain::error::ExchangeError;
use crate::domain::ohlcv::PriceBar;
use crate::domain::order::{Fill, Order};

pub trait ExchangePort {
    /// Candles for `symbol` of `granularity_secs` width within `[start, end]`.
    fn get_candles(
        &self,
        symbol: &str,
        granularity_secs: u64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PriceBar>, ExchangeError>;

    fn get_balance(&self) -> Result<AccountState, ExchangeError>;

    fn place_order(&mut self, order: &Order) -> Result<Fill, ExchangeError>;

    /// Called with every bar the runner sees. Exchanges that price their own
    /// fills use it to track the market; real venues ignore it.
    fn on_market_data(&mut self, _bar: &PriceBar) {}
}
