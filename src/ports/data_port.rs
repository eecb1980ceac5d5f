//! Historical data access port trait.

use chrono::{DateTime, Utc};

use crate::domain::error::TradebotError;
use crate::domain::ohlcv::PriceBar;

pub trait DataPort {
    /// Bars for `symbol` ordered by timestamp. `start` and `end` are
    /// inclusive bounds; `None` leaves that side open.
    fn fetch_bars(
        &self,
        symbol: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<PriceBar>, TradebotError>;

    fn list_symbols(&self) -> Result<Vec<String>, TradebotError>;
}
