//! In-memory paper exchange.
//!
//! Fills every order immediately against the last bar it was shown, using
//! the same fill model as the backtest simulator, and keeps its own account
//! ledger. Failures can be queued up front to exercise error paths.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::domain::account::AccountState;
use crate::domain::error::ExchangeError;
use crate::domain::execution::{ExecutionConfig, FillSimulator};
use crate::domain::ohlcv::PriceBar;
use crate::domain::order::{Fill, Order};
use crate::ports::exchange_port::ExchangePort;

pub struct PaperExchange {
    fills: FillSimulator,
    account: AccountState,
    candles: Vec<PriceBar>,
    last_bar: Option<PriceBar>,
    queued_failures: VecDeque<ExchangeError>,
}

impl PaperExchange {
    pub fn new(initial_balance: f64, execution: ExecutionConfig) -> Self {
        PaperExchange {
            fills: FillSimulator::new(execution),
            account: AccountState::new(initial_balance),
            candles: Vec::new(),
            last_bar: None,
            queued_failures: VecDeque::new(),
        }
    }

    /// Make the next `place_order` call fail with `error`.
    pub fn fail_next(&mut self, error: ExchangeError) {
        self.queued_failures.push_back(error);
    }

    pub fn account(&self) -> &AccountState {
        &self.account
    }
}

impl ExchangePort for PaperExchange {
    fn get_candles(
        &self,
        _symbol: &str,
        granularity_secs: u64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PriceBar>, ExchangeError> {
        if granularity_secs == 0 {
            return Err(ExchangeError::Network("granularity must be positive".into()));
        }
        Ok(self
            .candles
            .iter()
            .filter(|b| b.timestamp >= start && b.timestamp <= end)
            .cloned()
            .collect())
    }

    fn get_balance(&self) -> Result<AccountState, ExchangeError> {
        Ok(self.account.clone())
    }

    fn place_order(&mut self, order: &Order) -> Result<Fill, ExchangeError> {
        if let Some(error) = self.queued_failures.pop_front() {
            return Err(error);
        }
        let bar = self
            .last_bar
            .as_ref()
            .ok_or_else(|| ExchangeError::Network("no market data yet".into()))?;

        let fill = self
            .fills
            .fill(order, bar.close, self.account.available_balance, bar.timestamp)
            .ok_or(ExchangeError::InsufficientFunds)?;
        self.account
            .apply_fill(&fill)
            .map_err(|_| ExchangeError::InsufficientFunds)?;

        debug!(
            symbol = %order.symbol,
            side = %order.side,
            quantity = fill.order.quantity,
            price = fill.price,
            "paper fill"
        );
        Ok(fill)
    }

    fn on_market_data(&mut self, bar: &PriceBar) {
        self.candles.push(bar.clone());
        self.last_bar = Some(bar.clone());
    }
}
