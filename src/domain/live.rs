//! Live runner: feeds bars as they arrive through the same strategy engine
//! and risk manager the backtest uses, and sends the resulting orders to an
//! exchange.
//!
//! Exchange failures are logged and leave the account untouched; retrying is
//! up to the caller. A fill the exchange confirmed but the local ledger
//! rejects is never dropped: the account is resynced from the exchange.

use tracing::{debug, error, info, warn};

use super::backtest::{SignalCounts, TradeRecord};
use super::error::{ExchangeError, TradebotError};
use super::ohlcv::{validate_series, PriceBar};
use super::order::{Fill, Order};
use super::position::ClosedTrade;
use super::risk::RiskManager;
use super::signal::Signal;
use super::strategy::{self, StrategyConfig};
use crate::ports::exchange_port::ExchangePort;

/// What happened on one bar.
#[derive(Debug, Clone, PartialEq)]
pub enum BarOutcome {
    /// No order was produced. Carries the signal when the strategy ran.
    NoOrder { signal: Option<Signal> },
    Filled { fill: Fill, closed: Option<ClosedTrade> },
    /// The exchange refused or failed the order; nothing was applied.
    OrderFailed { order: Order, error: ExchangeError },
    /// The exchange filled the order but the local ledger rejected the fill.
    /// The account was replaced with the exchange's balance.
    Resynced { fill: Fill, reason: String },
}

pub struct LiveRunner<E: ExchangePort> {
    symbol: String,
    strategy: StrategyConfig,
    risk: RiskManager,
    exchange: E,
    history: Vec<PriceBar>,
    trades: Vec<TradeRecord>,
    signal_counts: SignalCounts,
}

impl<E: ExchangePort> LiveRunner<E> {
    /// Fails with a config error when the strategy, the risk limits or the
    /// starting balance are out of range.
    pub fn new(
        symbol: &str,
        strategy: StrategyConfig,
        risk: RiskManager,
        exchange: E,
    ) -> Result<Self, TradebotError> {
        strategy.validate()?;
        risk.config().validate()?;
        let balance = risk.account().available_balance;
        if !(balance.is_finite() && balance >= 0.0) {
            return Err(TradebotError::config_invalid(
                "backtest",
                "initial_capital",
                "initial_capital must not be negative",
            ));
        }
        if symbol.trim().is_empty() {
            return Err(TradebotError::config_invalid(
                "backtest",
                "symbol",
                "symbol must not be empty",
            ));
        }

        Ok(LiveRunner {
            symbol: symbol.to_string(),
            strategy,
            risk,
            exchange,
            history: Vec::new(),
            trades: Vec::new(),
            signal_counts: SignalCounts::default(),
        })
    }

    pub fn risk_manager(&self) -> &RiskManager {
        &self.risk
    }

    pub fn exchange(&self) -> &E {
        &self.exchange
    }

    pub fn exchange_mut(&mut self) -> &mut E {
        &mut self.exchange
    }

    pub fn history(&self) -> &[PriceBar] {
        &self.history
    }

    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    pub fn signal_counts(&self) -> SignalCounts {
        self.signal_counts
    }

    /// Pull the account from the exchange into the risk manager.
    pub fn sync_balance(&mut self) -> Result<(), TradebotError> {
        let account = self.exchange.get_balance()?;
        info!(balance = account.available_balance, "account synced from exchange");
        self.risk.sync_account(account);
        Ok(())
    }

    /// Seed history without trading on it.
    pub fn warm_up(&mut self, bars: Vec<PriceBar>) -> Result<(), TradebotError> {
        if bars.is_empty() {
            return Ok(());
        }
        let mut combined = self.history.clone();
        combined.extend(bars);
        validate_series(&combined)?;
        self.history = combined;
        Ok(())
    }

    /// Process one newly closed bar.
    pub fn on_bar(&mut self, bar: PriceBar) -> Result<BarOutcome, TradebotError> {
        let index = self.history.len();
        if let Some(last) = self.history.last() {
            if bar.timestamp <= last.timestamp {
                return Err(TradebotError::MalformedSeries {
                    index,
                    reason: "timestamp not after previous bar".into(),
                });
            }
        }
        validate_series(std::slice::from_ref(&bar)).map_err(|err| match err {
            TradebotError::MalformedSeries { reason, .. } => {
                TradebotError::MalformedSeries { index, reason }
            }
            other => other,
        })?;

        self.exchange.on_market_data(&bar);
        self.history.push(bar.clone());

        let strategy_exit = self.risk.account().has_position(&self.symbol)
            && strategy::should_exit_long(&self.history, &self.strategy);

        let (order, signal) = match self.risk.check_exit(&self.symbol, &bar, strategy_exit) {
            Some(exit) => {
                info!(symbol = %self.symbol, reason = %exit.reason, "exit triggered");
                (Some(exit), None)
            }
            None => {
                let signal = strategy::evaluate(&self.history, &self.strategy)?;
                self.signal_counts.record(signal.kind);
                (self.risk.size(&signal, &self.symbol), Some(signal))
            }
        };

        let Some(order) = order else {
            return Ok(BarOutcome::NoOrder { signal });
        };

        match self.exchange.place_order(&order) {
            Ok(fill) => {
                self.trades.push(TradeRecord::from(&fill));
                match self.risk.apply_fill(&fill) {
                    Ok(closed) => {
                        debug!(symbol = %self.symbol, side = %fill.order.side, "order filled");
                        Ok(BarOutcome::Filled { fill, closed })
                    }
                    Err(err) => {
                        error!(
                            symbol = %self.symbol,
                            side = %fill.order.side,
                            quantity = fill.order.quantity,
                            %err,
                            "exchange fill rejected by local ledger, resyncing"
                        );
                        self.sync_balance()?;
                        Ok(BarOutcome::Resynced {
                            fill,
                            reason: err.to_string(),
                        })
                    }
                }
            }
            Err(error) => {
                warn!(
                    symbol = %self.symbol,
                    side = %order.side,
                    quantity = order.quantity,
                    %error,
                    "order failed, state unchanged"
                );
                Ok(BarOutcome::OrderFailed { order, error })
            }
        }
    }
}
