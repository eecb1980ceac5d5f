//! Risk manager: turns signals into bounded orders and owns the account.
//!
//! Sizing never produces a buy whose notional at the signal price exceeds
//! `max_position_value`, counting what is already held. Sells always close
//! the full held quantity.
//!
//! Exits are checked before the strategy is consulted and take precedence
//! over its signal, in this order: stop-loss, take-profit, then an early exit
//! requested by the strategy. Once the realized P&L for a UTC day reaches
//! `-max_daily_loss`, buys are refused until the next day.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, warn};

use super::account::AccountState;
use super::error::TradebotError;
use super::execution::floor_to_lot;
use super::ohlcv::PriceBar;
use super::order::{Fill, Order, OrderReason, OrderSide, OrderType};
use super::position::ClosedTrade;
use super::signal::{Signal, SignalKind};

#[derive(Debug, Clone, PartialEq)]
pub struct RiskConfig {
    /// Share of the available balance committed to one buy, in (0, 1].
    pub risk_fraction: f64,
    /// Cap on the notional held in one symbol.
    pub max_position_value: f64,
    /// Stop distance below the average entry, in [0, 1). Zero disables stops.
    pub stop_loss_fraction: f64,
    /// Profit target above the average entry. Zero disables targets.
    pub take_profit_fraction: f64,
    /// Realized loss per UTC day after which buys stop. Zero disables it.
    pub max_daily_loss: f64,
    pub lot_size: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        RiskConfig {
            risk_fraction: 0.1,
            max_position_value: 1_000.0,
            stop_loss_fraction: 0.0,
            take_profit_fraction: 0.0,
            max_daily_loss: 0.0,
            lot_size: 1e-8,
        }
    }
}

impl RiskConfig {
    pub fn validate(&self) -> Result<(), TradebotError> {
        if !(self.risk_fraction > 0.0 && self.risk_fraction <= 1.0) {
            return Err(TradebotError::config_invalid(
                "risk",
                "risk_fraction",
                "risk_fraction must be in (0, 1]",
            ));
        }
        if !(self.max_position_value.is_finite() && self.max_position_value > 0.0) {
            return Err(TradebotError::config_invalid(
                "risk",
                "max_position_value",
                "max_position_value must be positive",
            ));
        }
        if !(0.0..1.0).contains(&self.stop_loss_fraction) {
            return Err(TradebotError::config_invalid(
                "risk",
                "stop_loss_fraction",
                "stop_loss_fraction must be in [0, 1)",
            ));
        }
        if !(self.take_profit_fraction.is_finite() && self.take_profit_fraction >= 0.0) {
            return Err(TradebotError::config_invalid(
                "risk",
                "take_profit_fraction",
                "take_profit_fraction must be non-negative",
            ));
        }
        if !(self.max_daily_loss.is_finite() && self.max_daily_loss >= 0.0) {
            return Err(TradebotError::config_invalid(
                "risk",
                "max_daily_loss",
                "max_daily_loss must be non-negative",
            ));
        }
        if !(self.lot_size.is_finite() && self.lot_size > 0.0) {
            return Err(TradebotError::config_invalid(
                "risk",
                "lot_size",
                "lot_size must be positive",
            ));
        }
        Ok(())
    }

    /// Stop price for a long entered at `avg_entry`, if stops are enabled.
    pub fn stop_price(&self, avg_entry: f64) -> Option<f64> {
        (self.stop_loss_fraction > 0.0).then(|| avg_entry * (1.0 - self.stop_loss_fraction))
    }

    pub fn take_profit_price(&self, avg_entry: f64) -> Option<f64> {
        (self.take_profit_fraction > 0.0).then(|| avg_entry * (1.0 + self.take_profit_fraction))
    }
}

/// Size `signal` for `symbol` against `account`.
///
/// BUY: `min(max_position_value, balance * risk_fraction)` capped by the
/// head-room left under `max_position_value`, floored to whole lots.
/// SELL: the full held quantity. HOLD, a zero quantity or a flat position
/// on SELL give `None`.
pub fn size(
    signal: &Signal,
    symbol: &str,
    account: &AccountState,
    config: &RiskConfig,
) -> Option<Order> {
    let held = account.held_quantity(symbol);
    match signal.kind {
        SignalKind::Hold => None,
        SignalKind::Sell => (held > 0.0).then(|| Order::market(symbol, OrderSide::Sell, held)),
        SignalKind::Buy => {
            let price = signal.price;
            if !(price.is_finite() && price > 0.0) {
                return None;
            }
            let headroom = config.max_position_value - held * price;
            let budget = config
                .max_position_value
                .min(account.available_balance * config.risk_fraction)
                .min(headroom);
            if budget <= 0.0 {
                debug!(symbol, held, "position at maximum, buy skipped");
                return None;
            }
            let quantity = floor_to_lot(budget / price, config.lot_size);
            (quantity > 0.0).then(|| Order::market(symbol, OrderSide::Buy, quantity))
        }
    }
}

/// Forced full-size sell at the stop when `bar` trades down to it.
pub fn check_stop_loss(account: &AccountState, symbol: &str, bar: &PriceBar) -> Option<Order> {
    let position = account.position(symbol)?;
    if !position.should_stop_loss(bar.low) {
        return None;
    }
    Some(Order {
        symbol: symbol.to_string(),
        side: OrderSide::Sell,
        quantity: position.quantity,
        order_type: OrderType::Market,
        stop_price: position.stop_loss,
        reason: OrderReason::StopLoss,
    })
}

/// Full-size limit sell at the target when `bar` trades up to it.
pub fn check_take_profit(account: &AccountState, symbol: &str, bar: &PriceBar) -> Option<Order> {
    let position = account.position(symbol)?;
    let target = position.take_profit?;
    if !position.should_take_profit(bar.high) {
        return None;
    }
    Some(Order {
        symbol: symbol.to_string(),
        side: OrderSide::Sell,
        quantity: position.quantity,
        order_type: OrderType::Limit { price: target },
        stop_price: None,
        reason: OrderReason::TakeProfit,
    })
}

/// The exit that preempts the strategy on `bar`, if any.
///
/// A stop wins over a target reached on the same bar. `strategy_exit` is
/// the strategy's own request to close a held long and comes last.
pub fn check_exit(
    account: &AccountState,
    symbol: &str,
    bar: &PriceBar,
    strategy_exit: bool,
) -> Option<Order> {
    check_stop_loss(account, symbol, bar)
        .or_else(|| check_take_profit(account, symbol, bar))
        .or_else(|| {
            let held = account.held_quantity(symbol);
            (strategy_exit && held > 0.0).then(|| Order {
                reason: OrderReason::MeanReversion,
                ..Order::market(symbol, OrderSide::Sell, held)
            })
        })
}

/// Realized P&L for the current UTC day.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct DailyPnl {
    day: Option<NaiveDate>,
    realized: f64,
}

impl DailyPnl {
    fn on(&self, day: NaiveDate) -> f64 {
        if self.day == Some(day) { self.realized } else { 0.0 }
    }

    fn record(&mut self, at: DateTime<Utc>, pnl: f64) {
        let day = at.date_naive();
        if self.day != Some(day) {
            self.day = Some(day);
            self.realized = 0.0;
        }
        self.realized += pnl;
    }
}

/// Single owner of a session's account state.
#[derive(Debug, Clone)]
pub struct RiskManager {
    config: RiskConfig,
    account: AccountState,
    daily: DailyPnl,
}

impl RiskManager {
    pub fn new(config: RiskConfig, initial_balance: f64) -> Self {
        Self::with_account(config, AccountState::new(initial_balance))
    }

    pub fn with_account(config: RiskConfig, account: AccountState) -> Self {
        RiskManager {
            config,
            account,
            daily: DailyPnl::default(),
        }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub fn account(&self) -> &AccountState {
        &self.account
    }

    /// Replace the account with a snapshot from the exchange. Stops and
    /// targets on positions the snapshot carries without one are derived
    /// from entry.
    pub fn sync_account(&mut self, mut account: AccountState) {
        for position in account.positions.values_mut() {
            if position.stop_loss.is_none() {
                position.stop_loss = self.config.stop_price(position.avg_entry_price);
            }
            if position.take_profit.is_none() {
                position.take_profit = self.config.take_profit_price(position.avg_entry_price);
            }
        }
        self.account = account;
    }

    /// Realized P&L recorded so far on `day`.
    pub fn daily_pnl(&self, day: NaiveDate) -> f64 {
        self.daily.on(day)
    }

    /// True once the day's realized loss reaches `max_daily_loss`.
    pub fn daily_loss_reached(&self, day: NaiveDate) -> bool {
        self.config.max_daily_loss > 0.0 && self.daily.on(day) <= -self.config.max_daily_loss
    }

    pub fn size(&self, signal: &Signal, symbol: &str) -> Option<Order> {
        if signal.kind == SignalKind::Buy && self.daily_loss_reached(signal.timestamp.date_naive()) {
            warn!(
                symbol,
                daily_pnl = self.daily.on(signal.timestamp.date_naive()),
                limit = self.config.max_daily_loss,
                "daily loss limit reached, buy skipped"
            );
            return None;
        }
        size(signal, symbol, &self.account, &self.config)
    }

    pub fn check_stop_loss(&self, symbol: &str, bar: &PriceBar) -> Option<Order> {
        check_stop_loss(&self.account, symbol, bar)
    }

    pub fn check_exit(&self, symbol: &str, bar: &PriceBar, strategy_exit: bool) -> Option<Order> {
        check_exit(&self.account, symbol, bar, strategy_exit)
    }

    /// Apply a confirmed fill. Buys (re)set the stop and target from the new
    /// average entry. A rejected fill leaves the account untouched.
    pub fn apply_fill(&mut self, fill: &Fill) -> Result<Option<ClosedTrade>, TradebotError> {
        let closed = self.account.apply_fill(fill)?;

        if fill.order.side == OrderSide::Buy {
            if let Some(position) = self.account.position_mut(&fill.order.symbol) {
                position.stop_loss = self.config.stop_price(position.avg_entry_price);
                position.take_profit = self.config.take_profit_price(position.avg_entry_price);
            }
        }
        if let Some(trade) = &closed {
            self.daily.record(fill.timestamp, trade.pnl);
        }

        info!(
            symbol = %fill.order.symbol,
            side = %fill.order.side,
            quantity = fill.order.quantity,
            price = fill.price,
            fee = fill.fee,
            reason = %fill.order.reason,
            balance = self.account.available_balance,
            "fill applied"
        );

        Ok(closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::strategy::{SmaCrossoverParams, StrategyConfig};
    use chrono::{DateTime, TimeZone, Utc};

    const SYMBOL: &str = "BTC-USD";

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap()
    }

    fn signal(kind: SignalKind, price: f64) -> Signal {
        Signal {
            kind,
            strategy: StrategyConfig::SmaCrossover(SmaCrossoverParams::default()),
            bar_index: 0,
            timestamp: at(),
            price,
        }
    }

    fn config() -> RiskConfig {
        RiskConfig {
            risk_fraction: 0.5,
            max_position_value: 1_000.0,
            stop_loss_fraction: 0.1,
            take_profit_fraction: 0.0,
            max_daily_loss: 0.0,
            lot_size: 0.01,
        }
    }

    fn buy_fill(quantity: f64, price: f64) -> Fill {
        Fill {
            order: Order::market(SYMBOL, OrderSide::Buy, quantity),
            price,
            fee: 0.0,
            timestamp: at(),
        }
    }

    fn sell_fill(quantity: f64, price: f64, timestamp: DateTime<Utc>) -> Fill {
        Fill {
            order: Order::market(SYMBOL, OrderSide::Sell, quantity),
            price,
            fee: 0.0,
            timestamp,
        }
    }

    fn bar(low: f64, close: f64) -> PriceBar {
        PriceBar {
            timestamp: at(),
            open: close,
            high: close,
            low,
            close,
            volume: 1.0,
        }
    }

    fn ranged_bar(low: f64, high: f64) -> PriceBar {
        PriceBar {
            timestamp: at(),
            open: (low + high) / 2.0,
            high,
            low,
            close: (low + high) / 2.0,
            volume: 1.0,
        }
    }

    fn with_target() -> RiskConfig {
        RiskConfig {
            take_profit_fraction: 0.1,
            ..config()
        }
    }

    #[test]
    fn hold_sizes_to_none() {
        let account = AccountState::new(10_000.0);
        assert!(size(&signal(SignalKind::Hold, 100.0), SYMBOL, &account, &config()).is_none());
    }

    #[test]
    fn buy_capped_by_max_position_value() {
        let account = AccountState::new(10_000.0);
        let order = size(&signal(SignalKind::Buy, 100.0), SYMBOL, &account, &config()).unwrap();
        assert_eq!(order.side, OrderSide::Buy);
        assert!((order.quantity - 10.0).abs() < 1e-9);
    }

    #[test]
    fn buy_capped_by_risk_fraction() {
        let account = AccountState::new(1_000.0);
        let order = size(&signal(SignalKind::Buy, 100.0), SYMBOL, &account, &config()).unwrap();
        assert!((order.quantity - 5.0).abs() < 1e-9);
    }

    #[test]
    fn buy_limited_by_headroom() {
        let mut rm = RiskManager::new(config(), 10_000.0);
        rm.apply_fill(&buy_fill(6.0, 100.0)).unwrap();
        let order = rm.size(&signal(SignalKind::Buy, 100.0), SYMBOL).unwrap();
        assert!((order.quantity - 4.0).abs() < 1e-9);
    }

    #[test]
    fn buy_at_maximum_is_none() {
        let mut rm = RiskManager::new(config(), 10_000.0);
        rm.apply_fill(&buy_fill(10.0, 100.0)).unwrap();
        assert!(rm.size(&signal(SignalKind::Buy, 100.0), SYMBOL).is_none());
    }

    #[test]
    fn buy_rounding_to_zero_is_none() {
        let account = AccountState::new(0.01);
        assert!(size(&signal(SignalKind::Buy, 100.0), SYMBOL, &account, &config()).is_none());
    }

    #[test]
    fn sell_closes_full_position() {
        let mut rm = RiskManager::new(config(), 10_000.0);
        assert!(rm.size(&signal(SignalKind::Sell, 100.0), SYMBOL).is_none());

        rm.apply_fill(&buy_fill(3.0, 100.0)).unwrap();
        let order = rm.size(&signal(SignalKind::Sell, 120.0), SYMBOL).unwrap();
        assert_eq!(order.side, OrderSide::Sell);
        assert!((order.quantity - 3.0).abs() < f64::EPSILON);
        assert_eq!(order.reason, OrderReason::Signal);
    }

    #[test]
    fn buy_fill_sets_stop_from_average_entry() {
        let mut rm = RiskManager::new(config(), 10_000.0);
        rm.apply_fill(&buy_fill(1.0, 100.0)).unwrap();
        let stop = rm.account().position(SYMBOL).unwrap().stop_loss.unwrap();
        assert!((stop - 90.0).abs() < 1e-9);

        rm.apply_fill(&buy_fill(1.0, 120.0)).unwrap();
        let stop = rm.account().position(SYMBOL).unwrap().stop_loss.unwrap();
        assert!((stop - 99.0).abs() < 1e-9);
    }

    #[test]
    fn zero_stop_fraction_disables_stops() {
        let cfg = RiskConfig {
            stop_loss_fraction: 0.0,
            ..config()
        };
        let mut rm = RiskManager::new(cfg, 10_000.0);
        rm.apply_fill(&buy_fill(1.0, 100.0)).unwrap();
        assert!(rm.account().position(SYMBOL).unwrap().stop_loss.is_none());
        assert!(rm.check_stop_loss(SYMBOL, &bar(1.0, 50.0)).is_none());
    }

    #[test]
    fn stop_loss_fires_when_low_reaches_stop() {
        let mut rm = RiskManager::new(config(), 10_000.0);
        rm.apply_fill(&buy_fill(2.0, 100.0)).unwrap();

        assert!(rm.check_stop_loss(SYMBOL, &bar(90.5, 95.0)).is_none());

        let order = rm.check_stop_loss(SYMBOL, &bar(89.0, 95.0)).unwrap();
        assert_eq!(order.side, OrderSide::Sell);
        assert_eq!(order.reason, OrderReason::StopLoss);
        assert!((order.quantity - 2.0).abs() < f64::EPSILON);
        assert!((order.stop_price.unwrap() - 90.0).abs() < 1e-9);
    }

    #[test]
    fn rejected_fill_leaves_account_untouched() {
        let mut rm = RiskManager::new(config(), 100.0);
        let before = rm.account().clone();
        assert!(rm.apply_fill(&buy_fill(2.0, 100.0)).is_err());
        assert_eq!(rm.account(), &before);
    }

    #[test]
    fn validate_ranges() {
        assert!(config().validate().is_ok());
        for bad in [
            RiskConfig { risk_fraction: 0.0, ..config() },
            RiskConfig { risk_fraction: 1.5, ..config() },
            RiskConfig { max_position_value: 0.0, ..config() },
            RiskConfig { stop_loss_fraction: 1.0, ..config() },
            RiskConfig { lot_size: 0.0, ..config() },
            RiskConfig { take_profit_fraction: -0.1, ..config() },
            RiskConfig { max_daily_loss: f64::NAN, ..config() },
            RiskConfig { max_daily_loss: -1.0, ..config() },
        ] {
            assert!(bad.validate().unwrap_err().is_config_error());
        }
    }

    #[test]
    fn buy_fill_sets_take_profit_target() {
        let mut rm = RiskManager::new(with_target(), 10_000.0);
        rm.apply_fill(&buy_fill(1.0, 100.0)).unwrap();
        let target = rm.account().position(SYMBOL).unwrap().take_profit.unwrap();
        assert!((target - 110.0).abs() < 1e-9);

        let cfg = RiskManager::new(config(), 10_000.0);
        assert!(cfg.config().take_profit_price(100.0).is_none());
    }

    #[test]
    fn take_profit_fires_as_limit_at_target() {
        let mut rm = RiskManager::new(with_target(), 10_000.0);
        rm.apply_fill(&buy_fill(2.0, 100.0)).unwrap();

        assert!(rm.check_exit(SYMBOL, &ranged_bar(95.0, 109.0), false).is_none());

        let order = rm.check_exit(SYMBOL, &ranged_bar(95.0, 112.0), false).unwrap();
        assert_eq!(order.side, OrderSide::Sell);
        assert_eq!(order.reason, OrderReason::TakeProfit);
        assert!((order.quantity - 2.0).abs() < f64::EPSILON);
        assert_eq!(order.order_type, OrderType::Limit { price: 110.0 });
        assert!(order.stop_price.is_none());
    }

    #[test]
    fn stop_wins_over_target_on_same_bar() {
        let mut rm = RiskManager::new(with_target(), 10_000.0);
        rm.apply_fill(&buy_fill(1.0, 100.0)).unwrap();
        let order = rm.check_exit(SYMBOL, &ranged_bar(85.0, 115.0), true).unwrap();
        assert_eq!(order.reason, OrderReason::StopLoss);
    }

    #[test]
    fn strategy_exit_comes_after_stop_and_target() {
        let mut rm = RiskManager::new(with_target(), 10_000.0);
        assert!(rm.check_exit(SYMBOL, &ranged_bar(95.0, 105.0), true).is_none());

        rm.apply_fill(&buy_fill(1.5, 100.0)).unwrap();
        assert!(rm.check_exit(SYMBOL, &ranged_bar(95.0, 105.0), false).is_none());

        let order = rm.check_exit(SYMBOL, &ranged_bar(95.0, 105.0), true).unwrap();
        assert_eq!(order.reason, OrderReason::MeanReversion);
        assert_eq!(order.order_type, OrderType::Market);
        assert!((order.quantity - 1.5).abs() < f64::EPSILON);

        let order = rm.check_exit(SYMBOL, &ranged_bar(95.0, 111.0), true).unwrap();
        assert_eq!(order.reason, OrderReason::TakeProfit);
    }

    #[test]
    fn daily_loss_limit_blocks_buys_until_next_day() {
        let cfg = RiskConfig {
            max_daily_loss: 50.0,
            stop_loss_fraction: 0.0,
            ..config()
        };
        let mut rm = RiskManager::new(cfg, 10_000.0);
        let later = at() + chrono::Duration::hours(3);

        rm.apply_fill(&buy_fill(2.0, 100.0)).unwrap();
        rm.apply_fill(&sell_fill(1.0, 80.0, later)).unwrap();
        assert!((rm.daily_pnl(at().date_naive()) + 20.0).abs() < 1e-9);
        assert!(rm.size(&signal(SignalKind::Buy, 100.0), SYMBOL).is_some());

        rm.apply_fill(&sell_fill(1.0, 70.0, later)).unwrap();
        assert!(rm.daily_loss_reached(at().date_naive()));
        assert!(rm.size(&signal(SignalKind::Buy, 100.0), SYMBOL).is_none());

        let tomorrow = Signal {
            timestamp: at() + chrono::Duration::days(1),
            ..signal(SignalKind::Buy, 100.0)
        };
        assert!(rm.size(&tomorrow, SYMBOL).is_some());
    }

    #[test]
    fn daily_loss_limit_still_allows_sells() {
        let cfg = RiskConfig {
            max_daily_loss: 10.0,
            stop_loss_fraction: 0.0,
            ..config()
        };
        let mut rm = RiskManager::new(cfg, 10_000.0);
        rm.apply_fill(&buy_fill(2.0, 100.0)).unwrap();
        rm.apply_fill(&sell_fill(1.0, 50.0, at())).unwrap();
        assert!(rm.daily_loss_reached(at().date_naive()));

        let order = rm.size(&signal(SignalKind::Sell, 50.0), SYMBOL).unwrap();
        assert!((order.quantity - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_daily_loss_disables_limit() {
        let cfg = RiskConfig {
            stop_loss_fraction: 0.0,
            ..config()
        };
        let mut rm = RiskManager::new(cfg, 10_000.0);
        rm.apply_fill(&buy_fill(2.0, 100.0)).unwrap();
        rm.apply_fill(&sell_fill(2.0, 1.0, at())).unwrap();
        assert!(!rm.daily_loss_reached(at().date_naive()));
        assert!(rm.size(&signal(SignalKind::Buy, 100.0), SYMBOL).is_some());
    }
}
