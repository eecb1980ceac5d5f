//! Backtest simulator.
//!
//! Replays a bar series through the strategy engine and risk manager. Each
//! bar runs, in order: exit check (stop-loss, take-profit, strategy exit),
//! strategy evaluation on bars `0..=i` (skipped when an exit fired), sizing,
//! simulated fill, equity snapshot. State is committed only at bar
//! boundaries, so a caller may stop between `step` calls.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::error::TradebotError;
use super::execution::{ExecutionConfig, FillSimulator};
use super::metrics::{EquitySnapshot, Metrics, MetricsConfig};
use super::ohlcv::{validate_series, PriceBar};
use super::order::{Fill, Order, OrderReason, OrderSide};
use super::position::ClosedTrade;
use super::risk::{RiskConfig, RiskManager};
use super::signal::SignalKind;
use super::strategy::{self, StrategyConfig};

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub symbol: String,
    pub initial_capital: f64,
    pub execution: ExecutionConfig,
    pub metrics: MetricsConfig,
    /// Inclusive bounds on the bars replayed. `None` leaves that side open.
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            symbol: "BTC-USD".to_string(),
            initial_capital: 10_000.0,
            execution: ExecutionConfig::default(),
            metrics: MetricsConfig::default(),
            start_date: None,
            end_date: None,
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), TradebotError> {
        let invalid = |key: &str, message: &str| -> Result<(), TradebotError> {
            Err(TradebotError::config_invalid("backtest", key, message))
        };

        if self.symbol.trim().is_empty() {
            return invalid("symbol", "symbol must not be empty");
        }
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return invalid("initial_capital", "initial_capital must be positive");
        }
        for (key, value) in [
            ("fee_flat", self.execution.fee_flat),
            ("fee_bps", self.execution.fee_bps),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return invalid(key, "must be a non-negative number");
            }
        }
        if !(self.execution.lot_size.is_finite() && self.execution.lot_size > 0.0) {
            return invalid("lot_size", "lot_size must be positive");
        }
        if !(0.0..1.0).contains(&self.metrics.risk_free_rate) {
            return invalid("risk_free_rate", "risk_free_rate must be in [0, 1)");
        }
        if !(self.metrics.periods_per_year.is_finite() && self.metrics.periods_per_year > 0.0) {
            return invalid("periods_per_year", "periods_per_year must be positive");
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return invalid("start_date", "start_date must not be after end_date");
            }
        }
        Ok(())
    }

    /// True when `at` lies inside the configured date range.
    pub fn in_range(&self, at: DateTime<Utc>) -> bool {
        self.start_date.is_none_or(|start| at >= start) && self.end_date.is_none_or(|end| at <= end)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BacktestState {
    Idle,
    Running { next_bar: usize },
    Completed,
    Failed { index: usize, reason: String },
}

impl BacktestState {
    pub fn name(&self) -> &'static str {
        match self {
            BacktestState::Idle => "idle",
            BacktestState::Running { .. } => "running",
            BacktestState::Completed => "completed",
            BacktestState::Failed { .. } => "failed",
        }
    }
}

/// One executed order in the trade log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeRecord {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: f64,
    pub fill_price: f64,
    pub fee: f64,
    pub reason: OrderReason,
}

impl From<&Fill> for TradeRecord {
    fn from(fill: &Fill) -> Self {
        TradeRecord {
            timestamp: fill.timestamp,
            symbol: fill.order.symbol.clone(),
            side: fill.order.side,
            quantity: fill.order.quantity,
            fill_price: fill.price,
            fee: fill.fee,
            reason: fill.order.reason,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignalCounts {
    pub buy: usize,
    pub sell: usize,
    pub hold: usize,
}

impl SignalCounts {
    pub fn record(&mut self, kind: SignalKind) {
        match kind {
            SignalKind::Buy => self.buy += 1,
            SignalKind::Sell => self.sell += 1,
            SignalKind::Hold => self.hold += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.buy + self.sell + self.hold
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub symbol: String,
    pub strategy: StrategyConfig,
    pub equity_curve: Vec<EquitySnapshot>,
    pub trades: Vec<TradeRecord>,
    pub closed_trades: Vec<ClosedTrade>,
    pub signal_counts: SignalCounts,
    pub metrics: Metrics,
}

pub struct Backtester {
    config: BacktestConfig,
    strategy: StrategyConfig,
    risk: RiskManager,
    fills: FillSimulator,
    bars: Vec<PriceBar>,
    state: BacktestState,
    equity_curve: Vec<EquitySnapshot>,
    trades: Vec<TradeRecord>,
    closed_trades: Vec<ClosedTrade>,
    signal_counts: SignalCounts,
}

impl Backtester {
    pub fn new(
        config: BacktestConfig,
        strategy: StrategyConfig,
        risk: RiskConfig,
        bars: Vec<PriceBar>,
    ) -> Self {
        let fills = FillSimulator::new(config.execution.clone());
        let risk = RiskManager::new(risk, config.initial_capital);
        Backtester {
            config,
            strategy,
            risk,
            fills,
            equity_curve: Vec::with_capacity(bars.len()),
            bars,
            state: BacktestState::Idle,
            trades: Vec::new(),
            closed_trades: Vec::new(),
            signal_counts: SignalCounts::default(),
        }
    }

    pub fn state(&self) -> &BacktestState {
        &self.state
    }

    pub fn risk_manager(&self) -> &RiskManager {
        &self.risk
    }

    pub fn equity_curve(&self) -> &[EquitySnapshot] {
        &self.equity_curve
    }

    /// Validate the configuration and series, trim the series to the date
    /// range, and move from `Idle` to `Running`.
    ///
    /// An invalid configuration is reported without leaving `Idle`. A
    /// malformed series, or a date range that selects no bars, moves the
    /// simulation to `Failed`.
    pub fn start(&mut self) -> Result<(), TradebotError> {
        if self.state != BacktestState::Idle {
            return Err(self.wrong_state("idle"));
        }

        self.strategy.validate()?;
        self.risk.config().validate()?;
        self.config.validate()?;

        if let Err(err) = validate_series(&self.bars) {
            if let TradebotError::MalformedSeries { index, reason } = &err {
                warn!(index, %reason, "backtest input rejected");
                self.state = BacktestState::Failed {
                    index: *index,
                    reason: reason.clone(),
                };
            }
            return Err(err);
        }

        if self.config.start_date.is_some() || self.config.end_date.is_some() {
            let total = self.bars.len();
            let config = &self.config;
            self.bars.retain(|bar| config.in_range(bar.timestamp));
            debug!(kept = self.bars.len(), total, "bars filtered to date range");
            if self.bars.is_empty() {
                let reason = "no bars inside the date range".to_string();
                warn!(%reason, "backtest input rejected");
                self.state = BacktestState::Failed {
                    index: 0,
                    reason: reason.clone(),
                };
                return Err(TradebotError::MalformedSeries { index: 0, reason });
            }
        }

        info!(
            symbol = %self.config.symbol,
            strategy = %self.strategy,
            bars = self.bars.len(),
            initial_capital = self.config.initial_capital,
            "backtest started"
        );
        self.state = BacktestState::Running { next_bar: 0 };
        Ok(())
    }

    /// Process the next bar. Returns `false` once the last bar is done and
    /// the simulation has moved to `Completed`.
    pub fn step(&mut self) -> Result<bool, TradebotError> {
        let BacktestState::Running { next_bar: i } = self.state else {
            return Err(self.wrong_state("running"));
        };

        if let Err(err) = self.process_bar(i) {
            self.state = BacktestState::Failed {
                index: i,
                reason: err.to_string(),
            };
            return Err(err);
        }

        if i + 1 < self.bars.len() {
            self.state = BacktestState::Running { next_bar: i + 1 };
            Ok(true)
        } else {
            self.state = BacktestState::Completed;
            info!(
                symbol = %self.config.symbol,
                trades = self.trades.len(),
                "backtest completed"
            );
            Ok(false)
        }
    }

    fn process_bar(&mut self, i: usize) -> Result<(), TradebotError> {
        let symbol = self.config.symbol.clone();
        let bar = self.bars[i].clone();

        let history = &self.bars[..=i];
        let strategy_exit = self.risk.account().has_position(&symbol)
            && strategy::should_exit_long(history, &self.strategy);

        let order = match self.risk.check_exit(&symbol, &bar, strategy_exit) {
            Some(exit) => {
                debug!(bar = i, reason = %exit.reason, low = bar.low, high = bar.high, "exit triggered");
                Some(exit)
            }
            None => {
                let signal = strategy::evaluate(history, &self.strategy)?;
                self.signal_counts.record(signal.kind);
                if !signal.is_hold() {
                    debug!(%signal, "signal");
                }
                self.risk.size(&signal, &symbol)
            }
        };

        if let Some(order) = order {
            self.execute(&order, &bar)?;
        }

        self.equity_curve.push(EquitySnapshot {
            timestamp: bar.timestamp,
            equity: self.risk.account().equity_at(&symbol, bar.close),
        });
        Ok(())
    }

    fn execute(&mut self, order: &Order, bar: &PriceBar) -> Result<(), TradebotError> {
        let balance = self.risk.account().available_balance;
        let Some(fill) = self.fills.fill(order, bar.close, balance, bar.timestamp) else {
            debug!(symbol = %order.symbol, side = %order.side, "order not fillable");
            return Ok(());
        };

        if let Some(closed) = self.risk.apply_fill(&fill)? {
            self.closed_trades.push(closed);
        }
        self.trades.push(TradeRecord::from(&fill));
        Ok(())
    }

    /// Consume a completed simulation and compute its summary.
    pub fn finish(self) -> Result<BacktestResult, TradebotError> {
        if self.state != BacktestState::Completed {
            return Err(self.wrong_state("completed"));
        }

        let metrics = Metrics::compute(
            self.config.initial_capital,
            &self.equity_curve,
            &self.closed_trades,
            &self.bars,
            &self.config.metrics,
        );

        Ok(BacktestResult {
            symbol: self.config.symbol,
            strategy: self.strategy,
            equity_curve: self.equity_curve,
            trades: self.trades,
            closed_trades: self.closed_trades,
            signal_counts: self.signal_counts,
            metrics,
        })
    }

    fn wrong_state(&self, expected: &'static str) -> TradebotError {
        TradebotError::InvalidState {
            state: self.state.name(),
            expected,
        }
    }
}

/// Run a full backtest from start to finish.
pub fn run_backtest(
    bars: Vec<PriceBar>,
    strategy: &StrategyConfig,
    risk: &RiskConfig,
    config: &BacktestConfig,
) -> Result<BacktestResult, TradebotError> {
    let mut backtester = Backtester::new(config.clone(), strategy.clone(), risk.clone(), bars);
    backtester.start()?;
    while backtester.step()? {}
    backtester.finish()
}
