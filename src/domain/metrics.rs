//! Performance metrics over a completed run.
//!
//! Returns and drawdowns are fractions (0.10 = 10%). Per-period returns are
//! taken between consecutive equity snapshots and annualized with
//! `periods_per_year`.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ohlcv::PriceBar;
use super::position::ClosedTrade;

/// Hourly bars around the clock.
pub const DEFAULT_PERIODS_PER_YEAR: f64 = 24.0 * 365.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EquitySnapshot {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricsConfig {
    pub risk_free_rate: f64,
    pub periods_per_year: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        MetricsConfig {
            risk_free_rate: 0.0,
            periods_per_year: DEFAULT_PERIODS_PER_YEAR,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub initial_capital: f64,
    pub final_equity: f64,
    pub peak_equity: f64,
    pub total_return: f64,
    pub buy_hold_return: f64,
    pub excess_return: f64,
    pub annualized_volatility: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
}

impl Metrics {
    pub fn compute(
        initial_capital: f64,
        equity_curve: &[EquitySnapshot],
        trades: &[ClosedTrade],
        bars: &[PriceBar],
        config: &MetricsConfig,
    ) -> Self {
        let final_equity = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(initial_capital);
        let peak_equity = equity_curve
            .iter()
            .map(|p| p.equity)
            .fold(initial_capital, f64::max);

        let total_return = fractional_change(initial_capital, final_equity);
        let buy_hold_return = match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => fractional_change(first.close, last.close),
            _ => 0.0,
        };

        let (annualized_volatility, sharpe_ratio) = compute_risk_adjusted(equity_curve, config);

        let mut winning_trades = 0usize;
        let mut losing_trades = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;

        for trade in trades {
            if trade.pnl > 0.0 {
                winning_trades += 1;
                total_wins += trade.pnl;
            } else if trade.pnl < 0.0 {
                losing_trades += 1;
                total_losses += trade.pnl.abs();
            }
        }

        let total_trades = trades.len();
        let win_rate = if total_trades > 0 {
            winning_trades as f64 / total_trades as f64
        } else {
            0.0
        };

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let avg_win = if winning_trades > 0 {
            total_wins / winning_trades as f64
        } else {
            0.0
        };

        let avg_loss = if losing_trades > 0 {
            total_losses / losing_trades as f64
        } else {
            0.0
        };

        Metrics {
            initial_capital,
            final_equity,
            peak_equity,
            total_return,
            buy_hold_return,
            excess_return: total_return - buy_hold_return,
            annualized_volatility,
            sharpe_ratio,
            max_drawdown: compute_drawdown(initial_capital, equity_curve),
            total_trades,
            winning_trades,
            losing_trades,
            win_rate,
            profit_factor,
            avg_win,
            avg_loss,
        }
    }

    /// Key/value rows for the summary report, in a fixed order.
    pub fn to_rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("initial_capital", format!("{:.2}", self.initial_capital)),
            ("final_equity", format!("{:.2}", self.final_equity)),
            ("peak_equity", format!("{:.2}", self.peak_equity)),
            ("total_return", format!("{:.6}", self.total_return)),
            ("buy_hold_return", format!("{:.6}", self.buy_hold_return)),
            ("excess_return", format!("{:.6}", self.excess_return)),
            ("annualized_volatility", format!("{:.6}", self.annualized_volatility)),
            ("sharpe_ratio", format!("{:.6}", self.sharpe_ratio)),
            ("max_drawdown", format!("{:.6}", self.max_drawdown)),
            ("total_trades", self.total_trades.to_string()),
            ("winning_trades", self.winning_trades.to_string()),
            ("losing_trades", self.losing_trades.to_string()),
            ("win_rate", format!("{:.6}", self.win_rate)),
            ("profit_factor", format!("{:.6}", self.profit_factor)),
            ("avg_win", format!("{:.2}", self.avg_win)),
            ("avg_loss", format!("{:.2}", self.avg_loss)),
        ]
    }
}

fn fractional_change(from: f64, to: f64) -> f64 {
    if from > 0.0 { (to - from) / from } else { 0.0 }
}

/// Largest peak-to-trough decline as a fraction of the peak. The starting
/// capital counts as the first peak.
fn compute_drawdown(initial_capital: f64, equity_curve: &[EquitySnapshot]) -> f64 {
    let mut peak = initial_capital;
    let mut max_dd = 0.0_f64;

    for point in equity_curve {
        if point.equity > peak {
            peak = point.equity;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - point.equity) / peak);
        }
    }

    max_dd
}

/// Annualized volatility and Sharpe ratio from per-period returns, using the
/// sample standard deviation.
fn compute_risk_adjusted(equity_curve: &[EquitySnapshot], config: &MetricsConfig) -> (f64, f64) {
    if equity_curve.len() < 3 {
        return (0.0, 0.0);
    }

    let returns: Vec<f64> = equity_curve
        .windows(2)
        .map(|w| fractional_change(w[0].equity, w[1].equity))
        .collect();

    let n = returns.len() as f64;
    let mean: f64 = returns.iter().sum::<f64>() / n;
    let variance: f64 = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let stddev = variance.sqrt();
    let annualizer = config.periods_per_year.sqrt();

    let per_period_rf = config.risk_free_rate / config.periods_per_year;
    let sharpe = if stddev > 0.0 {
        (mean - per_period_rf) / stddev * annualizer
    } else {
        0.0
    };

    (stddev * annualizer, sharpe)
}
