#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::fs;
use std::path::Path;
pub use tradebot::domain::ohlcv::PriceBar;
use tradebot::domain::backtest::BacktestConfig;
use tradebot::domain::execution::ExecutionConfig;
use tradebot::domain::metrics::MetricsConfig;
use tradebot::domain::risk::RiskConfig;
use tradebot::domain::strategy::{SmaCrossoverParams, StrategyConfig};

/// Closes that produce one SMA(2)/SMA(4) round trip: BUY at bar 4, SELL at bar 7.
pub const CROSSOVER: [f64; 8] = [10.0, 10.0, 10.0, 12.0, 14.0, 16.0, 15.0, 13.0];

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

pub fn make_bar(hour: i64, close: f64) -> PriceBar {
    PriceBar {
        timestamp: start_time() + Duration::hours(hour),
        open: close,
        high: close,
        low: close,
        close,
        volume: 1.0,
    }
}

/// Hourly bars with open/high/low equal to the close.
pub fn flat_bars(closes: &[f64]) -> Vec<PriceBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| make_bar(i as i64, close))
        .collect()
}

pub fn crossover_strategy() -> StrategyConfig {
    StrategyConfig::SmaCrossover(SmaCrossoverParams {
        short_window: 2,
        long_window: 4,
    })
}

pub fn sample_risk() -> RiskConfig {
    RiskConfig {
        risk_fraction: 1.0,
        max_position_value: 1_000.0,
        stop_loss_fraction: 0.0,
        take_profit_fraction: 0.0,
        max_daily_loss: 0.0,
        lot_size: 0.001,
    }
}

pub fn sample_config() -> BacktestConfig {
    BacktestConfig {
        symbol: "BTC-USD".to_string(),
        initial_capital: 1_000.0,
        execution: ExecutionConfig {
            fee_flat: 0.0,
            fee_bps: 0.0,
            lot_size: 0.001,
            ..ExecutionConfig::default()
        },
        metrics: MetricsConfig::default(),
        start_date: None,
        end_date: None,
    }
}

/// Write `<dir>/<symbol>.csv` in the layout the CSV adapter reads.
pub fn write_csv(dir: &Path, symbol: &str, bars: &[PriceBar]) {
    let mut content = String::from("timestamp,open,high,low,close,volume\n");
    for bar in bars {
        content.push_str(&format!(
            "{},{},{},{},{},{}\n",
            bar.timestamp.to_rfc3339(),
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.volume
        ));
    }
    fs::write(dir.join(format!("{}.csv", symbol)), content).unwrap();
}

pub fn write_ini(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

/// Config matching `crossover_strategy`, `sample_risk` and `sample_config`.
pub const CROSSOVER_INI: &str = r#"
[strategy]
kind = sma_crossover
short_window = 2
long_window = 4

[risk]
risk_fraction = 1.0
max_position_value = 1000
stop_loss_fraction = 0
take_profit_fraction = 0
max_daily_loss = 0
lot_size = 0.001

[backtest]
symbol = BTC-USD
initial_capital = 1000
fee_bps = 0
slippage_bps = 0
"#;
