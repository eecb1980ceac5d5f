//! Typed configuration loading.
//!
//! Builds and range-checks [`StrategyConfig`], [`RiskConfig`] and
//! [`BacktestConfig`] from a [`ConfigPort`]. Required keys:
//! `[strategy] kind`, `[risk] risk_fraction`, `[risk] max_position_value`
//! and `[backtest] initial_capital`. Everything else falls back to a default;
//! `[backtest] start_date` and `end_date` are unbounded when absent.

use crate::domain::backtest::BacktestConfig;
use crate::domain::error::TradebotError;
use crate::domain::execution::{ExecutionConfig, SlippageModel};
use crate::domain::metrics::{MetricsConfig, DEFAULT_PERIODS_PER_YEAR};
use crate::domain::risk::RiskConfig;
use crate::domain::strategy::{
    RsiParams, SmaCrossoverParams, StrategyConfig, VolatilityBreakoutParams,
};
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_SYMBOL: &str = "BTC-USD";
const DEFAULT_STOP_LOSS_FRACTION: f64 = 0.05;
const DEFAULT_TAKE_PROFIT_FRACTION: f64 = 0.10;
const DEFAULT_MAX_DAILY_LOSS: f64 = 500.0;
const DEFAULT_FEE_BPS: f64 = 50.0;
const DEFAULT_SLIPPAGE_BPS: f64 = 10.0;
const DEFAULT_LOT_SIZE: f64 = 1e-8;

/// Everything one run needs, validated.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub strategy: StrategyConfig,
    pub risk: RiskConfig,
    pub backtest: BacktestConfig,
}

pub fn load_run_config(config: &dyn ConfigPort) -> Result<RunConfig, TradebotError> {
    let strategy = load_strategy_config(config)?;
    let risk = load_risk_config(config)?;
    let backtest = load_backtest_config(config, risk.lot_size)?;
    Ok(RunConfig {
        strategy,
        risk,
        backtest,
    })
}

pub fn load_strategy_config(config: &dyn ConfigPort) -> Result<StrategyConfig, TradebotError> {
    let kind = required_string(config, "strategy", "kind")?;

    let strategy = match kind.trim().to_lowercase().as_str() {
        "sma_crossover" | "sma" => {
            let d = SmaCrossoverParams::default();
            StrategyConfig::SmaCrossover(SmaCrossoverParams {
                short_window: config
                    .get_usize("strategy", "short_window")?
                    .unwrap_or(d.short_window),
                long_window: config
                    .get_usize("strategy", "long_window")?
                    .unwrap_or(d.long_window),
            })
        }
        "rsi" => {
            let d = RsiParams::default();
            StrategyConfig::Rsi(RsiParams {
                rsi_period: config
                    .get_usize("strategy", "rsi_period")?
                    .unwrap_or(d.rsi_period),
                oversold_threshold: config
                    .get_double("strategy", "oversold_threshold")?
                    .unwrap_or(d.oversold_threshold),
                overbought_threshold: config
                    .get_double("strategy", "overbought_threshold")?
                    .unwrap_or(d.overbought_threshold),
            })
        }
        "volatility_breakout" | "volatility" => {
            let d = VolatilityBreakoutParams::default();
            StrategyConfig::VolatilityBreakout(VolatilityBreakoutParams {
                lookback_period: config
                    .get_usize("strategy", "lookback_period")?
                    .unwrap_or(d.lookback_period),
                volatility_multiplier: config
                    .get_double("strategy", "volatility_multiplier")?
                    .unwrap_or(d.volatility_multiplier),
                mean_reversion_exit: config
                    .get_bool("strategy", "mean_reversion_exit")?
                    .unwrap_or(d.mean_reversion_exit),
            })
        }
        other => {
            return Err(TradebotError::config_invalid(
                "strategy",
                "kind",
                format!(
                    "unknown strategy '{}', expected sma_crossover, rsi or volatility_breakout",
                    other
                ),
            ));
        }
    };

    strategy.validate()?;
    Ok(strategy)
}

pub fn load_risk_config(config: &dyn ConfigPort) -> Result<RiskConfig, TradebotError> {
    let risk = RiskConfig {
        risk_fraction: required_double(config, "risk", "risk_fraction")?,
        max_position_value: required_double(config, "risk", "max_position_value")?,
        stop_loss_fraction: config
            .get_double("risk", "stop_loss_fraction")?
            .unwrap_or(DEFAULT_STOP_LOSS_FRACTION),
        take_profit_fraction: config
            .get_double("risk", "take_profit_fraction")?
            .unwrap_or(DEFAULT_TAKE_PROFIT_FRACTION),
        max_daily_loss: config
            .get_double("risk", "max_daily_loss")?
            .unwrap_or(DEFAULT_MAX_DAILY_LOSS),
        lot_size: config
            .get_double("risk", "lot_size")?
            .unwrap_or(DEFAULT_LOT_SIZE),
    };
    risk.validate()?;
    Ok(risk)
}

pub fn load_backtest_config(
    config: &dyn ConfigPort,
    lot_size: f64,
) -> Result<BacktestConfig, TradebotError> {
    let initial_capital = required_double(config, "backtest", "initial_capital")?;

    let symbol = config
        .get_string("backtest", "symbol")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_SYMBOL.to_string());

    let fee_bps = non_negative(config, "backtest", "fee_bps", DEFAULT_FEE_BPS)?;
    let fee_flat = non_negative(config, "backtest", "fee_flat", 0.0)?;
    let slippage_bps = non_negative(config, "backtest", "slippage_bps", DEFAULT_SLIPPAGE_BPS)?;
    let slippage = match config.get_u64("backtest", "slippage_seed")? {
        Some(seed) => SlippageModel::SeededRandom {
            max_bps: slippage_bps,
            seed,
        },
        None if slippage_bps > 0.0 => SlippageModel::Fixed { bps: slippage_bps },
        None => SlippageModel::None,
    };

    let risk_free_rate = config
        .get_double("backtest", "risk_free_rate")?
        .unwrap_or(0.0);
    let periods_per_year = config
        .get_double("backtest", "periods_per_year")?
        .unwrap_or(DEFAULT_PERIODS_PER_YEAR);

    let backtest = BacktestConfig {
        symbol,
        initial_capital,
        execution: ExecutionConfig {
            fee_flat,
            fee_bps,
            slippage,
            lot_size,
        },
        metrics: MetricsConfig {
            risk_free_rate,
            periods_per_year,
        },
        start_date: config.get_timestamp("backtest", "start_date")?,
        end_date: config.get_timestamp("backtest", "end_date")?,
    };
    backtest.validate()?;
    Ok(backtest)
}

fn required_string(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<String, TradebotError> {
    config
        .get_string(section, key)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| TradebotError::config_missing(section, key))
}

fn required_double(config: &dyn ConfigPort, section: &str, key: &str) -> Result<f64, TradebotError> {
    config
        .get_double(section, key)?
        .ok_or_else(|| TradebotError::config_missing(section, key))
}

fn non_negative(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, TradebotError> {
    let value = config.get_double(section, key)?.unwrap_or(default);
    if !(value.is_finite() && value >= 0.0) {
        return Err(TradebotError::config_invalid(
            section,
            key,
            format!("{} must be non-negative", key),
        ));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MockConfig {
        values: HashMap<(String, String), String>,
    }

    impl MockConfig {
        fn new() -> Self {
            MockConfig {
                values: HashMap::new(),
            }
        }

        fn set(mut self, section: &str, key: &str, value: &str) -> Self {
            self.values
                .insert((section.to_string(), key.to_string()), value.to_string());
            self
        }

        fn minimal() -> Self {
            MockConfig::new()
                .set("strategy", "kind", "sma_crossover")
                .set("risk", "risk_fraction", "0.1")
                .set("risk", "max_position_value", "1000")
                .set("backtest", "initial_capital", "10000")
        }
    }

    impl ConfigPort for MockConfig {
        fn get_string(&self, section: &str, key: &str) -> Option<String> {
            self.values
                .get(&(section.to_string(), key.to_string()))
                .cloned()
        }
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let run = load_run_config(&MockConfig::minimal()).unwrap();
        assert_eq!(
            run.strategy,
            StrategyConfig::SmaCrossover(SmaCrossoverParams::default())
        );
        assert!((run.risk.stop_loss_fraction - 0.05).abs() < f64::EPSILON);
        assert!((run.risk.take_profit_fraction - 0.10).abs() < f64::EPSILON);
        assert!((run.risk.max_daily_loss - 500.0).abs() < f64::EPSILON);
        assert_eq!(run.backtest.symbol, "BTC-USD");
        assert!(run.backtest.start_date.is_none() && run.backtest.end_date.is_none());
        assert_eq!(run.backtest.execution.slippage, SlippageModel::Fixed { bps: 10.0 });
        assert!((run.backtest.execution.fee_bps - 50.0).abs() < f64::EPSILON);
        assert!((run.backtest.execution.lot_size - run.risk.lot_size).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_required_keys() {
        for (section, key) in [
            ("strategy", "kind"),
            ("risk", "risk_fraction"),
            ("risk", "max_position_value"),
            ("backtest", "initial_capital"),
        ] {
            let mut config = MockConfig::minimal();
            config
                .values
                .remove(&(section.to_string(), key.to_string()));
            let err = load_run_config(&config).unwrap_err();
            assert!(
                matches!(err, TradebotError::ConfigMissing { section: ref s, key: ref k } if s == section && k == key),
                "expected missing [{}] {}, got {}",
                section,
                key,
                err
            );
        }
    }

    #[test]
    fn rsi_params_are_read() {
        let config = MockConfig::minimal()
            .set("strategy", "kind", "rsi")
            .set("strategy", "rsi_period", "7")
            .set("strategy", "oversold_threshold", "25");
        let strategy = load_strategy_config(&config).unwrap();
        assert_eq!(
            strategy,
            StrategyConfig::Rsi(RsiParams {
                rsi_period: 7,
                oversold_threshold: 25.0,
                overbought_threshold: 70.0,
            })
        );
    }

    #[test]
    fn volatility_params_are_read() {
        let config = MockConfig::minimal()
            .set("strategy", "kind", "Volatility_Breakout")
            .set("strategy", "lookback_period", "10")
            .set("strategy", "volatility_multiplier", "1.5")
            .set("strategy", "mean_reversion_exit", "no");
        let strategy = load_strategy_config(&config).unwrap();
        assert_eq!(
            strategy,
            StrategyConfig::VolatilityBreakout(VolatilityBreakoutParams {
                lookback_period: 10,
                volatility_multiplier: 1.5,
                mean_reversion_exit: false,
            })
        );
    }

    #[test]
    fn mean_reversion_exit_defaults_on_and_rejects_junk() {
        let config = MockConfig::minimal().set("strategy", "kind", "volatility_breakout");
        let StrategyConfig::VolatilityBreakout(p) = load_strategy_config(&config).unwrap() else {
            panic!("expected volatility breakout");
        };
        assert!(p.mean_reversion_exit);

        let config = config.set("strategy", "mean_reversion_exit", "sometimes");
        assert!(load_strategy_config(&config).unwrap_err().is_config_error());
    }

    #[test]
    fn exit_limits_are_read_and_checked() {
        let config = MockConfig::minimal()
            .set("risk", "take_profit_fraction", "0.25")
            .set("risk", "max_daily_loss", "0");
        let risk = load_risk_config(&config).unwrap();
        assert!((risk.take_profit_fraction - 0.25).abs() < f64::EPSILON);
        assert!(risk.max_daily_loss.abs() < f64::EPSILON);

        for (key, value) in [("take_profit_fraction", "-0.1"), ("max_daily_loss", "-5")] {
            let config = MockConfig::minimal().set("risk", key, value);
            assert!(
                matches!(load_risk_config(&config).unwrap_err(), TradebotError::ConfigInvalid { key: ref k, .. } if k == key),
                "{} = {} should be rejected",
                key,
                value
            );
        }
    }

    #[test]
    fn date_range_is_read() {
        let config = MockConfig::minimal()
            .set("backtest", "start_date", "2024-01-01")
            .set("backtest", "end_date", "2024-01-31 23:00:00");
        let bt = load_backtest_config(&config, 0.01).unwrap();
        assert_eq!(bt.start_date.unwrap().to_rfc3339(), "2024-01-01T00:00:00+00:00");
        assert_eq!(bt.end_date.unwrap().to_rfc3339(), "2024-01-31T23:00:00+00:00");
    }

    #[test]
    fn bad_date_range_rejected() {
        let inverted = MockConfig::minimal()
            .set("backtest", "start_date", "2024-02-01")
            .set("backtest", "end_date", "2024-01-01");
        assert!(matches!(
            load_backtest_config(&inverted, 0.01).unwrap_err(),
            TradebotError::ConfigInvalid { ref key, .. } if key == "start_date"
        ));

        let garbled = MockConfig::minimal().set("backtest", "end_date", "next tuesday");
        assert!(matches!(
            load_backtest_config(&garbled, 0.01).unwrap_err(),
            TradebotError::ConfigInvalid { ref key, .. } if key == "end_date"
        ));
    }

    #[test]
    fn unknown_strategy_kind() {
        let config = MockConfig::minimal().set("strategy", "kind", "macd");
        let err = load_strategy_config(&config).unwrap_err();
        assert!(matches!(err, TradebotError::ConfigInvalid { .. }));
    }

    #[test]
    fn out_of_range_windows_rejected() {
        let config = MockConfig::minimal()
            .set("strategy", "short_window", "30")
            .set("strategy", "long_window", "10");
        assert!(load_strategy_config(&config).unwrap_err().is_config_error());
    }

    #[test]
    fn non_numeric_value_rejected() {
        let config = MockConfig::minimal().set("risk", "risk_fraction", "ten percent");
        assert!(matches!(
            load_risk_config(&config).unwrap_err(),
            TradebotError::ConfigInvalid { .. }
        ));
    }

    #[test]
    fn seeded_slippage_when_seed_present() {
        let config = MockConfig::minimal()
            .set("backtest", "slippage_bps", "5")
            .set("backtest", "slippage_seed", "99");
        let bt = load_backtest_config(&config, 0.01).unwrap();
        assert_eq!(
            bt.execution.slippage,
            SlippageModel::SeededRandom {
                max_bps: 5.0,
                seed: 99
            }
        );
    }

    #[test]
    fn zero_slippage_is_none() {
        let config = MockConfig::minimal().set("backtest", "slippage_bps", "0");
        let bt = load_backtest_config(&config, 0.01).unwrap();
        assert_eq!(bt.execution.slippage, SlippageModel::None);
    }

    #[test]
    fn backtest_ranges_rejected() {
        for (key, value) in [
            ("initial_capital", "0"),
            ("fee_bps", "-1"),
            ("risk_free_rate", "1.5"),
            ("periods_per_year", "0"),
        ] {
            let config = MockConfig::minimal().set("backtest", key, value);
            assert!(
                load_backtest_config(&config, 0.01).is_err(),
                "{} = {} should be rejected",
                key,
                value
            );
        }
    }
}
