//! CLI definition and dispatch.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::paper_exchange::PaperExchange;
use crate::domain::backtest::{run_backtest, BacktestResult};
use crate::domain::config_validation::{load_run_config, RunConfig};
use crate::domain::error::TradebotError;
use crate::domain::live::{BarOutcome, LiveRunner};
use crate::domain::metrics::Metrics;
use crate::domain::ohlcv::{validate_series, PriceBar};
use crate::domain::risk::RiskManager;
use crate::domain::strategy;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "tradebot", about = "Signal engine, risk manager and backtester")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG wins when set.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay a CSV series and write CSV reports
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory holding <symbol>.csv files
        #[arg(short, long)]
        data: PathBuf,
        #[arg(short, long, default_value = "report")]
        output: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Print the signal at the last bar of a CSV series
    Signal {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Drive the live runner against the paper exchange over a CSV series
    Paper {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        /// Bars fed as history before trading starts
        #[arg(long, default_value_t = 0)]
        warmup: usize,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Backtest {
            config,
            data,
            output,
            symbol,
        } => run_backtest_command(&config, &data, &output, symbol.as_deref()),
        Command::Validate { config } => run_validate(&config),
        Command::Signal {
            config,
            data,
            symbol,
        } => run_signal(&config, &data, symbol.as_deref()),
        Command::Paper {
            config,
            data,
            symbol,
            warmup,
        } => run_paper(&config, &data, symbol.as_deref(), warmup),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    // A subscriber may already be installed when embedded; keep it.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn load_config(path: &Path) -> Result<RunConfig, TradebotError> {
    let adapter = FileConfigAdapter::from_file(path).map_err(|e| TradebotError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })?;
    load_run_config(&adapter)
}

fn load_bars(
    data_dir: &Path,
    run_config: &mut RunConfig,
    symbol_override: Option<&str>,
) -> Result<Vec<PriceBar>, TradebotError> {
    if let Some(symbol) = symbol_override {
        run_config.backtest.symbol = symbol.to_string();
    }
    let symbol = &run_config.backtest.symbol;
    let bars = CsvAdapter::new(data_dir.to_path_buf()).fetch_bars(symbol, None, None)?;
    info!(symbol = %symbol, bars = bars.len(), "loaded price series");
    Ok(bars)
}

fn run_backtest_command(
    config_path: &Path,
    data_dir: &Path,
    output_dir: &Path,
    symbol: Option<&str>,
) -> Result<(), TradebotError> {
    eprintln!("Loading config from {}", config_path.display());
    let mut run_config = load_config(config_path)?;
    let bars = load_bars(data_dir, &mut run_config, symbol)?;

    eprintln!(
        "Running backtest: {} on {} ({} bars)",
        run_config.strategy,
        run_config.backtest.symbol,
        bars.len()
    );

    let result = run_backtest(
        bars,
        &run_config.strategy,
        &run_config.risk,
        &run_config.backtest,
    )?;

    print_summary(&result);
    CsvReportAdapter.write(&result, output_dir)?;
    eprintln!("\nReports written to: {}", output_dir.display());
    Ok(())
}

fn print_summary(result: &BacktestResult) {
    let m: &Metrics = &result.metrics;
    eprintln!("\n=== Results ===");
    eprintln!("Final Equity:     {:.2}", m.final_equity);
    eprintln!("Total Return:     {:.2}%", m.total_return * 100.0);
    eprintln!("Buy & Hold:       {:.2}%", m.buy_hold_return * 100.0);
    eprintln!("Excess Return:    {:.2}%", m.excess_return * 100.0);
    eprintln!("Volatility:       {:.2}%", m.annualized_volatility * 100.0);
    eprintln!("Sharpe Ratio:     {:.2}", m.sharpe_ratio);
    eprintln!("Max Drawdown:     -{:.1}%", m.max_drawdown * 100.0);
    eprintln!("Total Trades:     {}", m.total_trades);
    eprintln!("Win Rate:         {:.1}%", m.win_rate * 100.0);
    eprintln!("Profit Factor:    {:.2}", m.profit_factor);
    eprintln!(
        "Signals:          {} buy / {} sell / {} hold",
        result.signal_counts.buy, result.signal_counts.sell, result.signal_counts.hold
    );
}

fn run_validate(config_path: &Path) -> Result<(), TradebotError> {
    eprintln!("Validating config: {}", config_path.display());
    let run_config = load_config(config_path)?;

    eprintln!("\nStrategy: {}", run_config.strategy);
    eprintln!("  {}", run_config.strategy.describe());
    let indicators: Vec<String> = run_config
        .strategy
        .indicators()
        .iter()
        .map(|i| i.to_string())
        .collect();
    eprintln!("  Indicators: {}", indicators.join(", "));
    eprintln!(
        "  Needs {} bars before the first signal",
        run_config.strategy.required_history()
    );
    let risk = &run_config.risk;
    eprintln!(
        "Risk:     fraction {}, max position {}, stop {}, take profit {}, daily loss {}",
        risk.risk_fraction,
        risk.max_position_value,
        risk.stop_loss_fraction,
        risk.take_profit_fraction,
        risk.max_daily_loss
    );
    let backtest = &run_config.backtest;
    let bound = |at: Option<DateTime<Utc>>| {
        at.map_or_else(|| "open".to_string(), |t| t.to_rfc3339())
    };
    eprintln!(
        "Backtest: {} with capital {}, from {} to {}",
        backtest.symbol,
        backtest.initial_capital,
        bound(backtest.start_date),
        bound(backtest.end_date)
    );
    eprintln!("\nConfiguration is valid.");
    Ok(())
}

fn run_signal(config_path: &Path, data_dir: &Path, symbol: Option<&str>) -> Result<(), TradebotError> {
    let mut run_config = load_config(config_path)?;
    let bars = load_bars(data_dir, &mut run_config, symbol)?;
    validate_series(&bars)?;

    let signal = strategy::evaluate(&bars, &run_config.strategy)?;
    println!("{}", signal);
    Ok(())
}

fn run_paper(
    config_path: &Path,
    data_dir: &Path,
    symbol: Option<&str>,
    warmup: usize,
) -> Result<(), TradebotError> {
    let mut run_config = load_config(config_path)?;
    let mut bars = load_bars(data_dir, &mut run_config, symbol)?;
    validate_series(&bars)?;
    bars.retain(|bar| run_config.backtest.in_range(bar.timestamp));

    let exchange = PaperExchange::new(
        run_config.backtest.initial_capital,
        run_config.backtest.execution.clone(),
    );
    let risk = RiskManager::new(run_config.risk.clone(), run_config.backtest.initial_capital);
    let mut runner = LiveRunner::new(
        &run_config.backtest.symbol,
        run_config.strategy.clone(),
        risk,
        exchange,
    )?;
    runner.sync_balance()?;

    let live_bars = bars.split_off(warmup.min(bars.len()));
    runner.warm_up(bars)?;

    let mut failures = 0usize;
    let mut resyncs = 0usize;
    for bar in live_bars {
        match runner.on_bar(bar)? {
            BarOutcome::Filled { fill, .. } => println!(
                "{} {} {:.8} @ {:.4} fee {:.4} ({})",
                fill.timestamp.to_rfc3339(),
                fill.order.side,
                fill.order.quantity,
                fill.price,
                fill.fee,
                fill.order.reason
            ),
            BarOutcome::OrderFailed { .. } => failures += 1,
            BarOutcome::Resynced { fill, reason } => {
                resyncs += 1;
                eprintln!(
                    "{} {} filled but rejected locally ({}), account resynced",
                    fill.timestamp.to_rfc3339(),
                    fill.order.side,
                    reason
                );
            }
            BarOutcome::NoOrder { .. } => {}
        }
    }

    let account = runner.risk_manager().account();
    let last_close = runner.history().last().map_or(0.0, |b| b.close);
    let counts = runner.signal_counts();
    eprintln!("\n=== Paper Session ===");
    eprintln!("Fills:            {}", runner.trades().len());
    eprintln!("Failed Orders:    {}", failures);
    eprintln!("Resyncs:          {}", resyncs);
    eprintln!(
        "Signals:          {} buy / {} sell / {} hold",
        counts.buy, counts.sell, counts.hold
    );
    eprintln!("Balance:          {:.2}", account.available_balance);
    eprintln!("Realized P&L:     {:.2}", account.realized_pnl);
    eprintln!(
        "Equity:           {:.2}",
        account.equity_at(&run_config.backtest.symbol, last_close)
    );
    Ok(())
}
