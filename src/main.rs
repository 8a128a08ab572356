//! # Replay a tick log through the covered-call strategy
//! vega-backtest run --ticklog data/spy.tikx --symbols SPY
//!
//! # Replay without trading (market-data soak)
//! vega-backtest replay --ticklog data/spy.tikx

use std::fs::File;
use std::io::BufReader;
use std::str::FromStr;

use anyhow::Context;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use vega_backtest::engine::{BacktestConfig, BacktestEngine};
use vega_backtest::execution::{FillConfig, NotionalRiskFilter, RiskConfig};
use vega_backtest::model::Symbol;
use vega_backtest::strategy::{CoveredCallConfig, CoveredCallStrategy, NullStrategy, Strategy};
use vega_backtest::ticklog::TickLogReader;

#[derive(Parser)]
#[command(name = "vega-backtest")]
#[command(about = "Deterministic event-driven options backtester")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a covered-call backtest over a tick log
    Run {
        /// Path to the tick-log file
        #[arg(short, long)]
        ticklog: String,

        /// Underlyings the strategy trades, comma separated
        #[arg(short, long, value_delimiter = ',')]
        symbols: Vec<String>,

        /// Starting cash balance
        #[arg(long, default_value = "100000")]
        cash: Decimal,

        /// Abort on the first bookkeeping violation
        #[arg(long)]
        strict: bool,
    },

    /// Replay a tick log without a trading strategy
    Replay {
        /// Path to the tick-log file
        #[arg(short, long)]
        ticklog: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vega_backtest=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            ticklog,
            symbols,
            cash,
            strict,
        } => {
            let strategy_config = CoveredCallConfig {
                symbols: symbols
                    .iter()
                    .map(|s| Symbol::from_str(s))
                    .collect::<Result<_, _>>()
                    .context("invalid symbol")?,
                ..Default::default()
            };
            let strategy =
                CoveredCallStrategy::new(strategy_config).context("invalid strategy config")?;
            let engine_config = BacktestConfig {
                initial_cash: cash,
                strict,
                ..Default::default()
            };
            run_backtest(&ticklog, engine_config, Box::new(strategy))
        }
        Commands::Replay { ticklog } => {
            run_backtest(&ticklog, BacktestConfig::default(), Box::new(NullStrategy))
        }
    }
}

fn run_backtest(
    ticklog: &str,
    config: BacktestConfig,
    strategy: Box<dyn Strategy>,
) -> anyhow::Result<()> {
    let file = File::open(ticklog).with_context(|| format!("opening tick log {ticklog}"))?;
    let reader = TickLogReader::open(BufReader::new(file)).context("reading tick-log header")?;

    let mut engine = BacktestEngine::new(
        config,
        strategy,
        Box::new(NotionalRiskFilter::new(RiskConfig::default())),
        FillConfig::default(),
    )?;

    for event in reader {
        engine.push_event(event.context("reading tick-log record")?);
    }

    let result = engine.run();
    println!("{}", result.summary());
    Ok(())
}
