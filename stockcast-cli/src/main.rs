//! Stockcast CLI: refresh, query and serve ranked stock forecasts.
//!
//! Commands:
//! - `update`: run one batch refresh over the universe (or `--symbols`)
//! - `add`: register a new symbol
//! - `top`, `future-top`, `recommend`: ranked listings
//! - `stock`, `portfolio`: single-symbol lookups
//! - `snapshot`, `show-snapshot`: write or print the cached lists
//! - `daemon`: run the update and snapshot jobs on their schedule
//!
//! Results are printed to stdout as JSON; logs go to stderr.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use stockcast_runner::{BatchReport, StockcastConfig, StockcastService, SymbolStatus};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "stockcast",
    about = "Stockcast CLI: daily market data refresh, multi-horizon forecasts and rankings"
)]
struct Cli {
    /// Path to a TOML config file. Defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the record store directory.
    #[arg(long, global = true)]
    store_dir: Option<PathBuf>,

    /// Override the snapshot directory.
    #[arg(long, global = true)]
    snapshot_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch new bars and refresh stale predictions.
    Update {
        /// Reference date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        as_of: Option<NaiveDate>,

        /// Only these symbols (comma-separated). Defaults to the whole universe.
        #[arg(long, value_delimiter = ',')]
        symbols: Vec<String>,
    },
    /// Register a symbol in the universe.
    Add {
        symbol: String,

        /// Display name.
        #[arg(long, default_value = "")]
        name: String,

        /// Icon URL.
        #[arg(long, default_value = "")]
        icon: String,
    },
    /// Top symbols by trailing close growth.
    Top {
        #[arg(long, default_value_t = 7)]
        days: i64,

        #[arg(long, default_value_t = 10)]
        n: usize,
    },
    /// Top symbols by predicted growth at a horizon.
    FutureTop {
        #[arg(long, default_value_t = 12)]
        months: u32,

        #[arg(long, default_value_t = 10)]
        n: usize,
    },
    /// Affordable symbols (price below amount / 5) by predicted growth.
    Recommend {
        #[arg(long)]
        amount: f64,

        #[arg(long, default_value_t = 12)]
        months: u32,

        #[arg(long, default_value_t = 10)]
        n: usize,
    },
    /// Full record for one symbol.
    Stock { symbol: String },
    /// Name, current price and icon for one symbol.
    Portfolio { symbol: String },
    /// Recompute and write the trending and top snapshots.
    Snapshot,
    /// Print a previously written snapshot.
    ShowSnapshot {
        #[arg(value_enum)]
        kind: SnapshotKind,
    },
    /// Run the periodic update and snapshot jobs until the process is stopped.
    Daemon,
}

#[derive(Clone, Copy, ValueEnum)]
enum SnapshotKind {
    Trending,
    Top,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let service = StockcastService::from_config(config).context("failed to start service")?;

    match cli.command {
        Commands::Update { as_of, symbols } => run_update(&service, as_of, symbols),
        Commands::Add { symbol, name, icon } => {
            if symbol.trim().is_empty() {
                bail!("symbol must not be empty");
            }
            let added = service.add_symbol(&symbol, &name, &icon)?;
            print_json(&json!({ "symbol": symbol, "added": added }))
        }
        Commands::Top { days, n } => print_json(&service.query().get_top_stocks(days, n)?),
        Commands::FutureTop { months, n } => {
            print_json(&service.query().get_future_top_stocks(months, n)?)
        }
        Commands::Recommend { amount, months, n } => {
            print_json(&service.query().recommend_stocks(amount, months, n)?)
        }
        Commands::Stock { symbol } => print_json(&service.query().get_stock_data(&symbol)?),
        Commands::Portfolio { symbol } => {
            print_json(&service.query().get_stock_portfolio_summary(&symbol)?)
        }
        Commands::Snapshot => {
            let (trending, top) = service.snapshots().refresh()?;
            print_json(&json!({
                "dir": service.snapshots().dir(),
                "trendingStocks": trending.trending_stocks.len(),
                "topStocks": top.top_stocks.len(),
            }))
        }
        Commands::ShowSnapshot { kind } => match kind {
            SnapshotKind::Trending => print_json(&service.snapshots().read_trending()?),
            SnapshotKind::Top => print_json(&service.snapshots().read_top()?),
        },
        Commands::Daemon => run_daemon(service),
    }
}

fn load_config(cli: &Cli) -> Result<StockcastConfig> {
    let mut config = match &cli.config {
        Some(path) => StockcastConfig::from_file(path)?,
        None => StockcastConfig::default(),
    };
    if let Some(dir) = &cli.store_dir {
        config.paths.store_dir = dir.clone();
    }
    if let Some(dir) = &cli.snapshot_dir {
        config.paths.snapshot_dir = dir.clone();
    }
    Ok(config)
}

fn run_update(
    service: &StockcastService,
    as_of: Option<NaiveDate>,
    symbols: Vec<String>,
) -> Result<()> {
    let driver = service.driver();
    let report = match (as_of, symbols.is_empty()) {
        (None, true) => driver.run()?,
        (as_of, _) => {
            let as_of = as_of.unwrap_or_else(|| chrono::Local::now().date_naive());
            let universe = if symbols.is_empty() {
                service.query().load_universe()?.into_iter().map(|r| r.symbol).collect()
            } else {
                symbols
            };
            driver.run_batch(&universe, as_of)
        }
    };

    print_json(&report_json(&report))?;
    if report.failed() > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn report_json(report: &BatchReport) -> serde_json::Value {
    let outcomes: Vec<_> = report
        .outcomes
        .iter()
        .map(|o| match &o.status {
            SymbolStatus::Updated(s) => json!({
                "symbol": o.symbol,
                "status": "updated",
                "barsAppended": s.bars_appended,
                "horizonsRefreshed": s.horizons_refreshed,
                "forecastErrors": s.forecast_errors.iter().map(|e| e.to_string()).collect::<Vec<_>>(),
            }),
            SymbolStatus::Skipped => json!({ "symbol": o.symbol, "status": "skipped" }),
            SymbolStatus::Failed(err) => json!({
                "symbol": o.symbol,
                "status": "failed",
                "kind": err.kind(),
                "error": err.to_string(),
            }),
        })
        .collect();
    json!({
        "asOf": report.as_of,
        "updated": report.updated(),
        "skipped": report.skipped(),
        "failed": report.failed(),
        "cancelled": report.cancelled,
        "outcomes": outcomes,
    })
}

fn run_daemon(service: StockcastService) -> Result<()> {
    let service = Arc::new(service);
    let scheduler = service
        .start_daemon()
        .context("failed to start scheduler threads")?;

    let token = scheduler.token();
    ctrlc::set_handler(move || {
        info!("shutdown signal received, stopping after the current symbol");
        token.cancel();
    })
    .context("failed to install signal handler")?;
    info!(
        update_every_h = service.config().schedule.update_interval_hours,
        snapshot_every_h = service.config().schedule.snapshot_interval_hours,
        "daemon running"
    );
    scheduler.join();
    info!("daemon stopped");
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
