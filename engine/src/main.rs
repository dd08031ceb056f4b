// Engine entry point: live scheduler or one-off backtest replay.
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use engine::activity::{ActivityLog, CompositeActivityLog, TracingActivityLog};
use engine::config::EngineSettings;
use engine::data::csv_parser::CandleCsvParser;
use engine::persistence::{InMemoryRepository, TradeRepository};
use engine::services::backtest::trailing_window;
use engine::services::{Account, CycleScheduler, SchedulerHandle};
use shared::models::{Interval, TradeConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "engine", about = "Market signal and trade lifecycle engine")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the per-account tick scheduler until Ctrl-C.
    Run {
        /// Path to a TOML settings file.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Replay a CSV of candles and print the resulting run as JSON.
    Backtest {
        /// CSV file with a `timestamp,open,high,low,close,volume` header.
        #[arg(long)]
        csv: PathBuf,

        #[arg(long)]
        symbol: String,

        /// 5m, 15m, 30m, 1h, 4h or 1d.
        #[arg(long, default_value = "1h")]
        interval: Interval,

        /// Minimum signal confidence, overriding the settings file.
        #[arg(long)]
        threshold: Option<f64>,

        /// Replay only the trailing N candles.
        #[arg(long)]
        limit: Option<usize>,

        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match cli.command {
        Commands::Run { config } => run(load_settings(config.as_deref())?).await,
        Commands::Backtest { csv, symbol, interval, threshold, limit, config } => {
            backtest(load_settings(config.as_deref())?, &csv, &symbol, interval, threshold, limit).await
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn load_settings(path: Option<&Path>) -> Result<EngineSettings> {
    match path {
        Some(path) => EngineSettings::from_file(path).with_context(|| format!("loading settings from {}", path.display())),
        None => Ok(EngineSettings::default()),
    }
}

async fn run(settings: EngineSettings) -> Result<()> {
    if settings.accounts.is_empty() {
        bail!("no accounts configured; add at least one [[accounts]] entry");
    }
    info!(
        pairs = settings.pairs.len(),
        accounts = settings.accounts.len(),
        tick_interval_secs = settings.tick_interval_secs,
        "Starting engine"
    );

    let repository = Arc::new(InMemoryRepository::new());
    let activity: Arc<dyn ActivityLog> =
        Arc::new(CompositeActivityLog::default().with(Arc::new(TracingActivityLog)).with(repository.clone()));
    let market = settings.market_source()?;
    let predictor = settings.predictor(market.clone());
    info!(predictor = predictor.name(), "Predictor ready");

    let scheduler = Arc::new(CycleScheduler::new(
        settings.pairs.clone(),
        predictor,
        market,
        repository.clone(),
        activity,
        settings.risk_gate(),
        settings.fetch_timeout(),
    ));
    let accounts: Vec<Arc<Account>> = settings
        .accounts
        .iter()
        .map(|a| Arc::new(Account::new(a.id, a.trade_config.clone(), a.balance)))
        .collect();

    let handle = SchedulerHandle::start(scheduler, accounts, settings.tick_interval());
    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    info!("Shutdown requested");
    handle.shutdown().await;

    for account in &settings.accounts {
        let stats = repository.get_trade_statistics(account.id).await?;
        info!(
            account_id = account.id,
            total_trades = stats.total_trades,
            win_rate = stats.win_rate,
            total_profit = stats.total_profit,
            open_trades = stats.open_trades,
            "Session summary"
        );
    }
    Ok(())
}

async fn backtest(
    settings: EngineSettings,
    csv: &Path,
    symbol: &str,
    interval: Interval,
    threshold: Option<f64>,
    limit: Option<usize>,
) -> Result<()> {
    let candles = CandleCsvParser::load_candles_from_csv(csv)?;
    let window = trailing_window(&candles, limit);

    let mut config: TradeConfig = settings.accounts.first().map(|a| a.trade_config.clone()).unwrap_or_default();
    if let Some(threshold) = threshold {
        config.confidence_threshold = threshold;
    }
    config.validate().map_err(anyhow::Error::msg)?;

    let repository = InMemoryRepository::new();
    let report = settings
        .backtest_runner()
        .run_and_save(symbol, interval, window, &config, &repository)
        .await?;
    println!("{}", serde_json::to_string_pretty(&report.run)?);
    Ok(())
}
