//! Small-foreign futures positioning signal
//!
//! Pulls the exchange's institutional-investor and large-trader open interest
//! for the latest published session, derives the residual "small foreign"
//! position per index future, appends it to a CSV history and sends a short
//! report to a chat.

mod config;
mod error;
mod locate;
mod metrics;
mod models;
mod notify;
mod pipeline;
mod probe;
mod report;
mod sources;
mod store;

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::config::AppConfig;
use crate::notify::{LogNotifier, Notifier, TelegramNotifier};
use crate::pipeline::Pipeline;
use crate::report::RunOutcome;
use crate::store::HistoryStore;

/// Daily small-foreign futures report.
#[derive(Parser)]
#[command(name = "smallfx")]
#[command(about = "Derive the small-foreign futures signal from exchange open interest", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, env = "SMALLFX_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one acquisition cycle (default)
    Run {
        /// Start the backward search at this date instead of today (YYYY-MM-DD)
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// Skip history writes and chat delivery; print the report instead
        #[arg(long)]
        dry_run: bool,

        /// Override the configured lookback window in days
        #[arg(long)]
        lookback: Option<u32>,
    },

    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    let command = cli.command.unwrap_or(Commands::Run {
        date: None,
        dry_run: false,
        lookback: None,
    });

    match command {
        Commands::Run {
            date,
            dry_run,
            lookback,
        } => {
            if let Some(days) = lookback {
                config.lookback_days = days;
                config.validate()?;
            }

            let start = date.unwrap_or_else(probe::exchange_today);
            let pipeline = Pipeline::from_config(&config, dry_run)?;

            if dry_run {
                info!(start = %start, "Dry run: history and chat delivery disabled");
                let report = pipeline.run_once(start).await;
                println!("{}", report.render());
                return Ok(());
            }

            let notifier: Box<dyn Notifier> = match &config.telegram {
                Some(tg) => Box::new(TelegramNotifier::new(
                    config.endpoints.telegram_base.clone(),
                    tg.token.clone(),
                    tg.chat_id.clone(),
                    config.request_timeout(),
                )?),
                None => Box::new(LogNotifier),
            };

            let report = pipeline.run_and_notify(start, notifier.as_ref()).await;
            match &report.outcome {
                RunOutcome::Completed {
                    session, source, ..
                } => info!(
                    session = %session,
                    derived = report.metrics().len(),
                    institutional = %source.institutional,
                    large_trader = %source.large_trader,
                    "Run finished"
                ),
                RunOutcome::AcquisitionFailed(e) => {
                    warn!(error = %e, "Run finished without a session")
                }
            }
        }

        Commands::Config => {
            let json = serde_json::to_string_pretty(&config.redacted())
                .context("Failed to serialize configuration")?;
            println!("{json}");

            let store = HistoryStore::new(config.history_path.clone(), config.partition);
            println!("\n=== History ===");
            for symbol in &config.symbols {
                println!("{:<12} {}", symbol.label, store.path_for(symbol).display());
            }
            match store.row_count(&config.symbols) {
                Ok(rows) => println!("Rows: {rows}"),
                Err(e) => println!("Rows: unreadable ({e})"),
            }
            println!(
                "Notifier: {}",
                if config.telegram.is_some() { "telegram" } else { "log only" }
            );
        }
    }

    Ok(())
}
