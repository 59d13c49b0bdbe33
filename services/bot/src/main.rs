//! Telegram bot serving ERA5 wind shear and turbulence charts.
//!
//! Polls the Telegram Bot API for chart commands, pulls ERA5
//! pressure-level fields from the Climate Data Store on demand,
//! computes shear and turbulence products, and replies with rendered
//! PNG maps. Also exposes an HTTP status API for monitoring.

mod cache;
mod commands;
mod config;
mod metrics;
mod pipeline;
mod provider;
mod server;
mod telegram;
mod tracker;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use cds_client::{CdsConfig, Client};
use era5_grid::LevelPair;
use shear_analysis::Thresholds;
use turb_common::{AvailabilityWindow, Product, TurbError};

use cache::FieldCache;
use commands::Command;
use config::BotConfig;
use metrics::BotMetrics;
use pipeline::{ChartOutcome, Pipeline, PipelineSettings};
use provider::CdsFieldProvider;
use server::ServerState;
use telegram::TelegramClient;
use tracker::RequestTracker;

/// How many finished requests the status API remembers.
const REPORT_HISTORY: usize = 50;

/// Sent before the pipeline starts; ERA5 retrievals take a while.
const PROGRESS_TEXT: &str = "Retrieving ERA5 meteorological data...";

/// Region used by /latest when none is given.
const DEFAULT_REGION: &str = "Europe";

#[derive(Parser, Debug)]
#[command(name = "turb-bot")]
#[command(about = "Telegram bot for ERA5 wind shear and turbulence charts")]
struct Args {
    /// Path to YAML configuration (defaults apply when omitted)
    #[arg(long, env = "BOT_CONFIG")]
    config: Option<PathBuf>,

    /// Directory for downloaded fields and rendered charts
    #[arg(long, env = "DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Port for status HTTP server
    #[arg(long, env = "STATUS_PORT", default_value = "8080")]
    status_port: u16,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Disable status HTTP server
    #[arg(long)]
    no_status_server: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting turbulence chart bot");

    let mut config = BotConfig::load(args.config.as_deref())?;
    if let Some(dir) = args.data_dir {
        config.data.data_dir = dir;
    }
    if config.telegram.token.is_empty() {
        bail!("no bot token configured; set TELEGRAM_BOT_TOKEN or telegram.token");
    }

    // Initialize Prometheus metrics exporter
    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")?;

    tokio::fs::create_dir_all(&config.data.data_dir)
        .await
        .with_context(|| format!("creating {}", config.data.data_dir.display()))?;

    // Analysis parameters are validated up front so a bad config fails
    // here, not on the first request.
    let levels = LevelPair::new(config.analysis.lower_hpa, config.analysis.upper_hpa)
        .context("analysis levels")?;
    let thresholds = Thresholds::new(
        config.analysis.thresholds.light,
        config.analysis.thresholds.moderate,
        config.analysis.thresholds.severe,
        config.analysis.thresholds.extreme,
    )
    .context("turbulence thresholds")?;
    let regions = config.region_registry()?;

    let mut cds_config = CdsConfig::from_env().context("CDS API credentials")?;
    cds_config.total_wait = Duration::from_secs(config.data.download_wait_secs);
    let cds = Client::new(cds_config)?;

    let provider = Arc::new(CdsFieldProvider::new(
        cds,
        config.data.data_dir.clone(),
        levels,
    ));
    let cache = Arc::new(FieldCache::new(config.data.cache_capacity));
    let bot_metrics = Arc::new(BotMetrics::new());
    let tracker = Arc::new(RequestTracker::new(REPORT_HISTORY));

    let pipeline = Arc::new(Pipeline::new(
        provider,
        cache.clone(),
        regions,
        AvailabilityWindow::new(config.data.latency_days),
        bot_metrics.clone(),
        tracker.clone(),
        PipelineSettings {
            thresholds,
            levels,
            panel_width: config.chart.panel_width,
            font_paths: config.chart.font_paths.clone(),
            charts_dir: config.data.data_dir.join("charts"),
            max_timeout_retries: config.pipeline.max_timeout_retries,
            retry_initial_delay: Duration::from_secs(config.pipeline.retry_initial_delay_secs),
        },
    ));

    let telegram = Arc::new(TelegramClient::new(
        &config.telegram.api_url,
        &config.telegram.token,
        config.telegram.poll_timeout_secs,
    )?);

    // Shutdown signal
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Start status server
    if !args.no_status_server {
        let server_state = Arc::new(ServerState {
            metrics: bot_metrics.clone(),
            tracker: tracker.clone(),
            cache: cache.clone(),
            started_at: Utc::now(),
        });
        let status_port = args.status_port;
        tokio::spawn(async move {
            if let Err(e) = server::run_server(server_state, prometheus_handle, status_port).await {
                error!(error = %e, "Status server failed");
            }
        });
    }

    // Handle Ctrl+C
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        shutdown_tx_clone.send(()).ok();
    });

    // getMe both checks the token and names the bot for mention parsing.
    let profile = telegram
        .get_me()
        .await
        .context("getMe failed; check TELEGRAM_BOT_TOKEN")?;
    info!(
        bot_id = profile.id,
        username = profile.username.as_deref().unwrap_or("<unset>"),
        "Connected to Telegram"
    );

    run_poll_loop(telegram, pipeline, profile.username, shutdown_tx.subscribe()).await
}

/// Long-poll getUpdates and dispatch each command on its own task.
async fn run_poll_loop(
    telegram: Arc<TelegramClient>,
    pipeline: Arc<Pipeline>,
    bot_username: Option<String>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let mut offset: i64 = 0;

    loop {
        let updates = tokio::select! {
            _ = shutdown.recv() => {
                info!("Shutting down poll loop");
                return Ok(());
            }
            result = telegram.get_updates(offset) => match result {
                Ok(updates) => updates,
                Err(e) => {
                    warn!(error = %e, "getUpdates failed, backing off");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    continue;
                }
            },
        };

        for update in updates {
            // Acknowledge every update, including ones we skip.
            offset = offset.max(update.update_id + 1);

            let Some(message) = update.message else {
                continue;
            };
            let Some(parsed) = message
                .text
                .as_deref()
                .and_then(|text| commands::parse(text, bot_username.as_deref()))
            else {
                continue;
            };

            // Group chats only answer when the bot is addressed by name.
            if !message.chat.is_private() && !parsed.mentioned {
                debug!(chat_id = message.chat.id, "Ignoring unaddressed group message");
                continue;
            }

            let telegram = telegram.clone();
            let pipeline = pipeline.clone();
            let chat_id = message.chat.id;
            tokio::spawn(async move {
                handle_command(&telegram, &pipeline, chat_id, parsed.command).await;
            });
        }
    }
}

/// Run one command and send whatever it produces.
async fn handle_command(
    telegram: &TelegramClient,
    pipeline: &Pipeline,
    chat_id: i64,
    command: Command,
) {
    match command {
        Command::Start => {
            let text = commands::start_text(&pipeline.region_names());
            reply(telegram, chat_id, &text).await;
        }
        Command::Help => {
            let text = commands::usage_text(&pipeline.region_names());
            reply(telegram, chat_id, &text).await;
        }
        Command::About => {
            reply(telegram, chat_id, commands::ABOUT_TEXT).await;
        }
        Command::Invalid { hint } => {
            reply(telegram, chat_id, &hint).await;
        }
        Command::Unknown => {
            reply(telegram, chat_id, "Unrecognized command. Try /help.").await;
        }
        Command::Chart {
            product,
            date,
            time,
            region,
        } => {
            reply(telegram, chat_id, PROGRESS_TEXT).await;
            let outcome = pipeline
                .handle_chart(chat_id, product, &date, &time, &region)
                .await;
            deliver(telegram, pipeline, chat_id, outcome).await;
        }
        Command::Latest { region } => {
            let region = region.unwrap_or_else(|| DEFAULT_REGION.to_string());
            reply(telegram, chat_id, PROGRESS_TEXT).await;

            // Both products for the newest archive time. Stop at the first
            // failure; the second chart would hit the same one.
            for product in [Product::Turbulence, Product::WindShear] {
                let outcome = pipeline.handle_latest(chat_id, product, &region).await;
                let failed = outcome.is_err();
                deliver(telegram, pipeline, chat_id, outcome).await;
                if failed {
                    break;
                }
            }
        }
    }
}

/// Send a finished chart, or the user-facing reason there is none.
async fn deliver(
    telegram: &TelegramClient,
    pipeline: &Pipeline,
    chat_id: i64,
    outcome: Result<ChartOutcome, TurbError>,
) {
    match outcome {
        Ok(chart) => {
            if let Some(path) = &chart.path {
                debug!(chat_id, path = %path.display(), "chart archived");
            }
            telegram.send_chat_action(chat_id, "upload_photo").await;
            if let Err(e) = telegram
                .send_photo(chat_id, chart.png, &chart.filename, &chart.caption)
                .await
            {
                warn!(chat_id, error = %e, "Chart upload failed");
                reply(
                    telegram,
                    chat_id,
                    "The chart was generated but could not be uploaded. Please try again.",
                )
                .await;
            }
        }
        Err(err) => {
            let text = err.user_message(&pipeline.region_names());
            reply(telegram, chat_id, &text).await;
        }
    }
}

/// Best-effort text reply; delivery problems are logged, not propagated.
async fn reply(telegram: &TelegramClient, chat_id: i64, text: &str) {
    if let Err(e) = telegram.send_message(chat_id, text).await {
        warn!(chat_id, error = %e, "Failed to send reply");
    }
}
