//! Movewatch Bot - Headless Server
//!
//! Polls exchange candles and alerts a Telegram chat about significant moves.

mod config;
mod scheduler;

use clap::Parser;
use config::{AppConfig, ConfigError, Credentials};
use scheduler::Scheduler;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use movewatch_alerts::{
    NotificationDispatcher, NotificationTransport, Notifier, NotifierConfig, TelegramBot,
};
use movewatch_engine::{
    DedupEngine, NotificationStateStore, SignificanceEvaluator, SimilarityComparator,
};
use movewatch_feeds::{BybitRestFetcher, CandleFetcher, MarketDataSource};

/// Movewatch Bot CLI
#[derive(Parser, Debug)]
#[command(name = "movewatch-bot")]
#[command(about = "Significant candle move alerts for Telegram", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config.json")]
    config: String,

    /// Log level: trace, debug, info, warn, error (overrides the config file)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Run a single pass and exit
    #[arg(long, default_value_t = false)]
    once: bool,
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn init_logging(level: &str) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(parse_level(level))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

fn build_notifier(
    config: &AppConfig,
    chat_id: i64,
    source: Arc<dyn MarketDataSource>,
    transport: Arc<dyn NotificationTransport>,
) -> Notifier {
    let engine = DedupEngine::new(
        config.dedup_config(),
        SimilarityComparator::new((&config.similarity).into()),
        Arc::new(NotificationStateStore::new()),
    );

    Notifier::new(
        NotifierConfig {
            chat_id,
            symbols: config.symbols.clone(),
        },
        CandleFetcher::new(source, config.fetcher_config()),
        SignificanceEvaluator::new(config.significance_config()),
        engine,
        NotificationDispatcher::new(transport, config.edit_previous),
    )
}

fn load_settings(args: &Args) -> Result<(AppConfig, Credentials), ConfigError> {
    let config = AppConfig::load(&args.config)?;
    let credentials = Credentials::from_env()?;
    Ok((config, credentials))
}

#[tokio::main]
async fn main() {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let (config, credentials) = match load_settings(&args) {
        Ok(settings) => settings,
        Err(e) => {
            init_logging(args.log_level.as_deref().unwrap_or("info"));
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(args.log_level.as_deref().unwrap_or(&config.log_level));

    info!("🚀 Movewatch Bot starting...");
    info!("  Config: {}", args.config);
    info!("  Timeframe: {}", config.timeframe);
    info!("  Threshold: {}%", config.min_percent_change);
    info!("  Poll Interval: {}s", config.poll_interval_secs);
    info!("  Cooldown: {}s", config.min_message_interval_secs);
    for symbol in &config.symbols {
        info!("    - {} ({})", symbol.name, symbol.instrument);
    }

    let source = match BybitRestFetcher::new(config.request_timeout()) {
        Ok(fetcher) => Arc::new(fetcher),
        Err(e) => {
            error!("Failed to create market data client: {}", e);
            std::process::exit(1);
        }
    };

    let bot = Arc::new(TelegramBot::new(&credentials.bot_token));
    let notifier = Arc::new(build_notifier(
        &config,
        credentials.chat_id,
        source,
        bot.clone(),
    ));

    let scheduler = Scheduler::new(
        notifier.clone(),
        config.first_poll_delay(),
        config.poll_interval(),
    );

    if args.once {
        let report = scheduler.run_once().await;
        info!(
            notified = report.notified,
            suppressed = report.suppressed,
            quiet = report.quiet,
            failed = report.failed,
            "👋 Single pass finished"
        );
        return;
    }

    if let Err(e) = notifier.announce_startup().await {
        warn!("Failed to send startup message: {}", e);
    }

    let scheduler_handle = tokio::spawn(scheduler.run());

    let bot_notifier = notifier.clone();
    let bot_handle = tokio::spawn(async move {
        bot.run(bot_notifier).await;
    });

    // Handle shutdown
    info!("Press Ctrl+C to stop...");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
    }

    warn!("Shutdown signal received");

    // Both tasks loop until aborted
    scheduler_handle.abort();
    bot_handle.abort();
    let _ = tokio::time::timeout(Duration::from_secs(2), scheduler_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(2), bot_handle).await;

    info!(
        "  Symbols alerted: {}",
        notifier.engine().store().len()
    );
    info!("👋 Movewatch Bot stopped");
}
