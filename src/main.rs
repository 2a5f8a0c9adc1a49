//! # Trimbot - Video Trimming Chat Bot
//!
//! Trims every video an admin sends to the configured time range and sends
//! it back, with an optional custom caption and thumbnail.
//!
//! ## Usage
//!
//! ```bash
//! # Configuration comes from flags, the environment or a .env file
//! BOT_TOKEN=123:abc ADMINS=1111,2222 trimbot
//!
//! # Same, with a custom scratch directory and a per-phase timeout
//! trimbot --download-dir /tmp/trimbot --phase-timeout-secs 1800
//!
//! # Videos over 20 MB need a self-hosted Bot API server
//! BOT_API_URL=http://localhost:8081 trimbot
//! ```
//!
//! Chat commands: `/start`, `/help`, `/set_time <start> [end]`,
//! `/set_caption [text]`, `/set_thumbnail` (as a reply to a photo) and
//! `/cancel <token>`.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trimbot::commands::CommandHandler;
use trimbot::config::Config;
use trimbot::health;
use trimbot::queue::JobQueue;
use trimbot::registry::TaskRegistry;
use trimbot::settings::{Settings, SettingsStore};
use trimbot::telegram::{self, TelegramChat};
use trimbot::worker::Worker;

/// Trimbot - trims videos sent over chat
#[derive(Parser)]
#[command(
    name = "trimbot",
    about = "A chat bot that trims uploaded videos with ffmpeg",
    long_about = "Queues videos sent by admins, cuts the configured time range out of each one without re-encoding and replies with the result.",
    version
)]
struct Cli {
    #[command(flatten)]
    config: Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trimbot=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli.config).await {
        error!("Bot failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

async fn run(config: Config) -> Result<()> {
    if config.admins.is_empty() {
        warn!("ADMINS is empty, every request will be refused");
    }
    if config.phase_timeout().is_none() {
        info!("No phase timeout configured, a stalled transfer blocks the queue");
    }
    tokio::fs::create_dir_all(&config.download_dir).await?;

    let settings = SettingsStore::new(Settings::new(config.default_start_time.clone()));
    let registry = TaskRegistry::new();
    let (queue, consumer) = JobQueue::unbounded();

    let chat = Arc::new(TelegramChat::from_config(&config));
    let limits = chat.limits();
    info!(
        "Transfer limits: {} MB down, {} MB up",
        limits.download / (1024 * 1024),
        limits.upload / (1024 * 1024)
    );

    let worker = Worker::new(chat.clone(), settings.clone(), registry.clone(), &config);
    tokio::spawn(async move { worker.run(consumer).await });

    let port = config.port;
    tokio::spawn(async move {
        if let Err(e) = health::serve(port).await {
            error!("Liveness endpoint stopped: {}", e);
        }
    });

    let handler = CommandHandler::new(settings, registry, queue, config.admins.clone());
    info!("✅ Bot has started successfully!");
    telegram::run(chat.bot().clone(), chat, handler).await;

    info!("Bot is shutting down...");
    Ok(())
}
