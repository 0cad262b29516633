use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use artbot::bot::{BotSettings, ChatBot};
use artbot::config;
use artbot::db;
use artbot::imagegen::HttpImageGenerator;
use artbot::poller::{self, PollSettings};
use artbot::telegram::TelegramClient;
use artbot::tracker::UpdateTracker;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let database_url = cfg.database_url();
    let pool = db::init_pool(&database_url).await?;
    db::run_migrations(&pool).await?;

    let telegram = Arc::new(TelegramClient::new(
        &cfg.telegram.bot_token,
        cfg.app.poll_timeout(),
    )?);
    if let Err(err) = telegram.register_commands().await {
        warn!(?err, "failed to register bot commands");
    }

    let generator = Arc::new(
        HttpImageGenerator::from_config(&cfg.generator).context("invalid generator config")?,
    );
    let mut tracker = UpdateTracker::load(pool.clone(), cfg.app.persist_processed).await?;
    let mut bot = ChatBot::new(
        pool,
        telegram.clone(),
        generator,
        BotSettings::from_config(&cfg),
    );

    info!(
        database_url = %database_url,
        admin_chat_id = cfg.telegram.admin_chat_id,
        "starting image bot"
    );
    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(?err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        info!("ctrl-c received; shutting down");
    };
    poller::run(
        telegram.as_ref(),
        &mut tracker,
        &mut bot,
        PollSettings::from_config(&cfg),
        shutdown,
    )
    .await;

    Ok(())
}
