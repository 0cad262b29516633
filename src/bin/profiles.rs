use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use artbot::config;
use artbot::db;

#[derive(Debug, Parser)]
#[command(author, version, about = "Inspect and manage registered chats")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Print every profile as one JSON object per line
    List,
    /// Print one profile as pretty JSON
    Show { chat_id: i64 },
    /// Remove a profile; the chat has to register again
    Delete { chat_id: i64 },
    /// Print the stored long-poll offset and the processed key count
    Cursor,
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
    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;

    match args.cmd {
        Cmd::List => {
            for profile in db::list_profiles(&pool).await? {
                println!("{}", serde_json::to_string(&profile)?);
            }
        }
        Cmd::Show { chat_id } => {
            let profile = db::get_profile(&pool, chat_id)
                .await?
                .ok_or_else(|| anyhow!("no profile for chat {}", chat_id))?;
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
        Cmd::Delete { chat_id } => {
            if db::delete_profile(&pool, chat_id).await? {
                println!("deleted profile for chat {}", chat_id);
            } else {
                return Err(anyhow!("no profile for chat {}", chat_id));
            }
        }
        Cmd::Cursor => {
            let offset = db::load_cursor(&pool).await?;
            let processed = db::count_processed(&pool).await?;
            println!("next_offset: {}", offset);
            println!("processed keys: {}", processed);
        }
    }
    Ok(())
}
