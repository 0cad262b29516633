//! Configuration loader and validator for the image bot.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub telegram: Telegram,
    #[serde(default)]
    pub quota: Quota,
    #[serde(default)]
    pub generator: Generator,
}

/// App-level settings: storage location and poll loop tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_seconds: u32,
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_seconds: u64,
    #[serde(default = "default_true")]
    pub persist_processed: bool,
    /// Age after which processed keys are swept. 0 keeps them forever.
    #[serde(default)]
    pub processed_retention_days: u32,
}

/// Telegram bot settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Telegram {
    pub bot_token: String,
    /// Chat that is always authorized and never runs out of quota.
    pub admin_chat_id: i64,
}

/// Daily generation limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Quota {
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,
    #[serde(default = "default_admin_limit")]
    pub admin_limit: u32,
    #[serde(default = "default_min_prompt_chars")]
    pub min_prompt_chars: usize,
}

/// Text-to-image endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Generator {
    #[serde(default = "default_generator_url")]
    pub base_url: String,
    #[serde(default = "default_generator_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_min_image_bytes")]
    pub min_image_bytes: usize,
}

fn default_poll_timeout() -> u32 {
    30
}

fn default_retry_backoff() -> u64 {
    2000
}

fn default_max_backoff() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_daily_limit() -> u32 {
    10
}

fn default_admin_limit() -> u32 {
    999
}

fn default_min_prompt_chars() -> usize {
    3
}

fn default_generator_url() -> String {
    "https://image.pollinations.ai/prompt/".to_string()
}

fn default_generator_timeout() -> u64 {
    120
}

fn default_min_image_bytes() -> usize {
    1000
}

impl Default for Quota {
    fn default() -> Self {
        Self {
            daily_limit: default_daily_limit(),
            admin_limit: default_admin_limit(),
            min_prompt_chars: default_min_prompt_chars(),
        }
    }
}

impl Default for Generator {
    fn default() -> Self {
        Self {
            base_url: default_generator_url(),
            timeout_seconds: default_generator_timeout(),
            min_image_bytes: default_min_image_bytes(),
        }
    }
}

impl App {
    /// Data directory with a leading `~/` expanded against `$HOME`.
    pub fn resolved_data_dir(&self) -> String {
        if let Some(rest) = self.data_dir.strip_prefix("~/") {
            if let Ok(home) = std::env::var("HOME") {
                return format!("{}/{}", home.trim_end_matches('/'), rest);
            }
        }
        self.data_dir.clone()
    }

    pub fn images_dir(&self) -> PathBuf {
        Path::new(&self.resolved_data_dir()).join("images")
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_seconds as u64)
    }
}

impl Config {
    /// Ensure required directories exist (`app.data_dir` and its `images/`).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(self.app.images_dir())
    }

    /// SQLite URL for the bot database. `DATABASE_URL` wins when set.
    pub fn database_url(&self) -> String {
        std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| format!("sqlite://{}/artbot.db", self.app.resolved_data_dir()))
    }
}

/// Load configuration from a YAML file, apply environment overrides and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
/// - `TELEGRAM_TOKEN` replaces `telegram.bot_token` when set and non-empty.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let mut cfg: Config = serde_yaml::from_str(&content)?;
    if let Ok(token) = std::env::var("TELEGRAM_TOKEN") {
        if !token.trim().is_empty() {
            cfg.telegram.bot_token = token;
        }
    }
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.app.poll_timeout_seconds == 0 {
        return Err(ConfigError::Invalid("app.poll_timeout_seconds must be > 0"));
    }
    if cfg.app.retry_backoff_ms == 0 {
        return Err(ConfigError::Invalid("app.retry_backoff_ms must be > 0"));
    }

    let token = cfg.telegram.bot_token.trim();
    if token.is_empty() || token == "YOUR_TELEGRAM_BOT_TOKEN" {
        return Err(ConfigError::Invalid("telegram.bot_token must be set"));
    }

    if cfg.quota.daily_limit == 0 {
        return Err(ConfigError::Invalid("quota.daily_limit must be > 0"));
    }
    if cfg.quota.min_prompt_chars == 0 {
        return Err(ConfigError::Invalid("quota.min_prompt_chars must be > 0"));
    }

    let base = cfg.generator.base_url.trim();
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        return Err(ConfigError::Invalid("generator.base_url must be an http(s) URL"));
    }
    if cfg.generator.timeout_seconds == 0 {
        return Err(ConfigError::Invalid("generator.timeout_seconds must be > 0"));
    }

    Ok(())
}

/// Returns the example YAML content shipped with the bot.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  poll_timeout_seconds: 30
  retry_backoff_ms: 2000
  max_backoff_seconds: 60
  persist_processed: true
  processed_retention_days: 30

telegram:
  bot_token: "123456:TEST-TOKEN"
  admin_chat_id: 552195777

quota:
  daily_limit: 10
  admin_limit: 999
  min_prompt_chars: 3

generator:
  base_url: "https://image.pollinations.ai/prompt/"
  timeout_seconds: 120
  min_image_bytes: 1000
"#
}
