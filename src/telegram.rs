//! Telegram Bot API plumbing: the long-poll update source and the message sender.
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fmt::Debug;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::{
    AllowedUpdate, InputFile, KeyboardButton, KeyboardMarkup, ParseMode, ReplyMarkup, UpdateKind,
};
use teloxide::utils::command::BotCommands;
use tracing::{debug, info, warn};

use crate::model::{IncomingMessage, IncomingUpdate, Keyboard};
use crate::router::Command;

const PHOTO_ATTEMPTS: usize = 3;
const PHOTO_RETRY_PAUSE: Duration = Duration::from_secs(1);

/// Long-poll endpoint returning updates with id >= `offset`.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    async fn fetch(&self, offset: i64, timeout: Duration) -> Result<Vec<IncomingUpdate>>;
}

/// Outbound messages. Callers log failures and move on.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str, keyboard: Option<Keyboard>) -> Result<()>;

    async fn send_photo(&self, chat_id: i64, path: &Path, caption: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    /// The HTTP timeout must outlast the long-poll timeout, or every idle poll
    /// would surface as a transport error.
    pub fn new(token: &str, poll_timeout: Duration) -> Result<Self> {
        let http = teloxide::net::default_reqwest_settings()
            .timeout(poll_timeout + Duration::from_secs(10))
            .build()
            .context("failed to build telegram http client")?;
        Ok(Self {
            bot: Bot::with_client(token, http),
        })
    }

    /// Publish the slash command list shown in the client's menu.
    pub async fn register_commands(&self) -> Result<()> {
        self.bot
            .set_my_commands(Command::bot_commands())
            .await
            .context("setMyCommands failed")?;
        info!("bot commands registered");
        Ok(())
    }
}

/// Runs `op` up to `attempts` times, sleeping `pause` between failures.
/// The last error is returned when every attempt fails.
async fn with_retries<T, E, F, Fut>(attempts: usize, pause: Duration, mut op: F) -> Result<T, E>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Debug,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < attempts => {
                warn!(?err, attempt, "attempt failed, retrying");
                tokio::time::sleep(pause).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

fn keyboard_markup(keyboard: Keyboard) -> KeyboardMarkup {
    let rows = keyboard
        .rows()
        .into_iter()
        .map(|row| row.into_iter().map(KeyboardButton::new).collect::<Vec<_>>())
        .collect::<Vec<_>>();
    KeyboardMarkup::new(rows).resize_keyboard(true)
}

/// Keep only what routing needs; anything without non-empty text has no message.
pub fn to_incoming(update: Update) -> IncomingUpdate {
    let update_id = i64::from(update.id);
    let message = match update.kind {
        UpdateKind::Message(msg) => msg.text().map(str::trim).filter(|t| !t.is_empty()).map(
            |text| IncomingMessage {
                chat_id: msg.chat.id.0,
                message_id: i64::from(msg.id.0),
                text: text.to_string(),
            },
        ),
        _ => None,
    };
    IncomingUpdate { update_id, message }
}

#[async_trait]
impl UpdateSource for TelegramClient {
    async fn fetch(&self, offset: i64, timeout: Duration) -> Result<Vec<IncomingUpdate>> {
        let offset = i32::try_from(offset).context("update offset out of range")?;
        let secs = u32::try_from(timeout.as_secs()).unwrap_or(u32::MAX);
        let updates = self
            .bot
            .get_updates()
            .offset(offset)
            .timeout(secs)
            .allowed_updates(vec![AllowedUpdate::Message])
            .await
            .context("getUpdates failed")?;
        debug!(count = updates.len(), offset, "fetched updates");
        Ok(updates.into_iter().map(to_incoming).collect())
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send_text(&self, chat_id: i64, text: &str, keyboard: Option<Keyboard>) -> Result<()> {
        let mut req = self
            .bot
            .send_message(ChatId(chat_id), text)
            .parse_mode(ParseMode::Html);
        if let Some(keyboard) = keyboard {
            req = req.reply_markup(ReplyMarkup::Keyboard(keyboard_markup(keyboard)));
        }
        req.await.context("sendMessage failed")?;
        Ok(())
    }

    async fn send_photo(&self, chat_id: i64, path: &Path, caption: &str) -> Result<()> {
        let bot = &self.bot;
        with_retries(PHOTO_ATTEMPTS, PHOTO_RETRY_PAUSE, move |attempt| async move {
            debug!(chat_id, attempt, "sending photo");
            bot.send_photo(ChatId(chat_id), InputFile::file(path.to_path_buf()))
                .caption(caption)
                .parse_mode(ParseMode::Html)
                .await
        })
        .await
        .context("sendPhoto failed after retries")?;
        Ok(())
    }
}
