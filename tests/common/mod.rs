#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use artbot::access::QuotaPolicy;
use artbot::bot::{BotSettings, ChatBot};
use artbot::db;
use artbot::imagegen::{GenerateError, ImageGenerator};
use artbot::model::{IncomingMessage, IncomingUpdate, Keyboard};
use artbot::poller::UpdateHandler;
use artbot::router::Router;
use artbot::telegram::{Messenger, UpdateSource};

pub const ADMIN: i64 = 999;

pub async fn setup_pool() -> sqlx::SqlitePool {
    let pool = db::init_pool("sqlite::memory:").await.unwrap();
    db::run_migrations(&pool).await.unwrap();
    pool
}

pub fn msg(chat_id: i64, message_id: i64, text: &str) -> IncomingMessage {
    IncomingMessage {
        chat_id,
        message_id,
        text: text.to_string(),
    }
}

pub fn update(update_id: i64, chat_id: i64, message_id: i64, text: &str) -> IncomingUpdate {
    IncomingUpdate {
        update_id,
        message: Some(msg(chat_id, message_id, text)),
    }
}

pub fn bare_update(update_id: i64) -> IncomingUpdate {
    IncomingUpdate {
        update_id,
        message: None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text {
        chat_id: i64,
        text: String,
        keyboard: Option<Keyboard>,
    },
    Photo {
        chat_id: i64,
        caption: String,
    },
}

#[derive(Clone, Default)]
pub struct RecordingMessenger {
    sent: Arc<Mutex<Vec<Sent>>>,
}

impl RecordingMessenger {
    pub async fn sent(&self) -> Vec<Sent> {
        self.sent.lock().await.clone()
    }

    pub async fn texts(&self, chat_id: i64) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .filter_map(|s| match s {
                Sent::Text { chat_id: c, text, .. } if *c == chat_id => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn last_text(&self, chat_id: i64) -> Option<(String, Option<Keyboard>)> {
        self.sent
            .lock()
            .await
            .iter()
            .rev()
            .find_map(|s| match s {
                Sent::Text {
                    chat_id: c,
                    text,
                    keyboard,
                } if *c == chat_id => Some((text.clone(), *keyboard)),
                _ => None,
            })
    }

    pub async fn clear(&self) {
        self.sent.lock().await.clear();
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(&self, chat_id: i64, text: &str, keyboard: Option<Keyboard>) -> Result<()> {
        self.sent.lock().await.push(Sent::Text {
            chat_id,
            text: text.to_string(),
            keyboard,
        });
        Ok(())
    }

    async fn send_photo(&self, chat_id: i64, path: &Path, caption: &str) -> Result<()> {
        if !path.exists() {
            return Err(anyhow!("photo file missing: {}", path.display()));
        }
        self.sent.lock().await.push(Sent::Photo {
            chat_id,
            caption: caption.to_string(),
        });
        Ok(())
    }
}

/// Every send fails, like a Telegram outage.
#[derive(Clone, Default)]
pub struct FailingMessenger;

#[async_trait]
impl Messenger for FailingMessenger {
    async fn send_text(&self, _chat_id: i64, _text: &str, _kb: Option<Keyboard>) -> Result<()> {
        Err(anyhow!("network down"))
    }

    async fn send_photo(&self, _chat_id: i64, _path: &Path, _caption: &str) -> Result<()> {
        Err(anyhow!("network down"))
    }
}

#[derive(Clone)]
pub struct FakeGenerator {
    calls: Arc<Mutex<Vec<String>>>,
    image: Option<Vec<u8>>,
}

impl FakeGenerator {
    pub fn succeeding() -> Self {
        Self {
            calls: Arc::default(),
            image: Some(vec![0x89; 4096]),
        }
    }

    pub fn failing() -> Self {
        Self {
            calls: Arc::default(),
            image: None,
        }
    }

    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl ImageGenerator for FakeGenerator {
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>, GenerateError> {
        self.calls.lock().await.push(prompt.to_string());
        self.image.clone().ok_or(GenerateError::TooSmall(0))
    }
}

/// Replays queued batches and records the offsets it was asked for.
#[derive(Clone, Default)]
pub struct ScriptedSource {
    batches: Arc<Mutex<VecDeque<Result<Vec<IncomingUpdate>>>>>,
    offsets: Arc<Mutex<Vec<i64>>>,
}

impl ScriptedSource {
    pub fn with_batches(batches: Vec<Result<Vec<IncomingUpdate>>>) -> Self {
        Self {
            batches: Arc::new(Mutex::new(VecDeque::from(batches))),
            ..Default::default()
        }
    }

    pub async fn offsets(&self) -> Vec<i64> {
        self.offsets.lock().await.clone()
    }
}

#[async_trait]
impl UpdateSource for ScriptedSource {
    async fn fetch(&self, offset: i64, timeout: Duration) -> Result<Vec<IncomingUpdate>> {
        self.offsets.lock().await.push(offset);
        let next = self.batches.lock().await.pop_front();
        match next {
            Some(batch) => batch,
            None => {
                // Behave like an idle long poll.
                tokio::time::sleep(timeout.min(Duration::from_millis(10))).await;
                Ok(Vec::new())
            }
        }
    }
}

/// Records routed messages; fails on the configured message id.
#[derive(Default)]
pub struct RecordingHandler {
    pub seen: Vec<IncomingMessage>,
    pub fail_on: Option<i64>,
}

#[async_trait]
impl UpdateHandler for RecordingHandler {
    async fn handle(&mut self, msg: &IncomingMessage) -> Result<()> {
        self.seen.push(msg.clone());
        if self.fail_on == Some(msg.message_id) {
            return Err(anyhow!("handler blew up"));
        }
        Ok(())
    }
}

pub fn settings(images_dir: &Path) -> BotSettings {
    BotSettings {
        policy: QuotaPolicy {
            admin_chat_id: ADMIN,
            daily_limit: 10,
            admin_limit: 999,
        },
        router: Router::new(ADMIN, 10, 3),
        images_dir: images_dir.to_path_buf(),
    }
}

pub fn chat_bot(
    pool: &sqlx::SqlitePool,
    messenger: Arc<dyn Messenger>,
    generator: &FakeGenerator,
    images_dir: &Path,
) -> ChatBot {
    ChatBot::new(
        pool.clone(),
        messenger,
        Arc::new(generator.clone()),
        settings(images_dir),
    )
}

/// Register `chat_id` with `email` for today and bump its counter `count` times.
pub async fn register(pool: &sqlx::SqlitePool, chat_id: i64, email: &str, count: u32) {
    let today = chrono::Local::now().date_naive();
    db::create_profile(pool, chat_id, email, chrono::Utc::now(), today)
        .await
        .unwrap();
    for _ in 0..count {
        db::increment_count(pool, chat_id).await.unwrap();
    }
}
