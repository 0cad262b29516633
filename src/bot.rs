//! Executes routed actions for one chat: replies, registrations and image generation.
use anyhow::Result;
use async_trait::async_trait;
use chrono::{Local, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::access::{self, ChatFacts, QuotaPolicy};
use crate::config::Config;
use crate::db::{self, CreateOutcome, Pool};
use crate::imagegen::ImageGenerator;
use crate::model::{IncomingMessage, Keyboard};
use crate::poller::UpdateHandler;
use crate::router::{Action, Router};
use crate::session::{Mode, SessionManager};
use crate::telegram::Messenger;
use crate::texts;

#[derive(Debug, Clone)]
pub struct BotSettings {
    pub policy: QuotaPolicy,
    pub router: Router,
    pub images_dir: PathBuf,
}

impl BotSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            policy: QuotaPolicy::from_config(cfg),
            router: Router::new(
                cfg.telegram.admin_chat_id,
                cfg.quota.daily_limit,
                cfg.quota.min_prompt_chars,
            ),
            images_dir: cfg.app.images_dir(),
        }
    }
}

pub struct ChatBot {
    pool: Pool,
    messenger: Arc<dyn Messenger>,
    generator: Arc<dyn ImageGenerator>,
    settings: BotSettings,
    sessions: SessionManager,
}

impl ChatBot {
    pub fn new(
        pool: Pool,
        messenger: Arc<dyn Messenger>,
        generator: Arc<dyn ImageGenerator>,
        settings: BotSettings,
    ) -> Self {
        Self {
            pool,
            messenger,
            generator,
            settings,
            sessions: SessionManager::new(),
        }
    }

    pub fn mode(&self, chat_id: i64) -> Mode {
        self.sessions.mode(chat_id)
    }

    async fn facts(&self, chat_id: i64) -> Result<ChatFacts> {
        let today = Local::now().date_naive();
        access::load_facts(&self.pool, &self.settings.policy, chat_id, today).await
    }

    /// Best-effort send: a failed notification is logged, never propagated.
    async fn send(&self, chat_id: i64, text: &str, keyboard: Option<Keyboard>) {
        if let Err(err) = self.messenger.send_text(chat_id, text, keyboard).await {
            warn!(?err, chat_id, "failed to send message");
        }
    }

    async fn perform(&self, msg: &IncomingMessage, action: Action, facts: &ChatFacts) {
        let chat_id = msg.chat_id;
        match action {
            Action::Reply { text, keyboard } => self.send(chat_id, &text, keyboard).await,
            Action::Register { email } => self.register(chat_id, &email).await,
            Action::Generate { prompt } => self.generate(msg, &prompt, facts).await,
        }
    }

    async fn register(&self, chat_id: i64, email: &str) {
        let now = Utc::now();
        let today = Local::now().date_naive();
        match db::create_profile(&self.pool, chat_id, email, now, today).await {
            Ok(CreateOutcome::Created) | Ok(CreateOutcome::Updated) => {
                info!(chat_id, "chat registered");
                self.send(chat_id, &texts::registered(email), Some(Keyboard::MainMenu))
                    .await;
            }
            Ok(CreateOutcome::EmailTaken) => {
                info!(chat_id, "email already registered by another chat");
                self.send(chat_id, texts::EMAIL_TAKEN, None).await;
            }
            Err(err) => {
                error!(?err, chat_id, "failed to save profile");
                self.send(chat_id, texts::SAVE_FAILED, None).await;
            }
        }
    }

    async fn generate(&self, msg: &IncomingMessage, prompt: &str, facts: &ChatFacts) {
        let chat_id = msg.chat_id;
        self.send(chat_id, &texts::generating(prompt), None).await;

        let image = match self.generator.generate(prompt).await {
            Ok(image) => image,
            Err(err) => {
                warn!(%err, chat_id, "image generation failed");
                self.send(chat_id, texts::GENERATION_FAILED, None).await;
                return;
            }
        };

        let path = match self.store_image(msg, &image).await {
            Ok(path) => path,
            Err(err) => {
                error!(?err, chat_id, "failed to store generated image");
                self.send(chat_id, texts::SAVE_FAILED, None).await;
                return;
            }
        };

        if !facts.is_admin {
            if let Err(err) = db::increment_count(&self.pool, chat_id).await {
                error!(?err, chat_id, "failed to increment generation count");
            }
        }
        let usage = match self.facts(chat_id).await {
            Ok(fresh) => fresh.usage,
            Err(err) => {
                warn!(?err, chat_id, "failed to reload usage");
                facts.usage
            }
        };

        let caption = texts::photo_caption(prompt, usage.count, usage.limit);
        if let Err(err) = self.messenger.send_photo(chat_id, &path, &caption).await {
            warn!(?err, chat_id, path = %path.display(), "failed to send image");
        }
        self.send(chat_id, texts::IMAGE_SENT, Some(Keyboard::MainMenu))
            .await;
    }

    /// `img_<chat>_<unix>_<message>.png`: the message id keeps two generations
    /// within one second apart.
    async fn store_image(&self, msg: &IncomingMessage, image: &[u8]) -> Result<PathBuf> {
        let dir: &Path = &self.settings.images_dir;
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(image_file_name(msg, Utc::now().timestamp()));
        tokio::fs::write(&path, image).await?;
        Ok(path)
    }
}

fn image_file_name(msg: &IncomingMessage, unix: i64) -> String {
    format!("img_{}_{}_{}.png", msg.chat_id, unix, msg.message_id)
}

#[async_trait]
impl UpdateHandler for ChatBot {
    #[instrument(skip_all, fields(chat_id = msg.chat_id, message_id = msg.message_id))]
    async fn handle(&mut self, msg: &IncomingMessage) -> Result<()> {
        let facts = self.facts(msg.chat_id).await?;
        let mode = self.sessions.mode(msg.chat_id);
        let outcome = self.settings.router.route(mode, &msg.text, &facts);
        self.sessions.set(msg.chat_id, outcome.mode);
        if outcome.mode != mode {
            info!(
                from = ?mode,
                to = ?outcome.mode,
                pending = self.sessions.pending(),
                "session mode changed"
            );
        }

        for action in outcome.actions {
            self.perform(msg, action, &facts).await;
        }
        Ok(())
    }
}
