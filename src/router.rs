//! Message routing: a pure function from (mode, text, chat facts) to the next
//! mode and the actions to perform. All I/O happens in the caller.
use crate::access::ChatFacts;
use crate::model::Keyboard;
use crate::session::Mode;
use crate::texts;
use once_cell::sync::Lazy;
use regex::Regex;
use teloxide::utils::command::BotCommands;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email regex")
});

/// Slash commands, also registered with Telegram at startup.
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Команды бота:")]
pub enum Command {
    #[command(description = "Начать работу с ботом")]
    Start,
    #[command(description = "Мой профиль и статистика")]
    Profile,
    #[command(description = "Генерировать изображение")]
    Generate,
    #[command(description = "Справка")]
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Reply {
        text: String,
        keyboard: Option<Keyboard>,
    },
    /// Register a validated, normalized email for the chat.
    Register { email: String },
    /// Generate an image for a prompt that passed length and quota checks.
    Generate { prompt: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub mode: Mode,
    pub actions: Vec<Action>,
}

impl Outcome {
    fn new(mode: Mode, actions: Vec<Action>) -> Self {
        Self { mode, actions }
    }

    fn reply(mode: Mode, text: impl Into<String>, keyboard: Option<Keyboard>) -> Self {
        Self::new(mode, vec![reply(text, keyboard)])
    }
}

pub fn reply(text: impl Into<String>, keyboard: Option<Keyboard>) -> Action {
    Action::Reply {
        text: text.into(),
        keyboard,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Start,
    Help,
    Profile,
    Generate,
    Auth,
}

/// A command is the whole message: `/start now` is plain text.
fn classify(text: &str) -> Option<Trigger> {
    let single_token = !text.contains(char::is_whitespace);
    if single_token {
        if let Ok(cmd) = Command::parse(text, "") {
            return Some(match cmd {
                Command::Start => Trigger::Start,
                Command::Profile => Trigger::Profile,
                Command::Generate => Trigger::Generate,
                Command::Help => Trigger::Help,
            });
        }
    }
    match text {
        texts::BTN_GENERATE => Some(Trigger::Generate),
        texts::BTN_ACCOUNT => Some(Trigger::Profile),
        texts::BTN_HELP => Some(Trigger::Help),
        texts::BTN_AUTH => Some(Trigger::Auth),
        _ => None,
    }
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Router {
    pub admin_chat_id: i64,
    pub daily_limit: u32,
    pub min_prompt_chars: usize,
}

impl Router {
    pub fn new(admin_chat_id: i64, daily_limit: u32, min_prompt_chars: usize) -> Self {
        Self {
            admin_chat_id,
            daily_limit,
            min_prompt_chars,
        }
    }

    /// Commands and menu buttons are recognized in every mode and cancel a
    /// pending capture; other text goes to the capture the chat is in.
    pub fn route(&self, mode: Mode, text: &str, facts: &ChatFacts) -> Outcome {
        let text = text.trim();
        if let Some(trigger) = classify(text) {
            return self.on_trigger(trigger, mode, facts);
        }
        match mode {
            Mode::AwaitingEmail => self.on_email(text),
            Mode::AwaitingPrompt => self.on_prompt(text, facts),
            Mode::Idle => Outcome::reply(mode, texts::USE_MENU, Some(Keyboard::MainMenu)),
        }
    }

    fn on_trigger(&self, trigger: Trigger, mode: Mode, facts: &ChatFacts) -> Outcome {
        match trigger {
            Trigger::Start => {
                if facts.authorized() {
                    Outcome::reply(Mode::Idle, texts::WELCOME_AUTHORIZED, Some(Keyboard::MainMenu))
                } else {
                    Outcome::reply(Mode::Idle, texts::WELCOME_GUEST, Some(Keyboard::Auth))
                }
            }
            Trigger::Help => Outcome::reply(
                Mode::Idle,
                texts::help(self.daily_limit),
                Some(Keyboard::MainMenu),
            ),
            Trigger::Profile => {
                if facts.is_admin {
                    return Outcome::reply(
                        Mode::Idle,
                        texts::admin_card(self.admin_chat_id),
                        Some(Keyboard::MainMenu),
                    );
                }
                match &facts.profile {
                    Some(profile) => {
                        let registered_on = profile.created.format("%Y-%m-%d").to_string();
                        Outcome::reply(
                            Mode::Idle,
                            texts::account_card(
                                &profile.email,
                                facts.usage.count,
                                facts.usage.limit,
                                &registered_on,
                            ),
                            Some(Keyboard::MainMenu),
                        )
                    }
                    None => Outcome::reply(Mode::Idle, texts::NOT_AUTHORIZED, None),
                }
            }
            Trigger::Generate => {
                if !facts.authorized() {
                    return Outcome::reply(Mode::Idle, texts::AUTH_REQUIRED, None);
                }
                if facts.usage.exhausted() {
                    return Outcome::reply(Mode::Idle, texts::quota_exceeded(facts.usage.limit), None);
                }
                if mode == Mode::AwaitingPrompt {
                    // Double tap on "generate": the first request is still pending.
                    return Outcome::new(mode, Vec::new());
                }
                Outcome::reply(
                    Mode::AwaitingPrompt,
                    texts::ask_prompt(facts.usage.count, facts.usage.limit),
                    None,
                )
            }
            Trigger::Auth => Outcome::reply(Mode::AwaitingEmail, texts::ASK_EMAIL, None),
        }
    }

    fn on_email(&self, text: &str) -> Outcome {
        let email = text.trim().to_lowercase();
        if !is_valid_email(&email) {
            return Outcome::reply(Mode::Idle, texts::EMAIL_INVALID, None);
        }
        Outcome::new(Mode::Idle, vec![Action::Register { email }])
    }

    fn on_prompt(&self, text: &str, facts: &ChatFacts) -> Outcome {
        let prompt = text.trim();
        if prompt.chars().count() < self.min_prompt_chars {
            return Outcome::reply(Mode::Idle, texts::prompt_too_short(self.min_prompt_chars), None);
        }
        if !facts.authorized() {
            return Outcome::reply(Mode::Idle, texts::AUTH_REQUIRED, None);
        }
        if facts.usage.exhausted() {
            return Outcome::reply(Mode::Idle, texts::quota_exceeded(facts.usage.limit), None);
        }
        Outcome::new(
            Mode::Idle,
            vec![Action::Generate {
                prompt: prompt.to_string(),
            }],
        )
    }
}
