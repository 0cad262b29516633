use std::collections::HashMap;

/// How the next free-text message from a chat is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Idle,
    AwaitingEmail,
    AwaitingPrompt,
}

/// Per-chat modes for the lifetime of the process. Chats in `Idle` are not
/// stored, so the map only holds chats with a pending capture.
#[derive(Debug, Default)]
pub struct SessionManager {
    modes: HashMap<i64, Mode>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self, chat_id: i64) -> Mode {
        self.modes.get(&chat_id).copied().unwrap_or_default()
    }

    pub fn set(&mut self, chat_id: i64, mode: Mode) {
        if mode == Mode::Idle {
            self.modes.remove(&chat_id);
        } else {
            self.modes.insert(chat_id, mode);
        }
    }

    /// Number of chats with a pending capture.
    pub fn pending(&self) -> usize {
        self.modes.len()
    }
}
