use std::fmt;

/// One inbound event from the long-poll endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingUpdate {
    pub update_id: i64,
    /// `None` for updates that carry no text message (edits, stickers, joins...).
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub chat_id: i64,
    pub message_id: i64,
    pub text: String,
}

impl IncomingMessage {
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            chat_id: self.chat_id,
            message_id: self.message_id,
        }
    }
}

/// Composite identity of a routed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub chat_id: i64,
    pub message_id: i64,
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.chat_id, self.message_id)
    }
}

/// Reply keyboards the bot can attach to a text message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyboard {
    MainMenu,
    Auth,
}

impl Keyboard {
    /// Button labels, row by row.
    pub fn rows(&self) -> Vec<Vec<&'static str>> {
        use crate::texts::{BTN_ACCOUNT, BTN_AUTH, BTN_GENERATE, BTN_HELP};
        match self {
            Keyboard::MainMenu => vec![vec![BTN_GENERATE, BTN_ACCOUNT], vec![BTN_HELP]],
            Keyboard::Auth => vec![vec![BTN_AUTH]],
        }
    }
}
