//! Database entity models returned by repositories.
//!
//! Keep these structs focused on the data returned by queries. Business logic
//! (authorization, quota limits) lives in higher layers.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Registered chat. Serializes with the same field names the admin tool prints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub email: String,
    pub chat_id: i64,
    pub created: DateTime<Utc>,
    /// Day `count` refers to.
    pub today: NaiveDate,
    pub count: u32,
}

/// Result of registering an email for a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    /// The chat already had a profile; its email was replaced, the counter kept.
    Updated,
    /// Another chat owns this email.
    EmailTaken,
}
