//! Authorization and daily quota: who may generate, and how much is left today.
use crate::config::Config;
use crate::db::{self, Pool, Profile};
use anyhow::Result;
use chrono::NaiveDate;

/// Limits applied to every chat, plus the one chat that bypasses them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaPolicy {
    pub admin_chat_id: i64,
    pub daily_limit: u32,
    pub admin_limit: u32,
}

impl QuotaPolicy {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            admin_chat_id: cfg.telegram.admin_chat_id,
            daily_limit: cfg.quota.daily_limit,
            admin_limit: cfg.quota.admin_limit,
        }
    }

    pub fn is_admin(&self, chat_id: i64) -> bool {
        chat_id == self.admin_chat_id
    }
}

/// Generations used today against the limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub count: u32,
    pub limit: u32,
}

impl Usage {
    pub fn exhausted(&self) -> bool {
        self.count >= self.limit
    }
}

/// Snapshot of one chat taken before routing a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatFacts {
    pub is_admin: bool,
    pub profile: Option<Profile>,
    pub usage: Usage,
}

impl ChatFacts {
    /// `profile` must already be rolled over to the current day.
    pub fn new(policy: &QuotaPolicy, chat_id: i64, profile: Option<Profile>) -> Self {
        let is_admin = policy.is_admin(chat_id);
        let usage = if is_admin {
            // The admin counter is never advanced.
            Usage {
                count: 0,
                limit: policy.admin_limit,
            }
        } else {
            Usage {
                count: profile.as_ref().map(|p| p.count).unwrap_or(0),
                limit: policy.daily_limit,
            }
        };
        Self {
            is_admin,
            profile,
            usage,
        }
    }

    pub fn authorized(&self) -> bool {
        self.is_admin || self.profile.is_some()
    }
}

/// Load the chat's profile (resetting a stale daily counter) and derive its facts.
pub async fn load_facts(
    pool: &Pool,
    policy: &QuotaPolicy,
    chat_id: i64,
    today: NaiveDate,
) -> Result<ChatFacts> {
    let profile = db::reset_if_new_day(pool, chat_id, today).await?;
    Ok(ChatFacts::new(policy, chat_id, profile))
}
