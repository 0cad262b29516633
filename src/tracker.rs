//! Update deduplication and the durable long-poll cursor.
//!
//! Membership is checked before an update is routed; the update is
//! acknowledged (key recorded, cursor advanced) only after it was fully
//! handled. A crash mid-handling therefore re-delivers the unacknowledged
//! tail on restart instead of losing it, and the processed-key set keeps a
//! re-delivered message from being routed twice.
use std::collections::HashSet;

use anyhow::Result;
use tracing::{debug, info};

use crate::db::{self, Pool};
use crate::model::DedupKey;

pub struct UpdateTracker {
    pool: Pool,
    persist_processed: bool,
    next_offset: i64,
    cycle: HashSet<DedupKey>,
}

impl UpdateTracker {
    /// Restore the cursor from storage.
    pub async fn load(pool: Pool, persist_processed: bool) -> Result<Self> {
        let next_offset = db::load_cursor(&pool).await?;
        Ok(Self {
            pool,
            persist_processed,
            next_offset,
            cycle: HashSet::new(),
        })
    }

    /// Offset to send with the next poll.
    pub fn next_offset(&self) -> i64 {
        self.next_offset
    }

    /// Start a new poll cycle: forget the in-memory keys of the previous batch.
    pub fn begin_cycle(&mut self) {
        self.cycle.clear();
    }

    /// Whether `key` was already handled, in this batch or (when persisted) ever.
    pub async fn seen(&self, key: &DedupKey) -> Result<bool> {
        if self.cycle.contains(key) {
            return Ok(true);
        }
        if self.persist_processed {
            return db::is_processed(&self.pool, &key.to_string()).await;
        }
        Ok(false)
    }

    /// Mark `update_id` (and its message key, if it had one) as handled.
    ///
    /// The in-memory state advances even when the write fails, so one storage
    /// hiccup cannot make the loop re-handle the same update forever; the
    /// error is still returned for logging.
    pub async fn acknowledge(&mut self, update_id: i64, key: Option<DedupKey>) -> Result<()> {
        if let Some(key) = key {
            self.cycle.insert(key);
        }
        self.next_offset = self.next_offset.max(update_id + 1);

        let stored_key = key
            .filter(|_| self.persist_processed)
            .map(|k| k.to_string());
        db::acknowledge_update(&self.pool, update_id, stored_key.as_deref()).await?;
        debug!(update_id, next_offset = self.next_offset, "acknowledged update");
        Ok(())
    }

    /// Drop processed keys older than `days`. No-op for `days == 0`.
    pub async fn sweep(&self, days: u32) -> Result<u64> {
        if days == 0 || !self.persist_processed {
            return Ok(0);
        }
        let removed = db::prune_processed(&self.pool, days).await?;
        if removed > 0 {
            info!(removed, days, "swept old processed update keys");
        }
        Ok(removed)
    }
}
