//! The long-polling loop: fetch a batch, route each new message in order,
//! acknowledge it, repeat. Transport errors back off; handler errors are
//! logged and never stop the loop.
use anyhow::Result;
use async_trait::async_trait;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

use crate::config::Config;
use crate::model::IncomingMessage;
use crate::telegram::UpdateSource;
use crate::tracker::UpdateTracker;

const SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

/// Receives every message that passed deduplication, one at a time.
#[async_trait]
pub trait UpdateHandler: Send {
    async fn handle(&mut self, msg: &IncomingMessage) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub poll_timeout: Duration,
    pub retry_backoff: Duration,
    pub max_backoff: Duration,
    pub retention_days: u32,
}

impl PollSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            poll_timeout: cfg.app.poll_timeout(),
            retry_backoff: Duration::from_millis(cfg.app.retry_backoff_ms),
            max_backoff: Duration::from_secs(cfg.app.max_backoff_seconds),
            retention_days: cfg.app.processed_retention_days,
        }
    }
}

/// What happened to one fetched batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub fetched: usize,
    pub handled: usize,
    pub duplicates: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Exponential backoff `base * 2^(attempt-1)`, capped at `max` (a zero cap disables the cap).
pub fn backoff_delay(base: Duration, max: Duration, attempt: u32) -> Duration {
    let factor = 1u32 << attempt.saturating_sub(1).min(10);
    let delay = base.saturating_mul(factor);
    if max.is_zero() {
        delay
    } else {
        delay.min(max)
    }
}

/// Fetch one batch after the tracker's cursor and process it in arrival order.
#[instrument(skip_all)]
pub async fn poll_once<S, H>(
    source: &S,
    tracker: &mut UpdateTracker,
    handler: &mut H,
    timeout: Duration,
) -> Result<BatchReport>
where
    S: UpdateSource + ?Sized,
    H: UpdateHandler + ?Sized,
{
    let offset = tracker.next_offset();
    let updates = source.fetch(offset, timeout).await?;
    let mut report = BatchReport {
        fetched: updates.len(),
        ..Default::default()
    };
    if updates.is_empty() {
        return Ok(report);
    }
    debug!(count = updates.len(), offset, "processing batch");
    tracker.begin_cycle();

    for update in updates {
        if update.update_id < tracker.next_offset() {
            debug!(update_id = update.update_id, "update below cursor; already acknowledged");
            report.duplicates += 1;
            continue;
        }

        let Some(msg) = update.message else {
            report.skipped += 1;
            if let Err(err) = tracker.acknowledge(update.update_id, None).await {
                error!(?err, update_id = update.update_id, "failed to acknowledge update");
            }
            continue;
        };

        let key = msg.dedup_key();
        let seen = match tracker.seen(&key).await {
            Ok(seen) => seen,
            Err(err) => {
                // Prefer a possible duplicate over dropping the message.
                warn!(?err, %key, "dedup lookup failed; handling anyway");
                false
            }
        };
        if seen {
            info!(%key, update_id = update.update_id, "skipping duplicate message");
            report.duplicates += 1;
        } else {
            info!(%key, update_id = update.update_id, "handling message");
            match handler.handle(&msg).await {
                Ok(()) => report.handled += 1,
                Err(err) => {
                    error!(?err, %key, "failed to handle message");
                    report.failed += 1;
                }
            }
        }

        if let Err(err) = tracker.acknowledge(update.update_id, Some(key)).await {
            error!(?err, update_id = update.update_id, "failed to acknowledge update");
        }
    }

    Ok(report)
}

/// Poll until `shutdown` resolves. Only `shutdown` ends the loop.
pub async fn run<S, H, F>(
    source: &S,
    tracker: &mut UpdateTracker,
    handler: &mut H,
    settings: PollSettings,
    shutdown: F,
) where
    S: UpdateSource + ?Sized,
    H: UpdateHandler + ?Sized,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut failures: u32 = 0;
    let mut last_sweep: Option<Instant> = None;

    info!(offset = tracker.next_offset(), "starting polling loop");
    loop {
        if settings.retention_days > 0
            && last_sweep.map_or(true, |t| t.elapsed() >= SWEEP_INTERVAL)
        {
            if let Err(err) = tracker.sweep(settings.retention_days).await {
                warn!(?err, "failed to sweep processed keys");
            }
            last_sweep = Some(Instant::now());
        }

        let res = tokio::select! {
            _ = &mut shutdown => break,
            res = poll_once(source, tracker, handler, settings.poll_timeout) => res,
        };

        match res {
            Ok(report) => {
                failures = 0;
                if report.fetched > 0 {
                    info!(
                        fetched = report.fetched,
                        handled = report.handled,
                        duplicates = report.duplicates,
                        skipped = report.skipped,
                        failed = report.failed,
                        next_offset = tracker.next_offset(),
                        "batch processed"
                    );
                }
            }
            Err(err) => {
                failures = failures.saturating_add(1);
                let delay = backoff_delay(settings.retry_backoff, settings.max_backoff, failures);
                warn!(?err, failures, delay_ms = delay.as_millis() as u64, "polling failed; backing off");
                tokio::select! {
                    _ = &mut shutdown => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
    info!(offset = tracker.next_offset(), "polling loop stopped");
}
