use super::model::{CreateOutcome, Profile};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::instrument;

pub type Pool = SqlitePool;

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let opts = SqliteConnectOptions::from_str(&normalized)
        .with_context(|| format!("invalid database url: {}", normalized))?
        .create_if_missing(true);
    let pool = if normalized.starts_with("sqlite::memory") {
        // Every connection to :memory: opens a fresh database; keep exactly one alive.
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await?
    } else {
        SqlitePoolOptions::new().connect_with(opts).await?
    };
    // Enable WAL and stricter durability.
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// If using a file-backed SQLite URL, expand a leading `~/` and ensure the parent
/// directory exists. Leaves in-memory URLs untouched. Returns possibly-updated URL.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") {
        return url.to_string();
    }

    // In-memory URLs like sqlite::memory: or sqlite::memory:?cache=shared
    if url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);

    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };

    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let mut rebuilt = String::from("sqlite://");
    rebuilt.push_str(&expanded_path);
    if let Some(q) = query_part {
        rebuilt.push('?');
        rebuilt.push_str(q);
    }
    rebuilt
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn profile_from_row(row: &SqliteRow) -> Result<Profile> {
    let count: i64 = row.try_get("count")?;
    Ok(Profile {
        email: row.try_get("email")?,
        chat_id: row.try_get("chat_id")?,
        created: row.try_get::<DateTime<Utc>, _>("created")?,
        today: row.try_get::<NaiveDate, _>("today")?,
        count: u32::try_from(count).unwrap_or(0),
    })
}

#[instrument(skip_all)]
pub async fn get_profile(pool: &Pool, chat_id: i64) -> Result<Option<Profile>> {
    let row = sqlx::query(
        "SELECT chat_id, email, created, today, count FROM profiles WHERE chat_id = ?",
    )
    .bind(chat_id)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(profile_from_row).transpose()
}

#[instrument(skip_all)]
pub async fn email_exists(pool: &Pool, email: &str) -> Result<bool> {
    let found = sqlx::query_scalar::<_, i64>("SELECT chat_id FROM profiles WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}

/// Register `email` for `chat_id`. A chat that already has a profile gets its
/// email replaced while `today`/`count` are kept, so re-registering cannot
/// reset the daily quota.
#[instrument(skip_all)]
pub async fn create_profile(
    pool: &Pool,
    chat_id: i64,
    email: &str,
    now: DateTime<Utc>,
    today: NaiveDate,
) -> Result<CreateOutcome> {
    let mut tx = pool.begin().await?;
    let owner = sqlx::query_scalar::<_, i64>("SELECT chat_id FROM profiles WHERE email = ?")
        .bind(email)
        .fetch_optional(&mut *tx)
        .await?;
    match owner {
        Some(owner) if owner != chat_id => return Ok(CreateOutcome::EmailTaken),
        Some(_) => return Ok(CreateOutcome::Updated),
        None => {}
    }

    let existing = sqlx::query_scalar::<_, i64>("SELECT chat_id FROM profiles WHERE chat_id = ?")
        .bind(chat_id)
        .fetch_optional(&mut *tx)
        .await?;

    let (res, outcome) = if existing.is_some() {
        let res = sqlx::query("UPDATE profiles SET email = ? WHERE chat_id = ?")
            .bind(email)
            .bind(chat_id)
            .execute(&mut *tx)
            .await;
        (res, CreateOutcome::Updated)
    } else {
        let res = sqlx::query(
            "INSERT INTO profiles (chat_id, email, created, today, count) VALUES (?, ?, ?, ?, 0)",
        )
        .bind(chat_id)
        .bind(email)
        .bind(now)
        .bind(today)
        .execute(&mut *tx)
        .await;
        (res, CreateOutcome::Created)
    };

    match res {
        Ok(_) => {}
        Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
            return Ok(CreateOutcome::EmailTaken);
        }
        Err(err) => return Err(err).context("failed to write profile"),
    }
    tx.commit().await?;
    Ok(outcome)
}

#[instrument(skip_all)]
pub async fn increment_count(pool: &Pool, chat_id: i64) -> Result<()> {
    sqlx::query("UPDATE profiles SET count = count + 1 WHERE chat_id = ?")
        .bind(chat_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Load the profile and, when its counter belongs to an earlier day, zero it
/// and move `today` forward before returning it.
#[instrument(skip_all)]
pub async fn reset_if_new_day(
    pool: &Pool,
    chat_id: i64,
    today: NaiveDate,
) -> Result<Option<Profile>> {
    let Some(mut profile) = get_profile(pool, chat_id).await? else {
        return Ok(None);
    };
    if profile.today != today {
        sqlx::query("UPDATE profiles SET today = ?, count = 0 WHERE chat_id = ?")
            .bind(today)
            .bind(chat_id)
            .execute(pool)
            .await?;
        profile.today = today;
        profile.count = 0;
    }
    Ok(Some(profile))
}

#[instrument(skip_all)]
pub async fn list_profiles(pool: &Pool) -> Result<Vec<Profile>> {
    let rows = sqlx::query(
        "SELECT chat_id, email, created, today, count FROM profiles ORDER BY created ASC",
    )
    .fetch_all(pool)
    .await?;
    rows.iter().map(profile_from_row).collect()
}

#[instrument(skip_all)]
pub async fn delete_profile(pool: &Pool, chat_id: i64) -> Result<bool> {
    let res = sqlx::query("DELETE FROM profiles WHERE chat_id = ?")
        .bind(chat_id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}

/// Next update id to request. 0 when nothing was ever acknowledged.
#[instrument(skip_all)]
pub async fn load_cursor(pool: &Pool) -> Result<i64> {
    let offset = sqlx::query_scalar::<_, i64>("SELECT next_offset FROM poll_cursor WHERE id = 1")
        .fetch_optional(pool)
        .await?;
    Ok(offset.unwrap_or(0))
}

#[instrument(skip_all)]
pub async fn is_processed(pool: &Pool, key: &str) -> Result<bool> {
    let found = sqlx::query_scalar::<_, i64>("SELECT 1 FROM processed_updates WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}

/// Record `update_id` as fully handled: remember `key` (if any) and move the
/// cursor to `update_id + 1`. Both writes commit together; the cursor never
/// moves backwards.
#[instrument(skip_all)]
pub async fn acknowledge_update(pool: &Pool, update_id: i64, key: Option<&str>) -> Result<()> {
    let mut tx = pool.begin().await?;
    if let Some(key) = key {
        sqlx::query("INSERT OR IGNORE INTO processed_updates (key, update_id) VALUES (?, ?)")
            .bind(key)
            .bind(update_id)
            .execute(&mut *tx)
            .await?;
    }
    sqlx::query(
        "INSERT INTO poll_cursor (id, next_offset) VALUES (1, ?) \
         ON CONFLICT(id) DO UPDATE SET next_offset = MAX(next_offset, excluded.next_offset)",
    )
    .bind(update_id + 1)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(())
}

/// Delete processed keys older than `days`. Returns the number removed.
#[instrument(skip_all)]
pub async fn prune_processed(pool: &Pool, days: u32) -> Result<u64> {
    let res = sqlx::query(
        "DELETE FROM processed_updates WHERE datetime(processed_at) < datetime('now', ? || ' days')",
    )
    .bind(-(days as i64))
    .execute(pool)
    .await?;
    Ok(res.rows_affected())
}

#[instrument(skip_all)]
pub async fn count_processed(pool: &Pool) -> Result<i64> {
    let cnt: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM processed_updates")
        .fetch_one(pool)
        .await?;
    Ok(cnt)
}
