//! Database initialization
//!
//! Creates the SQLite database on first run and brings the schema up to date.
//! Every statement is idempotent, so it is safe to run on each startup.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use super::settings::{ensure_setting, get_setting_or};

/// Setting keys and their built-in defaults
pub const DEFAULT_SETTINGS: &[(&str, &str)] = &[
    // Upsert-merge retry budget
    ("progress_write_max_attempts", "3"),
    ("progress_write_backoff_ms", "50"),
    // SQLite lock wait before a write reports "database is locked"
    ("database_busy_timeout_ms", "250"),
];

/// Initialize database connection and create tables if needed
///
/// Opens a short-lived bootstrap connection to create the schema and read
/// `database_busy_timeout_ms`, then opens the serving pool with that timeout
/// applied to every connection.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);

    let bootstrap = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options.clone())
        .await?;
    create_schema(&bootstrap).await?;
    let timeout_ms: u64 = get_setting_or(&bootstrap, "database_busy_timeout_ms", 250).await?;
    bootstrap.close().await;

    let pool = SqlitePoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .connect_with(options.busy_timeout(Duration::from_millis(timeout_ms)))
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }
    info!("Database busy timeout set to {} ms", timeout_ms);

    Ok(pool)
}

/// Create all tables and default settings on an already-open pool
///
/// Used directly by tests that run against `sqlite::memory:`.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;

    create_settings_table(pool).await?;
    create_members_table(pool).await?;
    create_sessions_table(pool).await?;
    create_articles_table(pool).await?;
    create_read_progress_table(pool).await?;

    for (key, value) in DEFAULT_SETTINGS {
        ensure_setting(pool, key, value).await?;
    }

    Ok(())
}

/// Create the settings table
///
/// Stores runtime configuration key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Members known to the site (mirrored from the account service)
pub async fn create_members_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS members (
            id TEXT PRIMARY KEY,
            display_name TEXT NOT NULL DEFAULT '',
            banned INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Active sessions, keyed by SHA-256 of the bearer token
pub async fn create_sessions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            token_hash TEXT PRIMARY KEY,
            member_id TEXT NOT NULL REFERENCES members(id) ON DELETE CASCADE,
            expires_at TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_member ON sessions(member_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Published articles (mirrored from the content store)
pub async fn create_articles_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS articles (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// One row per (member, article); `revision` drives compare-and-swap writes
pub async fn create_read_progress_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS read_progress (
            member_id TEXT NOT NULL,
            article_id TEXT NOT NULL,
            progress INTEGER NOT NULL CHECK (progress BETWEEN 0 AND 100),
            time_spent INTEGER NOT NULL DEFAULT 0 CHECK (time_spent >= 0),
            first_visited_at TEXT NOT NULL,
            last_visited_at TEXT NOT NULL,
            completed INTEGER NOT NULL DEFAULT 0,
            revision INTEGER NOT NULL DEFAULT 1,
            UNIQUE (member_id, article_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
