use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use super::settings::DEFAULT_POLL_INTERVAL_KEY;
use super::types::StoreError;

/// Global default poll interval seeded at bootstrap (minutes).
pub const SEED_DEFAULT_POLL_INTERVAL_MINUTES: i64 = 60;

// ============================================================================
// Database
// ============================================================================

#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

impl Database {
    /// Open a database connection and run migrations.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Migration` if the schema bootstrap fails,
    /// `StoreError::Database` for connection-level errors.
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let url = format!("sqlite:{}?mode=rwc", path);

        // busy_timeout=5000: SQLite waits up to 5 seconds for locks to release
        // before returning SQLITE_BUSY. Handles transient contention between
        // the sweep task and the priority-queue consumer. foreign_keys is
        // per-connection, so it must be set here to cover the whole pool.
        let options = SqliteConnectOptions::from_str(&url)
            .map_err(StoreError::Database)?
            .pragma("busy_timeout", "5000")
            .pragma("foreign_keys", "ON");
        // SQLite is single-writer; 5 connections covers the two worker tasks
        // plus concurrent web handlers. An in-memory database exists per
        // connection, so it gets a single-connection pool.
        let max_connections = if path == ":memory:" { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(StoreError::Database)?;
        let db = Self { pool };
        db.migrate()
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        Ok(db)
    }

    /// Run database migrations atomically within a transaction.
    ///
    /// All statements use `IF NOT EXISTS` / `OR IGNORE` so re-running on an
    /// existing database is a no-op; a failure mid-way rolls back to the
    /// previous consistent state.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        // Cadence and sync columns are nullable; reads normalize absent
        // values (see FeedDbRow::into_feed).
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feeds (
                id INTEGER PRIMARY KEY,
                url TEXT UNIQUE NOT NULL,
                name TEXT NOT NULL,
                poll_interval INTEGER,
                poll_interval_unit TEXT,
                poll_interval_minutes INTEGER,
                last_fetched INTEGER,
                sync_mode TEXT,
                sync_count INTEGER,
                sync_date_from INTEGER,
                initial_sync_done INTEGER NOT NULL DEFAULT 0
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // url is globally unique: it is the sole deduplication key that
        // prevents re-delivering an article to wallabag.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS articles (
                id INTEGER PRIMARY KEY,
                feed_id INTEGER NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                url TEXT UNIQUE NOT NULL,
                published_at INTEGER,
                created_at INTEGER NOT NULL,
                wallabag_entry_id INTEGER
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_articles_feed ON articles(feed_id)")
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_articles_created ON articles(created_at DESC)",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // Seed the global default poll interval; OR IGNORE keeps an
        // operator-tuned value across restarts.
        sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
            .bind(DEFAULT_POLL_INTERVAL_KEY)
            .bind(SEED_DEFAULT_POLL_INTERVAL_MINUTES.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }
}
