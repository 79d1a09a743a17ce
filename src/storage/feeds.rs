use chrono::Utc;

use super::schema::Database;
use super::types::{normalized_interval_minutes, Feed, FeedDbRow, NewFeed, StoreError};

const FEED_COLUMNS: &str = "id, url, name, poll_interval, poll_interval_unit, \
     poll_interval_minutes, last_fetched, sync_mode, sync_count, sync_date_from, \
     initial_sync_done";

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Get all feeds.
    ///
    /// Order is stable (by ID) but carries no meaning; the worker's sweep
    /// processes feeds in whatever order this returns.
    pub async fn get_feeds(&self) -> Result<Vec<Feed>, StoreError> {
        let rows: Vec<FeedDbRow> =
            sqlx::query_as(&format!("SELECT {} FROM feeds ORDER BY id", FEED_COLUMNS))
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(FeedDbRow::into_feed).collect())
    }

    /// Get a single feed by ID.
    pub async fn get_feed_by_id(&self, id: i64) -> Result<Feed, StoreError> {
        let row: Option<FeedDbRow> =
            sqlx::query_as(&format!("SELECT {} FROM feeds WHERE id = ?", FEED_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(FeedDbRow::into_feed)
            .ok_or(StoreError::FeedNotFound(id))
    }

    /// Insert a new feed and return its assigned ID.
    ///
    /// The normalized interval is derived here so the stored row never
    /// diverges from its raw (value, unit) pair.
    ///
    /// # Errors
    ///
    /// `StoreError::DuplicateUrl` if a feed with the same URL exists.
    pub async fn insert_feed(&self, feed: &NewFeed) -> Result<i64, StoreError> {
        let minutes = normalized_interval_minutes(feed.poll_interval, feed.poll_interval_unit);
        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO feeds (url, name, poll_interval, poll_interval_unit,
                               poll_interval_minutes, sync_mode, sync_count, sync_date_from,
                               initial_sync_done)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0)
            RETURNING id
        "#,
        )
        .bind(&feed.url)
        .bind(&feed.name)
        .bind(feed.poll_interval)
        .bind(feed.poll_interval_unit.as_str())
        .bind(minutes)
        .bind(feed.sync_mode.as_str())
        .bind(feed.sync_count)
        .bind(feed.sync_date_from)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, &feed.url))?;

        Ok(row.0)
    }

    /// Update a feed's user-editable fields. A missing ID is a no-op, not an
    /// error.
    ///
    /// The normalized interval is recomputed from the feed's raw cadence, so
    /// callers cannot persist a diverged `poll_interval_minutes`.
    pub async fn update_feed(&self, feed: &Feed) -> Result<(), StoreError> {
        let minutes = normalized_interval_minutes(feed.poll_interval, feed.poll_interval_unit);
        sqlx::query(
            r#"
            UPDATE feeds
            SET url = ?, name = ?, poll_interval = ?, poll_interval_unit = ?,
                poll_interval_minutes = ?, sync_mode = ?, sync_count = ?, sync_date_from = ?
            WHERE id = ?
        "#,
        )
        .bind(&feed.url)
        .bind(&feed.name)
        .bind(feed.poll_interval)
        .bind(feed.poll_interval_unit.as_str())
        .bind(minutes)
        .bind(feed.sync_mode.as_str())
        .bind(feed.sync_count)
        .bind(feed.sync_date_from)
        .bind(feed.id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, &feed.url))?;

        Ok(())
    }

    /// Delete a feed. A missing ID is a no-op; articles cascade.
    pub async fn delete_feed(&self, id: i64) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM feeds WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Set a feed's `last_fetched` to the current time.
    pub async fn update_feed_last_fetched(&self, id: i64) -> Result<(), StoreError> {
        let now = Utc::now().timestamp();
        sqlx::query("UPDATE feeds SET last_fetched = ? WHERE id = ?")
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Mark a feed's initial sync as completed. Permanent once set.
    pub async fn mark_feed_initial_sync_done(&self, id: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE feeds SET initial_sync_done = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn map_unique_violation(err: sqlx::Error, url: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            StoreError::DuplicateUrl(url.to_string())
        }
        _ => StoreError::Database(err),
    }
}
