use super::schema::Database;
use super::types::StoreError;

/// Settings key for the global default poll interval (minutes).
pub(crate) const DEFAULT_POLL_INTERVAL_KEY: &str = "poll.default_interval_minutes";

impl Database {
    // ========================================================================
    // Settings Operations
    // ========================================================================

    /// Get the global default poll interval in minutes.
    ///
    /// Used as the fallback cadence for feeds whose own interval is 0, and
    /// as the sweep timer period.
    ///
    /// # Errors
    ///
    /// `StoreError::SettingNotFound` if the seeded row is missing,
    /// `StoreError::InvalidSetting` if the stored value is not an integer.
    pub async fn get_default_poll_interval(&self) -> Result<i64, StoreError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
            .bind(DEFAULT_POLL_INTERVAL_KEY)
            .fetch_optional(&self.pool)
            .await?;

        let value = row
            .map(|(value,)| value)
            .ok_or(StoreError::SettingNotFound(DEFAULT_POLL_INTERVAL_KEY))?;

        value
            .parse::<i64>()
            .map_err(|_| StoreError::InvalidSetting {
                key: DEFAULT_POLL_INTERVAL_KEY,
                value,
            })
    }

    /// Set the global default poll interval (UPSERT).
    pub async fn update_default_poll_interval(&self, minutes: i64) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at)
            VALUES (?, ?, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
        )
        .bind(DEFAULT_POLL_INTERVAL_KEY)
        .bind(minutes.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
