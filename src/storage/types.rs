use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Storage errors surfaced to the worker and the web layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No feed row with the requested ID.
    #[error("feed {0} not found")]
    FeedNotFound(i64),

    /// A settings key that the schema bootstrap should have seeded is missing.
    #[error("setting {0:?} not found")]
    SettingNotFound(&'static str),

    /// A settings value could not be parsed as an integer.
    #[error("setting {key:?} has a non-numeric value {value:?}")]
    InvalidSetting { key: &'static str, value: String },

    /// Article URL violates the UNIQUE constraint (already delivered).
    #[error("article already saved: {0}")]
    DuplicateUrl(String),

    /// Migration failed
    #[error("database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

// ============================================================================
// Enumerations
// ============================================================================

/// Unit for a feed's user-set poll cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalUnit {
    Minutes,
    Hours,
    Days,
}

impl IntervalUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntervalUnit::Minutes => "minutes",
            IntervalUnit::Hours => "hours",
            IntervalUnit::Days => "days",
        }
    }

    /// Multiplier from this unit to minutes.
    pub fn minutes_factor(&self) -> i64 {
        match self {
            IntervalUnit::Minutes => 1,
            IntervalUnit::Hours => 60,
            IntervalUnit::Days => 1440,
        }
    }

    /// Read-time normalization: NULL or unrecognized text reads as days.
    pub(crate) fn from_db(value: Option<&str>) -> Self {
        match value {
            None => IntervalUnit::Days,
            Some("minutes") => IntervalUnit::Minutes,
            Some("hours") => IntervalUnit::Hours,
            Some("days") => IntervalUnit::Days,
            Some(other) => {
                tracing::warn!(unit = %other, "Unknown poll interval unit in database, treating as days");
                IntervalUnit::Days
            }
        }
    }
}

/// Historical backfill policy applied on a feed's first poll only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// No historical backfill; only future items are delivered.
    None,
    /// Deliver every article present in the feed, oldest first.
    All,
    /// Deliver the N most recent articles, oldest-of-those first.
    Count,
    /// Deliver articles published on or after a boundary date.
    DateFrom,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::None => "none",
            SyncMode::All => "all",
            SyncMode::Count => "count",
            SyncMode::DateFrom => "date_from",
        }
    }

    /// Read-time normalization: NULL reads as none; unrecognized text also
    /// reads as none so unexpected history is never silently synced.
    pub(crate) fn from_db(value: Option<&str>) -> Self {
        match value {
            None => SyncMode::None,
            Some("none") => SyncMode::None,
            Some("all") => SyncMode::All,
            Some("count") => SyncMode::Count,
            Some("date_from") => SyncMode::DateFrom,
            Some(other) => {
                tracing::warn!(sync_mode = %other, "Unknown sync mode in database, treating as none");
                SyncMode::None
            }
        }
    }
}

/// Normalized cadence in minutes for a raw (value, unit) pair.
///
/// Values ≤ 0 normalize to 0, meaning "use the global default interval".
pub fn normalized_interval_minutes(value: i64, unit: IntervalUnit) -> i64 {
    if value <= 0 {
        0
    } else {
        value * unit.minutes_factor()
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// A monitored feed as stored in the database.
///
/// `poll_interval_minutes` is derived from (`poll_interval`,
/// `poll_interval_unit`) and must only change through
/// [`Feed::set_poll_interval`].
#[derive(Debug, Clone, Serialize)]
pub struct Feed {
    pub id: i64,
    pub url: String,
    pub name: String,
    pub poll_interval: i64,
    pub poll_interval_unit: IntervalUnit,
    pub poll_interval_minutes: i64,
    pub last_fetched: Option<i64>,
    pub sync_mode: SyncMode,
    pub sync_count: Option<i64>,
    pub sync_date_from: Option<i64>,
    pub initial_sync_done: bool,
}

impl Feed {
    /// Set the raw cadence and recompute the normalized minutes.
    pub fn set_poll_interval(&mut self, value: i64, unit: IntervalUnit) {
        self.poll_interval = value;
        self.poll_interval_unit = unit;
        self.poll_interval_minutes = normalized_interval_minutes(value, unit);
    }
}

/// Parameters for creating a feed. The store assigns the ID.
#[derive(Debug, Clone)]
pub struct NewFeed {
    pub url: String,
    pub name: String,
    pub poll_interval: i64,
    pub poll_interval_unit: IntervalUnit,
    pub sync_mode: SyncMode,
    pub sync_count: Option<i64>,
    pub sync_date_from: Option<i64>,
}

impl NewFeed {
    pub fn new(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
            poll_interval: 1,
            poll_interval_unit: IntervalUnit::Days,
            sync_mode: SyncMode::None,
            sync_count: None,
            sync_date_from: None,
        }
    }
}

/// An article as returned by the fetcher, before delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewArticle {
    pub title: String,
    pub url: String,
    /// Unix seconds. The parser resolves missing dates to "now", so this is
    /// `None` only on defensive code paths.
    pub published_at: Option<i64>,
}

/// A delivered article as stored in the database.
///
/// A row exists if and only if the article was successfully submitted to
/// wallabag; `url` carries the UNIQUE constraint that makes delivery
/// idempotent.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Article {
    pub id: i64,
    pub feed_id: i64,
    pub title: String,
    pub url: String,
    pub published_at: Option<i64>,
    pub created_at: i64,
    pub wallabag_entry_id: Option<i64>,
}

// ============================================================================
// Row Types
// ============================================================================

/// Raw feed row with nullable cadence/sync columns.
/// Converts to [`Feed`] via `into_feed()` which applies read-time defaults.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct FeedDbRow {
    pub id: i64,
    pub url: String,
    pub name: String,
    pub poll_interval: Option<i64>,
    pub poll_interval_unit: Option<String>,
    pub poll_interval_minutes: Option<i64>,
    pub last_fetched: Option<i64>,
    pub sync_mode: Option<String>,
    pub sync_count: Option<i64>,
    pub sync_date_from: Option<i64>,
    pub initial_sync_done: bool,
}

impl FeedDbRow {
    pub(crate) fn into_feed(self) -> Feed {
        // Absent cadence reads as 1 day; absent sync mode reads as none.
        let poll_interval = self.poll_interval.unwrap_or(1);
        let poll_interval_unit = IntervalUnit::from_db(self.poll_interval_unit.as_deref());
        let poll_interval_minutes = self
            .poll_interval_minutes
            .unwrap_or_else(|| normalized_interval_minutes(poll_interval, poll_interval_unit));
        Feed {
            id: self.id,
            url: self.url,
            name: self.name,
            poll_interval,
            poll_interval_unit,
            poll_interval_minutes,
            last_fetched: self.last_fetched,
            sync_mode: SyncMode::from_db(self.sync_mode.as_deref()),
            sync_count: self.sync_count,
            sync_date_from: self.sync_date_from,
            initial_sync_done: self.initial_sync_done,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn feed_fixture() -> Feed {
        Feed {
            id: 1,
            url: "https://example.com/feed.xml".into(),
            name: "Example".into(),
            poll_interval: 1,
            poll_interval_unit: IntervalUnit::Days,
            poll_interval_minutes: 1440,
            last_fetched: None,
            sync_mode: SyncMode::None,
            sync_count: None,
            sync_date_from: None,
            initial_sync_done: false,
        }
    }

    #[test]
    fn test_set_poll_interval_minutes() {
        let mut feed = feed_fixture();
        feed.set_poll_interval(30, IntervalUnit::Minutes);
        assert_eq!(feed.poll_interval_minutes, 30);
    }

    #[test]
    fn test_set_poll_interval_hours() {
        let mut feed = feed_fixture();
        feed.set_poll_interval(2, IntervalUnit::Hours);
        assert_eq!(feed.poll_interval_minutes, 120);
    }

    #[test]
    fn test_set_poll_interval_days() {
        let mut feed = feed_fixture();
        feed.set_poll_interval(1, IntervalUnit::Days);
        assert_eq!(feed.poll_interval_minutes, 1440);
    }

    #[test]
    fn test_non_positive_interval_normalizes_to_zero() {
        let mut feed = feed_fixture();
        feed.set_poll_interval(0, IntervalUnit::Hours);
        assert_eq!(feed.poll_interval_minutes, 0);
        feed.set_poll_interval(-5, IntervalUnit::Days);
        assert_eq!(feed.poll_interval_minutes, 0);
    }

    #[test]
    fn test_sync_mode_from_db_unknown_is_none() {
        assert_eq!(SyncMode::from_db(Some("bogus")), SyncMode::None);
        assert_eq!(SyncMode::from_db(None), SyncMode::None);
        assert_eq!(SyncMode::from_db(Some("date_from")), SyncMode::DateFrom);
    }

    #[test]
    fn test_interval_unit_from_db_unknown_is_days() {
        assert_eq!(IntervalUnit::from_db(Some("fortnights")), IntervalUnit::Days);
        assert_eq!(IntervalUnit::from_db(None), IntervalUnit::Days);
    }

    #[test]
    fn test_row_normalization_defaults() {
        let row = FeedDbRow {
            id: 1,
            url: "https://example.com/feed.xml".into(),
            name: "Example".into(),
            poll_interval: None,
            poll_interval_unit: None,
            poll_interval_minutes: None,
            last_fetched: None,
            sync_mode: None,
            sync_count: None,
            sync_date_from: None,
            initial_sync_done: false,
        };
        let feed = row.into_feed();
        assert_eq!(feed.poll_interval, 1);
        assert_eq!(feed.poll_interval_unit, IntervalUnit::Days);
        assert_eq!(feed.poll_interval_minutes, 1440);
        assert_eq!(feed.sync_mode, SyncMode::None);
    }

    proptest! {
        /// value * {1, 60, 1440} for positive values, 0 otherwise,
        /// regardless of unit.
        #[test]
        fn prop_interval_round_trip(value in -1000i64..100_000, unit_idx in 0usize..3) {
            let unit = [IntervalUnit::Minutes, IntervalUnit::Hours, IntervalUnit::Days][unit_idx];
            let mut feed = feed_fixture();
            feed.set_poll_interval(value, unit);
            let expected = if value <= 0 { 0 } else { value * unit.minutes_factor() };
            prop_assert_eq!(feed.poll_interval_minutes, expected);
        }
    }
}
