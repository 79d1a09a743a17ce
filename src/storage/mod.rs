//! Persistent store: feed configuration, delivered-article records, and the
//! global default poll interval, backed by SQLite.
//!
//! [`Database`] is the concrete implementation; [`FeedStore`] is the
//! capability trait the worker is written against, so tests can substitute
//! a double (or, as most tests here do, an in-memory `Database`).

mod articles;
mod feeds;
mod schema;
mod settings;
mod types;

use async_trait::async_trait;

pub use schema::{Database, SEED_DEFAULT_POLL_INTERVAL_MINUTES};
pub use types::{
    normalized_interval_minutes, Article, Feed, IntervalUnit, NewArticle, NewFeed, StoreError,
    SyncMode,
};

/// Store operations the polling worker and web layer depend on.
#[async_trait]
pub trait FeedStore: Send + Sync {
    async fn get_feeds(&self) -> Result<Vec<Feed>, StoreError>;
    async fn get_feed_by_id(&self, id: i64) -> Result<Feed, StoreError>;
    async fn insert_feed(&self, feed: &NewFeed) -> Result<i64, StoreError>;
    async fn update_feed(&self, feed: &Feed) -> Result<(), StoreError>;
    async fn delete_feed(&self, id: i64) -> Result<(), StoreError>;

    async fn get_articles(&self) -> Result<Vec<Article>, StoreError>;
    async fn save_article(
        &self,
        feed_id: i64,
        article: &NewArticle,
        wallabag_entry_id: Option<i64>,
    ) -> Result<(), StoreError>;
    async fn is_article_processed(&self, url: &str) -> Result<bool, StoreError>;

    async fn get_default_poll_interval(&self) -> Result<i64, StoreError>;
    async fn update_default_poll_interval(&self, minutes: i64) -> Result<(), StoreError>;

    async fn update_feed_last_fetched(&self, id: i64) -> Result<(), StoreError>;
    async fn mark_feed_initial_sync_done(&self, id: i64) -> Result<(), StoreError>;
}

#[async_trait]
impl FeedStore for Database {
    async fn get_feeds(&self) -> Result<Vec<Feed>, StoreError> {
        Database::get_feeds(self).await
    }

    async fn get_feed_by_id(&self, id: i64) -> Result<Feed, StoreError> {
        Database::get_feed_by_id(self, id).await
    }

    async fn insert_feed(&self, feed: &NewFeed) -> Result<i64, StoreError> {
        Database::insert_feed(self, feed).await
    }

    async fn update_feed(&self, feed: &Feed) -> Result<(), StoreError> {
        Database::update_feed(self, feed).await
    }

    async fn delete_feed(&self, id: i64) -> Result<(), StoreError> {
        Database::delete_feed(self, id).await
    }

    async fn get_articles(&self) -> Result<Vec<Article>, StoreError> {
        Database::get_articles(self).await
    }

    async fn save_article(
        &self,
        feed_id: i64,
        article: &NewArticle,
        wallabag_entry_id: Option<i64>,
    ) -> Result<(), StoreError> {
        Database::save_article(self, feed_id, article, wallabag_entry_id).await
    }

    async fn is_article_processed(&self, url: &str) -> Result<bool, StoreError> {
        Database::is_article_processed(self, url).await
    }

    async fn get_default_poll_interval(&self) -> Result<i64, StoreError> {
        Database::get_default_poll_interval(self).await
    }

    async fn update_default_poll_interval(&self, minutes: i64) -> Result<(), StoreError> {
        Database::update_default_poll_interval(self, minutes).await
    }

    async fn update_feed_last_fetched(&self, id: i64) -> Result<(), StoreError> {
        Database::update_feed_last_fetched(self, id).await
    }

    async fn mark_feed_initial_sync_done(&self, id: i64) -> Result<(), StoreError> {
        Database::mark_feed_initial_sync_done(self, id).await
    }
}
