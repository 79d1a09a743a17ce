//! JSON API over the worker and store.
//!
//! This is deliberately the narrow surface the worker exposes to callers:
//! feed CRUD, the two sync triggers, delivered articles, and the global
//! poll interval. Handlers never block on the priority queue; a full
//! queue is a log line, not a response code.

mod error;
mod handlers;

use async_trait::async_trait;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::feed::FeedFetcher;
use crate::storage::{Database, StoreError};
use crate::wallabag::DeliveryClient;
use crate::worker::PollingWorker;

pub use error::ApiError;

use handlers::{
    create_feed, delete_feed, get_poll_interval, health_check, list_articles, list_feeds,
    put_poll_interval, sync_all, sync_feed, update_feed,
};

/// The only worker operations callers outside the worker may use.
#[async_trait]
pub trait SyncTrigger: Send + Sync {
    /// Fire-and-forget enqueue of one feed.
    fn queue_feed(&self, feed_id: i64);
    /// Best-effort enqueue of every feed; the error is a store read failure.
    async fn queue_all_feeds(&self) -> Result<(), StoreError>;
}

#[async_trait]
impl<S, F, D> SyncTrigger for PollingWorker<S, F, D>
where
    S: crate::storage::FeedStore + 'static,
    F: FeedFetcher + 'static,
    D: DeliveryClient + 'static,
{
    fn queue_feed(&self, feed_id: i64) {
        PollingWorker::queue_feed(self, feed_id);
    }

    async fn queue_all_feeds(&self) -> Result<(), StoreError> {
        PollingWorker::queue_all_feeds(self).await
    }
}

/// Shared state for the API handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub worker: Arc<dyn SyncTrigger>,
}

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/feeds", get(list_feeds).post(create_feed))
        .route(
            "/feeds/:id",
            axum::routing::put(update_feed).delete(delete_feed),
        )
        .route("/feeds/:id/sync", post(sync_feed))
        .route("/sync", post(sync_all))
        .route("/articles", get(list_articles))
        .route(
            "/settings/poll-interval",
            get(get_poll_interval).put(put_poll_interval),
        );

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
