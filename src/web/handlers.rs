//! JSON handlers for the narrow worker/store touchpoints: feed CRUD, sync
//! triggers, delivered articles, and the global poll interval.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::AppState;
use crate::storage::{Article, Feed, IntervalUnit, NewFeed, SyncMode};

// ============================================================================
// Request / Response Types
// ============================================================================

/// Body for creating or editing a feed. Omitted cadence/sync fields fall
/// back to the same defaults the store applies on read.
#[derive(Debug, Deserialize)]
pub struct FeedRequest {
    pub url: String,
    pub name: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval: i64,
    #[serde(default = "default_poll_interval_unit")]
    pub poll_interval_unit: IntervalUnit,
    #[serde(default = "default_sync_mode")]
    pub sync_mode: SyncMode,
    #[serde(default)]
    pub sync_count: Option<i64>,
    #[serde(default)]
    pub sync_date_from: Option<i64>,
}

fn default_poll_interval() -> i64 {
    1
}

fn default_poll_interval_unit() -> IntervalUnit {
    IntervalUnit::Days
}

fn default_sync_mode() -> SyncMode {
    SyncMode::None
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PollIntervalBody {
    pub minutes: i64,
}

/// The fetcher only speaks http(s); reject anything else up front.
fn validate_feed_url(raw: &str) -> Result<(), ApiError> {
    match url::Url::parse(raw) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        Ok(parsed) => Err(ApiError::bad_request(format!(
            "unsupported URL scheme {:?}",
            parsed.scheme()
        ))),
        Err(e) => Err(ApiError::bad_request(format!("invalid feed URL: {}", e))),
    }
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn health_check() -> &'static str {
    "OK"
}

pub async fn list_feeds(State(state): State<AppState>) -> Result<Json<Vec<Feed>>, ApiError> {
    Ok(Json(state.db.get_feeds().await?))
}

/// Create a feed and queue it for an immediate first poll.
pub async fn create_feed(
    State(state): State<AppState>,
    Json(req): Json<FeedRequest>,
) -> Result<(StatusCode, Json<Feed>), ApiError> {
    validate_feed_url(&req.url)?;
    let new = NewFeed {
        url: req.url,
        name: req.name,
        poll_interval: req.poll_interval,
        poll_interval_unit: req.poll_interval_unit,
        sync_mode: req.sync_mode,
        sync_count: req.sync_count,
        sync_date_from: req.sync_date_from,
    };
    let id = state.db.insert_feed(&new).await?;
    state.worker.queue_feed(id);

    let feed = state.db.get_feed_by_id(id).await?;
    Ok((StatusCode::CREATED, Json(feed)))
}

/// Edit a feed's user-settable fields and queue it for re-sync.
pub async fn update_feed(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<FeedRequest>,
) -> Result<Json<Feed>, ApiError> {
    validate_feed_url(&req.url)?;
    let mut feed = state.db.get_feed_by_id(id).await?;
    feed.url = req.url;
    feed.name = req.name;
    feed.set_poll_interval(req.poll_interval, req.poll_interval_unit);
    feed.sync_mode = req.sync_mode;
    feed.sync_count = req.sync_count;
    feed.sync_date_from = req.sync_date_from;
    state.db.update_feed(&feed).await?;
    state.worker.queue_feed(id);

    Ok(Json(state.db.get_feed_by_id(id).await?))
}

pub async fn delete_feed(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.db.delete_feed(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Queue one feed for immediate processing. Fire-and-forget: a full queue
/// is logged, never reported here.
pub async fn sync_feed(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    // 404 for unknown IDs; the enqueue itself cannot fail visibly
    state.db.get_feed_by_id(id).await?;
    state.worker.queue_feed(id);
    Ok(StatusCode::ACCEPTED)
}

/// Queue every feed for immediate processing, best-effort.
pub async fn sync_all(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.worker.queue_all_feeds().await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn list_articles(State(state): State<AppState>) -> Result<Json<Vec<Article>>, ApiError> {
    Ok(Json(state.db.get_articles().await?))
}

pub async fn get_poll_interval(
    State(state): State<AppState>,
) -> Result<Json<PollIntervalBody>, ApiError> {
    let minutes = state.db.get_default_poll_interval().await?;
    Ok(Json(PollIntervalBody { minutes }))
}

pub async fn put_poll_interval(
    State(state): State<AppState>,
    Json(body): Json<PollIntervalBody>,
) -> Result<Json<PollIntervalBody>, ApiError> {
    if body.minutes <= 0 {
        return Err(ApiError::bad_request("minutes must be positive"));
    }
    state.db.update_default_poll_interval(body.minutes).await?;
    Ok(Json(body))
}

// ============================================================================
// Tests
// ============================================================================
