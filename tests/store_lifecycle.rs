//! Integration tests for the store lifecycle: create, edit, deliver, delete.
//!
//! Each test creates its own in-memory SQLite database for isolation.
//! These tests exercise the storage layer end-to-end, verifying that
//! operations compose correctly across feeds, articles, and settings.

use wallafeed::storage::{Database, IntervalUnit, NewArticle, NewFeed, StoreError, SyncMode};

async fn test_db() -> Database {
    Database::open(":memory:").await.unwrap()
}

fn test_article(url: &str) -> NewArticle {
    NewArticle {
        title: format!("Article {}", url),
        url: url.to_string(),
        published_at: Some(1_700_000_000),
    }
}

// ============================================================================
// Feed Lifecycle
// ============================================================================

#[tokio::test]
async fn test_created_feed_appears_in_list() {
    let db = test_db().await;

    let id = db
        .insert_feed(&NewFeed::new("https://example.com/feed.xml", "Example"))
        .await
        .unwrap();
    assert!(id > 0);

    let feeds = db.get_feeds().await.unwrap();
    assert_eq!(feeds.len(), 1);
    assert_eq!(feeds[0].url, "https://example.com/feed.xml");
    assert_eq!(feeds[0].name, "Example");
    assert!(!feeds[0].initial_sync_done);
}

#[tokio::test]
async fn test_feed_edit_cycle_keeps_interval_consistent() {
    let db = test_db().await;
    let id = db
        .insert_feed(&NewFeed::new("https://example.com/feed.xml", "Example"))
        .await
        .unwrap();

    let mut feed = db.get_feed_by_id(id).await.unwrap();
    feed.name = "Renamed".into();
    feed.set_poll_interval(90, IntervalUnit::Minutes);
    db.update_feed(&feed).await.unwrap();

    let feed = db.get_feed_by_id(id).await.unwrap();
    assert_eq!(feed.name, "Renamed");
    assert_eq!(feed.poll_interval_minutes, 90);

    // The derived column always matches its raw pair
    assert_eq!(
        feed.poll_interval_minutes,
        feed.poll_interval * feed.poll_interval_unit.minutes_factor()
    );
}

#[tokio::test]
async fn test_sync_settings_survive_round_trip() {
    let db = test_db().await;
    let mut new = NewFeed::new("https://example.com/feed.xml", "Example");
    new.sync_mode = SyncMode::DateFrom;
    new.sync_date_from = Some(1_704_067_200);
    let id = db.insert_feed(&new).await.unwrap();

    let feed = db.get_feed_by_id(id).await.unwrap();
    assert_eq!(feed.sync_mode, SyncMode::DateFrom);
    assert_eq!(feed.sync_date_from, Some(1_704_067_200));
}

#[tokio::test]
async fn test_delete_feed_removes_feed_and_articles() {
    let db = test_db().await;
    let id = db
        .insert_feed(&NewFeed::new("https://example.com/feed.xml", "Example"))
        .await
        .unwrap();
    db.save_article(id, &test_article("https://example.com/1"), Some(5))
        .await
        .unwrap();
    db.save_article(id, &test_article("https://example.com/2"), Some(6))
        .await
        .unwrap();

    db.delete_feed(id).await.unwrap();

    assert!(db.get_feeds().await.unwrap().is_empty());
    assert!(db.get_articles().await.unwrap().is_empty());
    // The URLs are free again after the cascade
    assert!(!db
        .is_article_processed("https://example.com/1")
        .await
        .unwrap());
}

// ============================================================================
// Article Dedup Across Feeds
// ============================================================================

#[tokio::test]
async fn test_article_url_is_globally_unique_across_feeds() {
    let db = test_db().await;
    let feed_a = db
        .insert_feed(&NewFeed::new("https://a.example.com/feed.xml", "A"))
        .await
        .unwrap();
    let feed_b = db
        .insert_feed(&NewFeed::new("https://b.example.com/feed.xml", "B"))
        .await
        .unwrap();

    let shared = test_article("https://example.com/cross-posted");
    db.save_article(feed_a, &shared, Some(1)).await.unwrap();

    // The same story syndicated by another feed must not be re-recorded
    let err = db.save_article(feed_b, &shared, Some(2)).await.unwrap_err();
    assert!(matches!(err, StoreError::DuplicateUrl(_)));
    assert!(db.is_article_processed(&shared.url).await.unwrap());
}

// ============================================================================
// Settings
// ============================================================================

#[tokio::test]
async fn test_default_poll_interval_seeded_and_tunable() {
    let db = test_db().await;

    // Bootstrap seeds a usable default
    let seeded = db.get_default_poll_interval().await.unwrap();
    assert!(seeded > 0);

    db.update_default_poll_interval(10).await.unwrap();
    assert_eq!(db.get_default_poll_interval().await.unwrap(), 10);
}
