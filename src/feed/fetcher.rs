use std::cmp::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use thiserror::Error;

use crate::feed::parser::parse_feed;
use crate::storage::{NewArticle, SyncMode};

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors from fetching and parsing a feed document.
///
/// Every variant names the feed URL: a fetch failure surfaces as one
/// wrapped error for the whole feed, never partial results.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("request failed for {url}: {source}")]
    Network { url: String, source: reqwest::Error },
    /// HTTP response with non-2xx status code
    #[error("HTTP status {status} for {url}")]
    HttpStatus { url: String, status: u16 },
    /// Request exceeded the 30-second timeout
    #[error("request timed out for {url}")]
    Timeout { url: String },
    /// Document could not be parsed as RSS or Atom
    #[error("feed parse failed for {url}: {message}")]
    Parse { url: String, message: String },
    /// Response body exceeded the 10MB size limit
    #[error("response too large for {url}")]
    ResponseTooLarge { url: String },
}

/// Feed retrieval, substitutable in worker tests.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Retrieve and parse the feed at `url` into ordered article records.
    async fn fetch(&self, url: &str) -> Result<Vec<NewArticle>, FetchError>;

    /// Like [`fetch`](FeedFetcher::fetch), then apply the historical-sync
    /// policy for a feed's first poll.
    async fn fetch_with_sync_options(
        &self,
        url: &str,
        mode: SyncMode,
        sync_count: Option<i64>,
        sync_date_from: Option<i64>,
    ) -> Result<Vec<NewArticle>, FetchError>;
}

/// HTTP implementation over a shared reqwest client.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FeedFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<NewArticle>, FetchError> {
        let response = tokio::time::timeout(FETCH_TIMEOUT, self.client.get(url).send())
            .await
            .map_err(|_| FetchError::Timeout {
                url: url.to_string(),
            })?
            .map_err(|e| FetchError::Network {
                url: url.to_string(),
                source: e,
            })?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let bytes = read_limited_bytes(response, url, MAX_FEED_SIZE).await?;

        let outcome = parse_feed(&bytes).map_err(|e| FetchError::Parse {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        if outcome.skipped > 0 {
            tracing::warn!(
                feed = %url,
                skipped = outcome.skipped,
                "Dropped feed items missing a title or link"
            );
        }

        Ok(outcome.articles)
    }

    async fn fetch_with_sync_options(
        &self,
        url: &str,
        mode: SyncMode,
        sync_count: Option<i64>,
        sync_date_from: Option<i64>,
    ) -> Result<Vec<NewArticle>, FetchError> {
        let articles = self.fetch(url).await?;
        Ok(apply_sync_policy(url, articles, mode, sync_count, sync_date_from))
    }
}

/// Apply a historical-sync policy to freshly fetched articles.
///
/// Returned articles are always in ascending published order so delivery
/// happens oldest-first.
pub(crate) fn apply_sync_policy(
    url: &str,
    mut articles: Vec<NewArticle>,
    mode: SyncMode,
    sync_count: Option<i64>,
    sync_date_from: Option<i64>,
) -> Vec<NewArticle> {
    match mode {
        // Already-initialized feeds and "only future items" both land here.
        SyncMode::None => Vec::new(),
        SyncMode::All => {
            sort_published_ascending(&mut articles);
            articles
        }
        SyncMode::Count => {
            let count = match sync_count {
                Some(n) if n > 0 => n as usize,
                _ => {
                    tracing::warn!(feed = %url, "Sync mode is count but sync_count is unset or non-positive");
                    return Vec::new();
                }
            };
            sort_published_descending(&mut articles);
            articles.truncate(count);
            sort_published_ascending(&mut articles);
            articles
        }
        SyncMode::DateFrom => {
            let Some(date_from) = sync_date_from else {
                tracing::warn!(feed = %url, "Sync mode is date_from but sync_date_from is unset");
                return Vec::new();
            };
            // Inclusive boundary: published == date_from is kept.
            articles.retain(|a| a.published_at.is_some_and(|p| p >= date_from));
            sort_published_ascending(&mut articles);
            articles
        }
    }
}

/// Dateless articles sort to the most-recent end in either direction: last
/// ascending, first descending. The parser resolves missing dates to "now",
/// so a `None` here only arises from defensive paths.
fn cmp_published(a: Option<i64>, b: Option<i64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(&y),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
    }
}

fn sort_published_ascending(articles: &mut [NewArticle]) {
    articles.sort_by(|a, b| cmp_published(a.published_at, b.published_at));
}

fn sort_published_descending(articles: &mut [NewArticle]) {
    articles.sort_by(|a, b| cmp_published(b.published_at, a.published_at));
}

async fn read_limited_bytes(
    response: reqwest::Response,
    url: &str,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge {
                url: url.to_string(),
            });
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| FetchError::Network {
            url: url.to_string(),
            source: e,
        })?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge {
                url: url.to_string(),
            });
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn article(url: &str, published_at: Option<i64>) -> NewArticle {
        NewArticle {
            title: format!("Article {}", url),
            url: url.to_string(),
            published_at,
        }
    }

    fn dated_articles() -> Vec<NewArticle> {
        vec![
            article("https://example.com/3", Some(300)),
            article("https://example.com/1", Some(100)),
            article("https://example.com/2", Some(200)),
        ]
    }

    fn urls(articles: &[NewArticle]) -> Vec<&str> {
        articles.iter().map(|a| a.url.as_str()).collect()
    }

    // ========================================================================
    // Sync Policy Tests
    // ========================================================================

    #[test]
    fn test_policy_none_discards_everything() {
        let out = apply_sync_policy("u", dated_articles(), SyncMode::None, None, None);
        assert!(out.is_empty());
    }

    #[test]
    fn test_policy_all_sorts_ascending() {
        let out = apply_sync_policy("u", dated_articles(), SyncMode::All, None, None);
        assert_eq!(
            urls(&out),
            vec![
                "https://example.com/1",
                "https://example.com/2",
                "https://example.com/3"
            ]
        );
    }

    #[test]
    fn test_policy_count_takes_most_recent_in_ascending_order() {
        let out = apply_sync_policy("u", dated_articles(), SyncMode::Count, Some(2), None);
        // The two most recent (200, 300), oldest of those first
        assert_eq!(
            urls(&out),
            vec!["https://example.com/2", "https://example.com/3"]
        );
    }

    #[test]
    fn test_policy_count_exceeding_available_returns_all() {
        let out = apply_sync_policy("u", dated_articles(), SyncMode::Count, Some(10), None);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].published_at, Some(100));
    }

    #[test]
    fn test_policy_count_without_count_is_empty() {
        assert!(apply_sync_policy("u", dated_articles(), SyncMode::Count, None, None).is_empty());
        assert!(apply_sync_policy("u", dated_articles(), SyncMode::Count, Some(0), None).is_empty());
        assert!(apply_sync_policy("u", dated_articles(), SyncMode::Count, Some(-3), None).is_empty());
    }

    #[test]
    fn test_policy_date_from_inclusive_boundary() {
        let out = apply_sync_policy("u", dated_articles(), SyncMode::DateFrom, None, Some(200));
        // 200 itself is kept (inclusive), 100 is filtered out
        assert_eq!(
            urls(&out),
            vec!["https://example.com/2", "https://example.com/3"]
        );
    }

    #[test]
    fn test_policy_date_from_without_date_is_empty() {
        assert!(apply_sync_policy("u", dated_articles(), SyncMode::DateFrom, None, None).is_empty());
    }

    #[test]
    fn test_dateless_articles_sort_to_most_recent_end() {
        let mut with_none = dated_articles();
        with_none.push(article("https://example.com/undated", None));

        let asc = apply_sync_policy("u", with_none.clone(), SyncMode::All, None, None);
        assert_eq!(asc.last().unwrap().url, "https://example.com/undated");

        // Descending order puts the dateless article first, so count=1
        // selects it as "most recent".
        let top = apply_sync_policy("u", with_none, SyncMode::Count, Some(1), None);
        assert_eq!(urls(&top), vec!["https://example.com/undated"]);
    }

    // ========================================================================
    // HTTP Fetch Tests
    // ========================================================================

    const VALID_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <item>
        <title>One</title>
        <link>https://example.com/1</link>
        <pubDate>Mon, 01 Jan 2024 00:00:00 GMT</pubDate>
    </item>
    <item>
        <title>Two</title>
        <link>https://example.com/2</link>
        <pubDate>Tue, 02 Jan 2024 00:00:00 GMT</pubDate>
    </item>
</channel></rss>"#;

    async fn mock_feed_server(body: &str, status: u16) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(status)
                    .set_body_string(body)
                    .insert_header("Content-Type", "application/xml"),
            )
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = mock_feed_server(VALID_RSS, 200).await;
        let fetcher = HttpFetcher::new(reqwest::Client::new());

        let articles = fetcher.fetch(&format!("{}/feed", server.uri())).await.unwrap();
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].url, "https://example.com/1");
    }

    #[tokio::test]
    async fn test_fetch_http_error() {
        let server = mock_feed_server("", 404).await;
        let fetcher = HttpFetcher::new(reqwest::Client::new());

        let err = fetcher
            .fetch(&format!("{}/feed", server.uri()))
            .await
            .unwrap_err();
        match err {
            FetchError::HttpStatus { status: 404, .. } => {}
            e => panic!("Expected HttpStatus(404), got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_fetch_parse_error_names_feed_url() {
        let server = mock_feed_server("<not valid xml", 200).await;
        let fetcher = HttpFetcher::new(reqwest::Client::new());
        let url = format!("{}/feed", server.uri());

        let err = fetcher.fetch(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::Parse { .. }));
        assert!(err.to_string().contains(&url));
    }

    #[tokio::test]
    async fn test_fetch_response_too_large() {
        let server = MockServer::start().await;
        let body = "x".repeat(MAX_FEED_SIZE + 1);
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;
        let fetcher = HttpFetcher::new(reqwest::Client::new());

        let err = fetcher
            .fetch(&format!("{}/feed", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::ResponseTooLarge { .. }));
    }

    #[tokio::test]
    async fn test_fetch_with_sync_options_applies_policy() {
        let server = mock_feed_server(VALID_RSS, 200).await;
        let fetcher = HttpFetcher::new(reqwest::Client::new());
        let url = format!("{}/feed", server.uri());

        let none = fetcher
            .fetch_with_sync_options(&url, SyncMode::None, None, None)
            .await
            .unwrap();
        assert!(none.is_empty());

        let newest = fetcher
            .fetch_with_sync_options(&url, SyncMode::Count, Some(1), None)
            .await
            .unwrap();
        assert_eq!(newest.len(), 1);
        assert_eq!(newest[0].url, "https://example.com/2");
    }
}
