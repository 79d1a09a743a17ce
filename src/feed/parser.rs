use anyhow::Result;
use chrono::Utc;
use feed_rs::parser;

use crate::storage::NewArticle;

/// Parsed feed document: usable articles plus the count of entries dropped
/// for missing a title or link.
#[derive(Debug)]
pub(crate) struct ParseOutcome {
    pub articles: Vec<NewArticle>,
    pub skipped: usize,
}

/// Parse an RSS/Atom document into article records.
///
/// Entries without a title or a link are dropped (hard filter). The
/// published date resolves in priority order: entry published → entry
/// updated → feed-level published → current wall-clock time, so every
/// returned article carries a date.
pub(crate) fn parse_feed(bytes: &[u8]) -> Result<ParseOutcome> {
    let feed = parser::parse(bytes)?;

    let feed_published = feed.published.map(|dt| dt.timestamp());
    let mut skipped = 0;

    let articles: Vec<NewArticle> = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let title = entry
                .title
                .map(|t| t.content)
                .filter(|t| !t.trim().is_empty());
            let url = entry.links.first().map(|l| l.href.clone());

            let (Some(title), Some(url)) = (title, url) else {
                skipped += 1;
                return None;
            };

            let published_at = entry
                .published
                .or(entry.updated)
                .map(|dt| dt.timestamp())
                .or(feed_published)
                .unwrap_or_else(|| Utc::now().timestamp());

            Some(NewArticle {
                title,
                url,
                published_at: Some(published_at),
            })
        })
        .collect();

    Ok(ParseOutcome { articles, skipped })
}
