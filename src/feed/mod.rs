//! Feed retrieval: RSS/Atom fetching, parsing, and the historical-sync
//! policies applied on a feed's first poll.
//!
//! [`parser`] maps a raw document to article records (title, link, resolved
//! published date); [`fetcher`] owns the HTTP transport and the
//! none/all/count/date_from policy filters.

mod fetcher;
mod parser;

pub(crate) use fetcher::apply_sync_policy;
pub use fetcher::{FeedFetcher, FetchError, HttpFetcher};
