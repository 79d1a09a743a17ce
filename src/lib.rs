//! wallafeed: polls RSS/Atom feeds on a schedule, deduplicates articles
//! against a local SQLite store, and forwards new articles to a wallabag
//! instance via its OAuth2 API.
//!
//! Module map:
//!
//! - [`config`] - environment-variable configuration
//! - [`feed`] - RSS/Atom fetching, parsing, and initial-sync policies
//! - [`storage`] - SQLite persistence (feeds, delivered articles, settings)
//! - [`wallabag`] - OAuth2 delivery client
//! - [`worker`] - the polling worker: scheduled sweep + priority queue
//! - [`web`] - JSON API over the worker and store

pub mod config;
pub mod feed;
pub mod storage;
pub mod wallabag;
pub mod web;
pub mod worker;
