//! Delivery of article URLs to a wallabag instance over its OAuth2 API.

mod client;

pub use client::{
    DeliveryClient, DeliveryError, RemoteEntry, WallabagClient, WallabagCredentials,
};
