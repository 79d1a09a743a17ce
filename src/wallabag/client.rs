use std::time::{Duration, Instant};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Errors from authenticating against or submitting to wallabag.
///
/// Response bodies are deliberately not included in errors: the token
/// endpoint echoes credentials-adjacent detail and entry responses carry
/// page content.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("authentication failed with HTTP status {0}")]
    AuthFailed(u16),
    #[error("entry submission failed with HTTP status {0}")]
    SubmitFailed(u16),
    #[error("request timed out after 20s")]
    Timeout,
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("insecure base URL: HTTPS required (except localhost for testing)")]
    InsecureBaseUrl,
}

/// A saved entry as reported back by wallabag.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteEntry {
    pub id: i64,
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// Entry delivery, substitutable in worker tests.
#[async_trait]
pub trait DeliveryClient: Send + Sync {
    /// Submit a URL as a new saved entry, authenticating first if needed.
    async fn submit(&self, url: &str) -> Result<RemoteEntry, DeliveryError>;
}

/// OAuth2 credentials for the password grant.
#[derive(Clone)]
pub struct WallabagCredentials {
    pub client_id: String,
    pub client_secret: SecretString,
    pub username: String,
    pub password: SecretString,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Seconds until the token expires. The full response also carries
    /// token_type, scope and refresh_token, which this client ignores.
    expires_in: u64,
}

struct CachedToken {
    access_token: SecretString,
    expires_at: Instant,
}

impl CachedToken {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// HTTP client for a wallabag instance.
///
/// Authenticates via the OAuth2 password grant and caches the bearer token
/// until its reported expiry. The token cell is a mutex because one client
/// instance is shared by the sweep task and the priority-queue consumer.
pub struct WallabagClient {
    client: reqwest::Client,
    base_url: String,
    credentials: WallabagCredentials,
    token: Mutex<Option<CachedToken>>,
}

impl WallabagClient {
    /// Create a client for the wallabag instance at `base_url`.
    ///
    /// # Errors
    ///
    /// `DeliveryError::InsecureBaseUrl` unless the URL is HTTPS or points at
    /// localhost (credentials travel in the token request body).
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        credentials: WallabagCredentials,
    ) -> Result<Self, DeliveryError> {
        if !base_url.starts_with("https://") {
            let is_localhost =
                base_url.starts_with("http://127.0.0.1") || base_url.starts_with("http://localhost");
            if !is_localhost {
                tracing::error!(base_url = %base_url, "Rejecting non-HTTPS wallabag URL");
                return Err(DeliveryError::InsecureBaseUrl);
            }
            tracing::warn!(base_url = %base_url, "Using non-HTTPS wallabag URL (localhost only)");
        }

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            token: Mutex::new(None),
        })
    }

    /// Request a bearer token via the password grant.
    async fn authenticate(&self) -> Result<CachedToken, DeliveryError> {
        let params = [
            ("grant_type", "password"),
            ("client_id", &self.credentials.client_id),
            ("client_secret", self.credentials.client_secret.expose_secret()),
            ("username", &self.credentials.username),
            ("password", self.credentials.password.expose_secret()),
        ];

        let response = tokio::time::timeout(
            REQUEST_TIMEOUT,
            self.client
                .post(format!("{}/oauth/v2/token", self.base_url))
                .form(&params)
                .send(),
        )
        .await
        .map_err(|_| DeliveryError::Timeout)?
        .map_err(DeliveryError::Network)?;

        if !response.status().is_success() {
            return Err(DeliveryError::AuthFailed(response.status().as_u16()));
        }

        let token: TokenResponse = response.json().await.map_err(DeliveryError::Network)?;
        tracing::debug!(expires_in = token.expires_in, "Obtained wallabag bearer token");

        Ok(CachedToken {
            access_token: SecretString::from(token.access_token),
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        })
    }
}

#[async_trait]
impl DeliveryClient for WallabagClient {
    async fn submit(&self, url: &str) -> Result<RemoteEntry, DeliveryError> {
        // Hold the lock across refresh so concurrent submits don't both
        // hit the token endpoint.
        let mut guard = self.token.lock().await;
        let token = match guard.as_ref() {
            Some(cached) if !cached.is_expired() => {
                cached.access_token.expose_secret().to_string()
            }
            _ => {
                let fresh = self.authenticate().await?;
                let token = fresh.access_token.expose_secret().to_string();
                *guard = Some(fresh);
                token
            }
        };
        drop(guard);

        let response = tokio::time::timeout(
            REQUEST_TIMEOUT,
            self.client
                .post(format!("{}/api/entries.json", self.base_url))
                .bearer_auth(token)
                .json(&serde_json::json!({ "url": url }))
                .send(),
        )
        .await
        .map_err(|_| DeliveryError::Timeout)?
        .map_err(DeliveryError::Network)?;

        if !response.status().is_success() {
            return Err(DeliveryError::SubmitFailed(response.status().as_u16()));
        }

        response.json().await.map_err(DeliveryError::Network)
    }
}
