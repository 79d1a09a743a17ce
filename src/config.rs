//! Environment-variable configuration.
//!
//! The wallabag connection settings are required and checked together so a
//! misconfigured deployment fails fast with one complete message. Database
//! path and listen port are optional with defaults. `main` loads `.env`
//! via dotenvy before reading, with real environment variables winning.

use secrecy::SecretString;
use thiserror::Error;

use crate::wallabag::WallabagCredentials;

pub const DEFAULT_DATABASE_PATH: &str = "wallafeed.db";
pub const DEFAULT_LISTEN_PORT: u16 = 8080;

const REQUIRED_VARS: [&str; 5] = [
    "WALLABAG_URL",
    "WALLABAG_CLIENT_ID",
    "WALLABAG_CLIENT_SECRET",
    "WALLABAG_USERNAME",
    "WALLABAG_PASSWORD",
];

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    /// One or more required variables are unset. Fatal at startup.
    #[error("missing required environment variables: {0}")]
    MissingRequired(String),

    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

// ============================================================================
// Configuration
// ============================================================================

/// Process configuration resolved from the environment.
///
/// Custom `Debug` masks the OAuth secret and password so the config can be
/// logged at startup without leaking credentials.
#[derive(Clone)]
pub struct Config {
    pub wallabag_url: String,
    pub wallabag_client_id: String,
    pub wallabag_client_secret: SecretString,
    pub wallabag_username: String,
    pub wallabag_password: SecretString,
    pub database_path: String,
    pub listen_port: u16,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("wallabag_url", &self.wallabag_url)
            .field("wallabag_client_id", &self.wallabag_client_id)
            .field("wallabag_client_secret", &"[REDACTED]")
            .field("wallabag_username", &self.wallabag_username)
            .field("wallabag_password", &"[REDACTED]")
            .field("database_path", &self.database_path)
            .field("listen_port", &self.listen_port)
            .finish()
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration from an arbitrary variable source.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // Empty counts as unset so a stray `VAR=` line doesn't slip through
        let get = |var: &str| lookup(var).filter(|v| !v.is_empty());

        let (Some(url), Some(client_id), Some(client_secret), Some(username), Some(password)) = (
            get("WALLABAG_URL"),
            get("WALLABAG_CLIENT_ID"),
            get("WALLABAG_CLIENT_SECRET"),
            get("WALLABAG_USERNAME"),
            get("WALLABAG_PASSWORD"),
        ) else {
            // Report every missing variable in one message
            let missing: Vec<&str> = REQUIRED_VARS
                .iter()
                .copied()
                .filter(|var| get(var).is_none())
                .collect();
            return Err(ConfigError::MissingRequired(missing.join(", ")));
        };

        let listen_port = match lookup("LISTEN_PORT") {
            None => DEFAULT_LISTEN_PORT,
            Some(raw) => raw.parse::<u16>().map_err(|_| ConfigError::Invalid {
                var: "LISTEN_PORT",
                value: raw,
            })?,
        };

        Ok(Self {
            wallabag_url: url,
            wallabag_client_id: client_id,
            wallabag_client_secret: SecretString::from(client_secret),
            wallabag_username: username,
            wallabag_password: SecretString::from(password),
            database_path: lookup("DATABASE_PATH")
                .unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string()),
            listen_port,
        })
    }

    /// Credentials bundle for the delivery client.
    pub fn wallabag_credentials(&self) -> WallabagCredentials {
        WallabagCredentials {
            client_id: self.wallabag_client_id.clone(),
            client_secret: self.wallabag_client_secret.clone(),
            username: self.wallabag_username.clone(),
            password: self.wallabag_password.clone(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
