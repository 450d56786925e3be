// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Provider credentials given here are only used to seed the credential
//! store at startup; after that the store is the source of truth (tokens
//! rotate on every refresh).

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Server ---
    /// Server port
    pub port: u16,
    /// Frontend URL for CORS and OAuth redirects
    pub frontend_url: String,
    /// Public base URL of this API (used to build the OAuth callback)
    pub api_url: String,
    /// Bearer token required on `/api/*` routes
    pub api_token: String,
    /// HMAC key used to sign the OAuth `state` parameter
    pub oauth_state_key: Vec<u8>,

    // --- Downstream record backend ---
    pub record_backend_url: String,
    pub backend_timeout: Duration,
    pub provider_timeout: Duration,

    // --- Credential seeds (optional) ---
    pub strava_client_id: Option<String>,
    pub strava_client_secret: Option<String>,
    pub intervals_api_key: Option<String>,
    pub intervals_athlete_id: Option<String>,
    pub intervals_webhook_secret: Option<String>,

    /// Directory for the ledger and credential files; in-memory only if unset.
    pub data_dir: Option<PathBuf>,

    pub sync: SyncSettings,
}

/// Tuning for bulk fetches.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub page_size: u32,
    pub max_pages: u32,
    /// Pause after every `throttle_every` provider requests.
    pub throttle_every: u32,
    pub cooldown: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            page_size: 50,
            max_pages: 10,
            throttle_every: 10,
            cooldown: Duration::from_secs(1),
        }
    }
}

impl Config {
    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            port: 8080,
            frontend_url: "http://localhost:5173".to_string(),
            api_url: "http://localhost:8080".to_string(),
            api_token: "test_api_token".to_string(),
            oauth_state_key: b"test_oauth_state_key_32_bytes!!!".to_vec(),
            record_backend_url: "http://localhost:8000".to_string(),
            backend_timeout: Duration::from_secs(5),
            provider_timeout: Duration::from_secs(5),
            strava_client_id: None,
            strava_client_secret: None,
            intervals_api_key: None,
            intervals_athlete_id: None,
            intervals_webhook_secret: None,
            data_dir: None,
            sync: SyncSettings {
                cooldown: Duration::ZERO,
                ..SyncSettings::default()
            },
        }
    }

    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = SyncSettings::default();

        Ok(Self {
            port: parse_var("PORT", 8080)?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            api_url: env::var("API_URL").unwrap_or_else(|_| "http://localhost:8080".to_string()),
            api_token: env::var("API_TOKEN")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("API_TOKEN"))?,
            oauth_state_key: env::var("OAUTH_STATE_KEY")
                .map_err(|_| ConfigError::Missing("OAUTH_STATE_KEY"))?
                .into_bytes(),

            record_backend_url: env::var("RECORD_BACKEND_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            backend_timeout: Duration::from_secs(parse_var("BACKEND_TIMEOUT_SECS", 30)?),
            provider_timeout: Duration::from_secs(parse_var("PROVIDER_TIMEOUT_SECS", 30)?),

            strava_client_id: optional_var("STRAVA_CLIENT_ID"),
            strava_client_secret: optional_var("STRAVA_CLIENT_SECRET"),
            intervals_api_key: optional_var("INTERVALS_API_KEY"),
            intervals_athlete_id: optional_var("INTERVALS_ATHLETE_ID"),
            intervals_webhook_secret: optional_var("INTERVALS_WEBHOOK_SECRET"),

            data_dir: optional_var("DATA_DIR").map(PathBuf::from),

            sync: SyncSettings {
                page_size: parse_var("SYNC_PAGE_SIZE", defaults.page_size)?,
                max_pages: parse_var("SYNC_MAX_PAGES", defaults.max_pages)?,
                throttle_every: parse_var("SYNC_THROTTLE_EVERY", defaults.throttle_every)?,
                cooldown: Duration::from_millis(parse_var("SYNC_COOLDOWN_MS", 1000)?),
            },
        })
    }
}

/// Read an env var, treating blank values as unset.
fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match optional_var(name) {
        Some(raw) => raw
            .parse()
            .map_err(|e: T::Err| ConfigError::Invalid(name, e.to_string())),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        env::set_var("API_TOKEN", "test_token");
        env::set_var("OAUTH_STATE_KEY", "state_key");
        env::set_var("INTERVALS_WEBHOOK_SECRET", "  ");
        env::set_var("SYNC_MAX_PAGES", "4");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.api_token, "test_token");
        assert_eq!(config.port, 8080);
        assert_eq!(config.backend_timeout, Duration::from_secs(30));
        assert!(config.intervals_webhook_secret.is_none());
        assert_eq!(config.sync.max_pages, 4);
        assert_eq!(config.sync.page_size, 50);

        env::set_var("SYNC_PAGE_SIZE", "fifty");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("SYNC_PAGE_SIZE", _)));
        env::remove_var("SYNC_PAGE_SIZE");
    }
}
