// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Storage layer: provider credentials and the per-provider sync ledgers.

pub mod credentials;
pub mod ledger;

pub use credentials::{CredentialStore, LocalCredentialStore, SettingsRepository};
pub use ledger::{Ledgers, SyncLedger};

use crate::error::AppError;
use serde::Serialize;
use std::path::Path;

/// Credential store key names.
pub mod keys {
    pub const STRAVA_CLIENT_ID: &str = "strava.client_id";
    pub const STRAVA_CLIENT_SECRET: &str = "strava.client_secret";
    pub const STRAVA_ACCESS_TOKEN: &str = "strava.access_token";
    pub const STRAVA_REFRESH_TOKEN: &str = "strava.refresh_token";
    pub const STRAVA_EXPIRES_AT: &str = "strava.expires_at";
    pub const STRAVA_ATHLETE_ID: &str = "strava.athlete_id";
    pub const STRAVA_ATHLETE_NAME: &str = "strava.athlete_name";

    /// Every Strava key; removed together on disconnect.
    pub const STRAVA_ALL: [&str; 7] = [
        STRAVA_CLIENT_ID,
        STRAVA_CLIENT_SECRET,
        STRAVA_ACCESS_TOKEN,
        STRAVA_REFRESH_TOKEN,
        STRAVA_EXPIRES_AT,
        STRAVA_ATHLETE_ID,
        STRAVA_ATHLETE_NAME,
    ];

    pub const INTERVALS_API_KEY: &str = "intervals.api_key";
    pub const INTERVALS_ATHLETE_ID: &str = "intervals.athlete_id";
    pub const INTERVALS_WEBHOOK_SECRET: &str = "intervals.webhook_secret";
}

/// Write `value` as pretty JSON, replacing `path` atomically.
pub(crate) async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), AppError> {
    let body = serde_json::to_vec_pretty(value)
        .map_err(|e| AppError::Storage(format!("Failed to serialize {}: {}", path.display(), e)))?;

    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, body)
        .await
        .map_err(|e| AppError::Storage(format!("Failed to write {}: {}", tmp.display(), e)))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| AppError::Storage(format!("Failed to replace {}: {}", path.display(), e)))?;
    Ok(())
}

/// Read a JSON file, returning `None` if it does not exist yet.
pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(
    path: &Path,
) -> Result<Option<T>, AppError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| AppError::Storage(format!("Corrupt file {}: {}", path.display(), e))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AppError::Storage(format!(
            "Failed to read {}: {}",
            path.display(),
            e
        ))),
    }
}
