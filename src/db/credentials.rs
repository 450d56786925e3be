// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential storage.
//!
//! The store itself is an opaque key-value table; [`SettingsRepository`]
//! gives typed access to each provider's credential set on top of it.

use crate::db::{keys, read_json, write_json_atomic};
use crate::error::AppError;
use crate::models::{IntervalsSettings, OAuthCredential};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Key-value store for provider secrets and tokens.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Read several keys at once. Missing keys are absent from the result.
    async fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, String>, AppError>;

    /// Write several keys in one step; readers never see a partial update.
    async fn set_many(&self, entries: Vec<(String, String)>) -> Result<(), AppError>;

    /// Remove several keys in one step.
    async fn delete_many(&self, keys: &[&str]) -> Result<(), AppError>;

    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        Ok(self.get_many(&[key]).await?.remove(key))
    }
}

/// In-process credential store, optionally mirrored to a JSON file.
#[derive(Default)]
pub struct LocalCredentialStore {
    entries: RwLock<BTreeMap<String, String>>,
    path: Option<PathBuf>,
}

impl LocalCredentialStore {
    /// Memory-only store (tests, ephemeral deployments).
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Store backed by `path`, loading existing entries if the file exists.
    pub async fn open(path: PathBuf) -> Result<Self, AppError> {
        let entries: BTreeMap<String, String> = read_json(&path).await?.unwrap_or_default();
        tracing::info!(
            path = %path.display(),
            count = entries.len(),
            "Credential store loaded"
        );
        Ok(Self {
            entries: RwLock::new(entries),
            path: Some(path),
        })
    }

    /// Persist `entries`; callers only commit them to memory once this succeeds.
    async fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), AppError> {
        match &self.path {
            Some(path) => write_json_atomic(path, entries).await,
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CredentialStore for LocalCredentialStore {
    async fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, String>, AppError> {
        let entries = self.entries.read().await;
        Ok(keys
            .iter()
            .filter_map(|k| entries.get(*k).map(|v| (k.to_string(), v.clone())))
            .collect())
    }

    async fn set_many(&self, new_entries: Vec<(String, String)>) -> Result<(), AppError> {
        let mut entries = self.entries.write().await;
        let mut next = entries.clone();
        next.extend(new_entries);
        self.flush(&next).await?;
        *entries = next;
        Ok(())
    }

    async fn delete_many(&self, keys: &[&str]) -> Result<(), AppError> {
        let mut entries = self.entries.write().await;
        let mut next = entries.clone();
        for key in keys {
            next.remove(*key);
        }
        self.flush(&next).await?;
        *entries = next;
        Ok(())
    }
}

/// Typed access to provider credential sets.
#[derive(Clone)]
pub struct SettingsRepository {
    store: Arc<dyn CredentialStore>,
}

impl SettingsRepository {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    // ─── Strava ──────────────────────────────────────────────────

    pub async fn strava_credential(&self) -> Result<OAuthCredential, AppError> {
        let mut values = self.store.get_many(&keys::STRAVA_ALL).await?;
        let mut take = |key: &str| values.remove(key).filter(|v| !v.is_empty());

        Ok(OAuthCredential {
            client_id: take(keys::STRAVA_CLIENT_ID),
            client_secret: take(keys::STRAVA_CLIENT_SECRET),
            access_token: take(keys::STRAVA_ACCESS_TOKEN),
            refresh_token: take(keys::STRAVA_REFRESH_TOKEN),
            expires_at: take(keys::STRAVA_EXPIRES_AT).and_then(|v| v.parse().ok()),
            athlete_id: take(keys::STRAVA_ATHLETE_ID),
            athlete_name: take(keys::STRAVA_ATHLETE_NAME),
        })
    }

    /// Store every present field of `credential`.
    pub async fn save_strava_credential(&self, credential: &OAuthCredential) -> Result<(), AppError> {
        let fields = [
            (keys::STRAVA_CLIENT_ID, credential.client_id.clone()),
            (keys::STRAVA_CLIENT_SECRET, credential.client_secret.clone()),
            (keys::STRAVA_ACCESS_TOKEN, credential.access_token.clone()),
            (keys::STRAVA_REFRESH_TOKEN, credential.refresh_token.clone()),
            (
                keys::STRAVA_EXPIRES_AT,
                credential.expires_at.map(|t| t.to_string()),
            ),
            (keys::STRAVA_ATHLETE_ID, credential.athlete_id.clone()),
            (keys::STRAVA_ATHLETE_NAME, credential.athlete_name.clone()),
        ];

        let entries = fields
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k.to_string(), v)))
            .collect();
        self.store.set_many(entries).await
    }

    /// Overwrite the rotating token fields together.
    pub async fn save_strava_tokens(
        &self,
        access_token: &str,
        refresh_token: &str,
        expires_at: i64,
    ) -> Result<(), AppError> {
        self.store
            .set_many(vec![
                (keys::STRAVA_ACCESS_TOKEN.to_string(), access_token.to_string()),
                (
                    keys::STRAVA_REFRESH_TOKEN.to_string(),
                    refresh_token.to_string(),
                ),
                (keys::STRAVA_EXPIRES_AT.to_string(), expires_at.to_string()),
            ])
            .await
    }

    /// Store the app's client id/secret unless already present.
    pub async fn seed_strava_client(
        &self,
        client_id: Option<&str>,
        client_secret: Option<&str>,
    ) -> Result<(), AppError> {
        let (Some(id), Some(secret)) = (client_id, client_secret) else {
            return Ok(());
        };
        let current = self.strava_credential().await?;
        if current.client_id.is_some() && current.client_secret.is_some() {
            return Ok(());
        }
        self.store
            .set_many(vec![
                (keys::STRAVA_CLIENT_ID.to_string(), id.to_string()),
                (keys::STRAVA_CLIENT_SECRET.to_string(), secret.to_string()),
            ])
            .await
    }

    /// Remove the whole Strava credential set.
    pub async fn clear_strava(&self) -> Result<(), AppError> {
        self.store.delete_many(&keys::STRAVA_ALL).await
    }

    // ─── Intervals.icu ───────────────────────────────────────────

    pub async fn intervals_settings(&self) -> Result<IntervalsSettings, AppError> {
        let mut values = self
            .store
            .get_many(&[
                keys::INTERVALS_API_KEY,
                keys::INTERVALS_ATHLETE_ID,
                keys::INTERVALS_WEBHOOK_SECRET,
            ])
            .await?;
        let mut take = |key: &str| values.remove(key).filter(|v| !v.is_empty());

        Ok(IntervalsSettings {
            api_key: take(keys::INTERVALS_API_KEY),
            athlete_id: take(keys::INTERVALS_ATHLETE_ID),
            webhook_secret: take(keys::INTERVALS_WEBHOOK_SECRET),
        })
    }

    /// Store every present field of `settings`.
    pub async fn save_intervals_settings(&self, settings: &IntervalsSettings) -> Result<(), AppError> {
        let entries = [
            (keys::INTERVALS_API_KEY, settings.api_key.clone()),
            (keys::INTERVALS_ATHLETE_ID, settings.athlete_id.clone()),
            (keys::INTERVALS_WEBHOOK_SECRET, settings.webhook_secret.clone()),
        ]
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k.to_string(), v)))
        .collect();
        self.store.set_many(entries).await
    }
}
