// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Workout-Sync: pull workouts from Strava and Intervals.icu into a local
//! record backend.
//!
//! This crate provides the backend API that tracks which remote activities
//! have been seen, normalizes them into canonical workout records and
//! creates each record downstream exactly once.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::{CredentialStore, Ledgers, SettingsRepository};
use error::AppError;
use models::IntervalsSettings;
use services::{
    ActivityFetcher, ActivitySources, IntervalsClient, IntervalsSource, RecordBackend,
    StravaClient, StravaSource, SyncService, TokenBroker, WebhookIngestor,
};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub settings: SettingsRepository,
    pub token_broker: Arc<TokenBroker>,
    pub sync_service: Arc<SyncService>,
    pub webhook: WebhookIngestor,
}

impl AppState {
    /// Wire the services together over the given stores and clients.
    pub fn new(
        config: Config,
        credentials: Arc<dyn CredentialStore>,
        ledgers: Ledgers,
        strava: StravaClient,
        intervals: IntervalsClient,
        backend: Arc<dyn RecordBackend>,
    ) -> Self {
        let settings = SettingsRepository::new(credentials);
        let token_broker = Arc::new(TokenBroker::new(strava, settings.clone()));

        let sources = ActivitySources {
            strava: Arc::new(StravaSource::new(token_broker.clone())),
            intervals: Arc::new(IntervalsSource::new(intervals, settings.clone())),
        };
        let fetcher = ActivityFetcher::new(config.sync.clone());
        let sync_service = Arc::new(SyncService::new(ledgers, backend, fetcher, sources));
        let webhook = WebhookIngestor::new(settings.clone(), sync_service.clone());

        Self {
            config,
            settings,
            token_broker,
            sync_service,
            webhook,
        }
    }

    /// Copy provider credentials from the environment into the store.
    ///
    /// Strava client credentials are only written when absent; Intervals.icu
    /// fields given in the environment always win.
    pub async fn seed_credentials(&self) -> Result<(), AppError> {
        self.settings
            .seed_strava_client(
                self.config.strava_client_id.as_deref(),
                self.config.strava_client_secret.as_deref(),
            )
            .await?;

        let intervals = IntervalsSettings {
            api_key: self.config.intervals_api_key.clone(),
            athlete_id: self.config.intervals_athlete_id.clone(),
            webhook_secret: self.config.intervals_webhook_secret.clone(),
        };
        if intervals != IntervalsSettings::default() {
            self.settings.save_intervals_settings(&intervals).await?;
        }
        Ok(())
    }
}
