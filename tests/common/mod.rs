// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use workout_sync::config::Config;
use workout_sync::db::{Ledgers, LocalCredentialStore};
use workout_sync::error::AppError;
use workout_sync::models::RecordDraft;
use workout_sync::routes::create_router;
use workout_sync::services::{CreatedRecord, IntervalsClient, RecordBackend, StravaClient};
use workout_sync::AppState;

/// Record backend that keeps every draft in memory.
#[derive(Default)]
pub struct FakeBackend {
    unhealthy: AtomicBool,
    created: AtomicUsize,
    drafts: Mutex<Vec<RecordDraft>>,
}

#[allow(dead_code)]
impl FakeBackend {
    pub fn set_healthy(&self, healthy: bool) {
        self.unhealthy.store(!healthy, Ordering::SeqCst);
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn drafts(&self) -> Vec<RecordDraft> {
        self.drafts.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordBackend for FakeBackend {
    async fn health_check(&self) -> bool {
        !self.unhealthy.load(Ordering::SeqCst)
    }

    async fn create_record(&self, draft: &RecordDraft) -> Result<CreatedRecord, AppError> {
        // Widen the window for racing callers.
        tokio::time::sleep(Duration::from_millis(10)).await;
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        self.drafts.lock().unwrap().push(draft.clone());
        Ok(CreatedRecord {
            id: format!("rec_{}", n),
        })
    }
}

/// Create a test app with in-memory stores and the fake backend.
/// Provider clients point at `provider_url` (a mock server, or nothing).
#[allow(dead_code)]
pub async fn create_test_app_with(
    config: Config,
    provider_url: &str,
) -> (axum::Router, Arc<AppState>, Arc<FakeBackend>) {
    let backend = Arc::new(FakeBackend::default());
    let timeout = Duration::from_secs(5);

    let state = AppState::new(
        config,
        Arc::new(LocalCredentialStore::in_memory()),
        Ledgers::in_memory(),
        StravaClient::with_base_urls(provider_url, &format!("{}/oauth", provider_url), timeout),
        IntervalsClient::with_base_url(provider_url, timeout),
        backend.clone(),
    );
    state
        .seed_credentials()
        .await
        .expect("Seeding credentials should succeed");

    let state = Arc::new(state);
    (create_router(state.clone()), state, backend)
}

/// Create a test app with the default test config.
#[allow(dead_code)]
pub async fn create_test_app() -> (axum::Router, Arc<AppState>, Arc<FakeBackend>) {
    create_test_app_with(Config::test_default(), "http://127.0.0.1:9").await
}

/// Read a JSON response body.
#[allow(dead_code)]
pub async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
