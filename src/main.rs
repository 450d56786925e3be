// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Workout-Sync API Server
//!
//! Pulls activities from Strava and Intervals.icu and creates one local
//! workout record per remote activity.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use workout_sync::{
    config::Config,
    db::{CredentialStore, Ledgers, LocalCredentialStore},
    services::{HttpRecordBackend, IntervalsClient, StravaClient},
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Workout-Sync API");

    // Credential store and ledgers live on disk only when DATA_DIR is set
    let (store, ledgers) = match &config.data_dir {
        Some(dir) => {
            tokio::fs::create_dir_all(dir).await?;
            let store = LocalCredentialStore::open(dir.join("credentials.json")).await?;
            (store, Ledgers::open(dir).await?)
        }
        None => {
            tracing::warn!("DATA_DIR not set, sync state will not survive a restart");
            (LocalCredentialStore::in_memory(), Ledgers::in_memory())
        }
    };
    let credentials: Arc<dyn CredentialStore> = Arc::new(store);
    tracing::info!(
        strava = ledgers.strava.len(),
        intervals = ledgers.intervals.len(),
        "Sync ledgers loaded"
    );

    let backend = Arc::new(HttpRecordBackend::new(
        &config.record_backend_url,
        config.backend_timeout,
    ));
    tracing::info!(url = %config.record_backend_url, "Record backend configured");

    let state = AppState::new(
        config.clone(),
        credentials,
        ledgers,
        StravaClient::new(config.provider_timeout),
        IntervalsClient::new(config.provider_timeout),
        backend,
    );
    state.seed_credentials().await?;

    // Build router
    let app = workout_sync::routes::create_router(Arc::new(state));

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured logging: JSON by default, `LOG_FORMAT=pretty` for
/// human-readable output during local development.
fn init_logging() {
    let mut filter = EnvFilter::from_default_env();
    for directive in ["workout_sync=debug", "info"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    let registry = tracing_subscriber::registry().with(filter);
    if std::env::var("LOG_FORMAT").as_deref() == Ok("pretty") {
        registry.with(tracing_subscriber::fmt::layer()).init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .with_current_span(true)
                    .flatten_event(true),
            )
            .init();
    }
}
