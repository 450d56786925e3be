// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Operator API routes.

use crate::error::{AppError, Result};
use crate::models::{ProData, Provider, SportType, SyncedRecord};
use crate::services::{pro_data, StravaStatus, SyncReport};
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Default manual sync window when no dates are given.
const DEFAULT_SYNC_DAYS: u64 = 30;

/// API routes (require the API bearer token).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/status", get(get_status))
        .route("/api/sync/{provider}", post(sync_provider))
        .route("/api/sync/{provider}/reset", post(reset_provider))
        .route("/api/sync/{provider}/records", get(list_records))
        .route("/api/strava/disconnect", post(disconnect_strava))
        .route("/api/pro-data/parse", post(parse_pro_data))
}

fn parse_provider(raw: &str) -> Result<Provider> {
    raw.parse()
}

// ─── Status ──────────────────────────────────────────────────

#[derive(Serialize)]
pub struct IntervalsStatus {
    pub configured: bool,
    pub webhook_secret_set: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub athlete_id: Option<String>,
}

#[derive(Serialize)]
pub struct LedgerCounts {
    pub strava: usize,
    pub intervals: usize,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub strava: StravaStatus,
    pub intervals: IntervalsStatus,
    pub ledger_rows: LedgerCounts,
}

/// Connection status per provider.
async fn get_status(State(state): State<Arc<AppState>>) -> Result<Json<StatusResponse>> {
    let strava = state.token_broker.status().await?;
    let intervals = state.settings.intervals_settings().await?;
    let ledgers = state.sync_service.ledgers();

    Ok(Json(StatusResponse {
        strava,
        intervals: IntervalsStatus {
            configured: intervals.is_configured(),
            webhook_secret_set: intervals.webhook_secret.is_some(),
            athlete_id: intervals.athlete_id,
        },
        ledger_rows: LedgerCounts {
            strava: ledgers.strava.len(),
            intervals: ledgers.intervals.len(),
        },
    }))
}

// ─── Manual Sync ─────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct SyncRequest {
    #[serde(default)]
    pub oldest: Option<NaiveDate>,
    #[serde(default)]
    pub newest: Option<NaiveDate>,
}

impl SyncRequest {
    /// Resolve the window, defaulting to the trailing 30 days.
    pub fn window(&self, today: NaiveDate) -> Result<(NaiveDate, NaiveDate)> {
        let newest = self.newest.unwrap_or(today);
        let oldest = match self.oldest {
            Some(oldest) => oldest,
            None => newest
                .checked_sub_days(Days::new(DEFAULT_SYNC_DAYS))
                .unwrap_or(newest),
        };
        if oldest > newest {
            return Err(AppError::BadRequest(format!(
                "oldest ({}) is after newest ({})",
                oldest, newest
            )));
        }
        Ok((oldest, newest))
    }
}

/// The body is optional; an empty body means "use defaults".
fn parse_sync_request(body: &[u8]) -> Result<SyncRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(SyncRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("Invalid sync request: {}", e)))
}

/// Trigger a manual sync for one provider.
async fn sync_provider(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    body: Bytes,
) -> Result<Json<SyncReport>> {
    let provider = parse_provider(&provider)?;
    let request = parse_sync_request(&body)?;
    let (oldest, newest) = request.window(Utc::now().date_naive())?;

    let report = state
        .sync_service
        .sync_provider(provider, oldest, newest)
        .await?;
    Ok(Json(report))
}

#[derive(Serialize)]
pub struct ResetResponse {
    pub success: bool,
    pub cleared: usize,
}

/// Clear every local record id so the next sync recreates records.
async fn reset_provider(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
) -> Result<Json<ResetResponse>> {
    let provider = parse_provider(&provider)?;
    let cleared = state.sync_service.reset(provider).await?;
    tracing::info!(provider = %provider, cleared, "Ledger reset requested");
    Ok(Json(ResetResponse {
        success: true,
        cleared,
    }))
}

// ─── Ledger ──────────────────────────────────────────────────

/// Ledger row as exposed over the API.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRow {
    pub id: String,
    pub raw_payload: Value,
    pub local_record_id: Option<String>,
    pub synced_at: String,
    pub start_date: NaiveDate,
}

impl From<SyncedRecord> for LedgerRow {
    fn from(record: SyncedRecord) -> Self {
        Self {
            id: record.external_id,
            raw_payload: record.raw_payload,
            local_record_id: record.local_record_id,
            synced_at: format_utc_rfc3339(record.synced_at),
            start_date: record.start_date,
        }
    }
}

/// Ledger rows ordered by start date, newest first.
async fn list_records(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
) -> Result<Json<Vec<LedgerRow>>> {
    let provider = parse_provider(&provider)?;
    let rows = state
        .sync_service
        .list_records(provider)
        .into_iter()
        .map(LedgerRow::from)
        .collect();
    Ok(Json(rows))
}

// ─── Strava ──────────────────────────────────────────────────

#[derive(Serialize)]
pub struct DisconnectResponse {
    pub success: bool,
    pub message: String,
}

/// Revoke and forget the Strava connection.
async fn disconnect_strava(State(state): State<Arc<AppState>>) -> Result<Json<DisconnectResponse>> {
    state.token_broker.disconnect().await?;
    Ok(Json(DisconnectResponse {
        success: true,
        message: "Strava disconnected".to_string(),
    }))
}

// ─── Pro Data ────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseRequest {
    pub text: String,
    pub sport_type: SportType,
}

/// Parse pasted professional data.
async fn parse_pro_data(Json(request): Json<ParseRequest>) -> Json<ProData> {
    Json(pro_data::parse(&request.text, request.sport_type))
}
