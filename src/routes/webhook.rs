// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Webhook route for Intervals.icu events.

use crate::error::AppError;
use crate::models::WebhookPayload;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Json, State},
    routing::post,
    Router,
};
use serde::Serialize;
use std::sync::Arc;

/// Webhook routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/webhook/intervals", post(handle_webhook))
}

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub success: bool,
    pub processed: usize,
    pub created: usize,
    pub message: String,
}

/// Handle an incoming event batch (POST).
///
/// Secret mismatch rejects the whole batch with 401; per-event failures only
/// show up as a lower `created` count.
async fn handle_webhook(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<WebhookResponse>, AppError> {
    let payload: WebhookPayload = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!(error = %e, "Unparseable webhook body");
        AppError::BadRequest(format!("Invalid webhook body: {}", e))
    })?;
    tracing::info!(events = payload.events.len(), "Intervals.icu webhook received");

    let summary = state.webhook.handle_batch(&payload).await?;

    Ok(Json(WebhookResponse {
        success: true,
        processed: summary.processed,
        created: summary.created,
        message: format!(
            "Processed {} event(s), created {} record(s)",
            summary.processed, summary.created
        ),
    }))
}
