// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    /// A provider (or the webhook secret) is not configured.
    #[error("Not connected: {0}")]
    NotConnected(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Sync already running for {0}")]
    SyncInProgress(String),

    #[error("Provider API error: {0}")]
    Provider(String),

    #[error("Record backend error: {0}")]
    Backend(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Message carried by `Provider` errors for HTTP 429.
    pub const PROVIDER_RATE_LIMIT: &'static str = "Rate limit exceeded";

    /// Message carried by `Provider` errors for HTTP 401.
    pub const PROVIDER_TOKEN_ERROR: &'static str = "Token expired or invalid";

    /// True if this is a provider error caused by an expired or revoked token.
    pub fn is_provider_token_error(&self) -> bool {
        match self {
            AppError::Provider(msg) => {
                msg == Self::PROVIDER_TOKEN_ERROR || msg.contains("invalid_grant")
            }
            _ => false,
        }
    }

    /// True if the provider reported that we are being rate limited.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AppError::Provider(msg) if msg == Self::PROVIDER_RATE_LIMIT)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::Provider(format!("Request timed out: {}", err))
        } else {
            AppError::Provider(err.to_string())
        }
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::NotConnected(msg) => (
                StatusCode::PRECONDITION_FAILED,
                "not_connected",
                Some(msg.clone()),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::SyncInProgress(provider) => (
                StatusCode::CONFLICT,
                "sync_in_progress",
                Some(provider.clone()),
            ),
            AppError::Provider(msg) => {
                (StatusCode::BAD_GATEWAY, "provider_error", Some(msg.clone()))
            }
            AppError::Backend(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "backend_unavailable",
                Some(msg.clone()),
            ),
            AppError::Storage(msg) => {
                tracing::error!(error = %msg, "Storage error");
                (StatusCode::INTERNAL_SERVER_ERROR, "storage_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
