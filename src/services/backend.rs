// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client for the downstream workout record backend.

use crate::error::AppError;
use crate::models::RecordDraft;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Record created downstream.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedRecord {
    pub id: String,
}

/// The service that owns canonical workout records.
#[async_trait]
pub trait RecordBackend: Send + Sync {
    /// `false` means "skip creation for now", never an error.
    async fn health_check(&self) -> bool;

    async fn create_record(&self, draft: &RecordDraft) -> Result<CreatedRecord, AppError>;
}

/// `RecordBackend` over HTTP.
#[derive(Clone)]
pub struct HttpRecordBackend {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct CreateResponse {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    data: Option<CreatedData>,
}

#[derive(Deserialize)]
struct CreatedData {
    id: serde_json::Value,
}

fn id_to_string(id: serde_json::Value) -> Option<String> {
    match id {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl HttpRecordBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl RecordBackend for HttpRecordBackend {
    async fn health_check(&self) -> bool {
        match self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                tracing::warn!(status = %response.status(), "Record backend unhealthy");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "Record backend unreachable");
                false
            }
        }
    }

    async fn create_record(&self, draft: &RecordDraft) -> Result<CreatedRecord, AppError> {
        let body = serde_json::json!({ "data": draft.to_payload() });

        let response = self
            .http
            .post(format!("{}/api/records", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Backend(format!("Create record request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Backend(format!("HTTP {}: {}", status, body)));
        }

        let created: CreateResponse = response
            .json()
            .await
            .map_err(|e| AppError::Backend(format!("JSON parse error: {}", e)))?;

        created
            .id
            .or(created.data.map(|d| d.id))
            .and_then(id_to_string)
            .map(|id| CreatedRecord { id })
            .ok_or_else(|| AppError::Backend("Create record response has no id".to_string()))
    }
}
