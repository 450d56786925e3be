// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Intervals.icu webhook payloads.
//!
//! Events are kept as raw JSON in the batch and decoded one at a time, so a
//! single odd event cannot reject its siblings.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Batch of events as POSTed by Intervals.icu.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub events: Vec<Value>,
}

/// A single webhook event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub athlete_id: Option<Value>,
    #[serde(rename = "type", default)]
    pub event_type: String,
    #[serde(default)]
    pub timestamp: Option<Value>,
    /// Full activity for `ACTIVITY_*` events
    #[serde(default)]
    pub activity: Option<Value>,
    /// Calendar entries for `CALENDAR_UPDATED`
    #[serde(default, deserialize_with = "null_as_empty")]
    pub events: Vec<Value>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub deleted_events: Vec<Value>,
}

impl WebhookEvent {
    /// Decode one raw event from a batch.
    pub fn from_value(raw: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(raw)
    }

    pub fn kind(&self) -> WebhookEventKind {
        WebhookEventKind::from_type(&self.event_type)
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Event types we distinguish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookEventKind {
    ActivityUploaded,
    ActivityAnalyzed,
    ActivityUpdated,
    ActivityDeleted,
    CalendarUpdated,
    Unknown,
}

impl WebhookEventKind {
    pub fn from_type(event_type: &str) -> Self {
        match event_type {
            "ACTIVITY_UPLOADED" => Self::ActivityUploaded,
            "ACTIVITY_ANALYZED" => Self::ActivityAnalyzed,
            "ACTIVITY_UPDATED" => Self::ActivityUpdated,
            "ACTIVITY_DELETED" => Self::ActivityDeleted,
            "CALENDAR_UPDATED" => Self::CalendarUpdated,
            _ => Self::Unknown,
        }
    }
}
