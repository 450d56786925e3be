// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Canonical workout records and the per-provider ledger row.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Ledger row tracking one remote activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncedRecord {
    /// Remote activity id (unique per provider)
    pub external_id: String,
    /// Provider payload exactly as received
    pub raw_payload: Value,
    /// Downstream record id, once created
    pub local_record_id: Option<String>,
    /// Last write of this row
    pub synced_at: DateTime<Utc>,
    /// Local start date of the activity
    pub start_date: NaiveDate,
}

/// Canonical sport categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SportType {
    Running,
    Cycling,
    Swimming,
    Strength,
    Walking,
    Hiking,
    Rowing,
    Skiing,
    Yoga,
    Other,
}

/// Professional data attached to a workout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProData {
    /// Key-value metrics.
    Simple { fields: BTreeMap<String, String> },
    /// Lap or interval table keyed by canonical column names.
    Intervals {
        columns: Vec<String>,
        rows: Vec<BTreeMap<String, String>>,
        /// Whole-activity metrics shown alongside the table.
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        summary: BTreeMap<String, String>,
    },
}

impl ProData {
    pub fn kind(&self) -> &'static str {
        match self {
            ProData::Simple { .. } => "simple",
            ProData::Intervals { .. } => "intervals",
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ProData::Simple { fields } => fields.is_empty(),
            ProData::Intervals { rows, summary, .. } => rows.is_empty() && summary.is_empty(),
        }
    }
}

/// Provider-neutral view of an activity, ready to become a workout record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedActivity {
    #[serde(rename = "type")]
    pub sport_type: SportType,
    pub title: Option<String>,
    pub date: Option<NaiveDate>,
    #[serde(rename = "duration")]
    pub duration_minutes: Option<u32>,
    #[serde(rename = "heartRate")]
    pub average_heart_rate: Option<u32>,
    #[serde(rename = "rpe")]
    pub estimated_rpe: u8,
    /// `true` when `estimated_rpe` is derived rather than reported.
    pub rpe_is_estimate: bool,
    pub notes: String,
    pub pro_data: Option<ProData>,
}

/// Body sent to the record backend.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordDraft {
    #[serde(flatten)]
    pub activity: NormalizedActivity,
    pub source: String,
    pub source_id: String,
}

impl RecordDraft {
    /// JSON form with every unobserved (null) leaf removed.
    pub fn to_payload(&self) -> Value {
        serde_json::to_value(self)
            .map(prune_nulls)
            .unwrap_or(Value::Null)
    }
}

/// Remove null leaves recursively, including inside arrays.
///
/// Objects left empty by pruning are removed from their parent as well.
pub fn prune_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, prune_nulls(v)))
                .filter(|(_, v)| !is_prunable(v))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(prune_nulls)
                .filter(|v| !is_prunable(v))
                .collect(),
        ),
        other => other,
    }
}

fn is_prunable(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
