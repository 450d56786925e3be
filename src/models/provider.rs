// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Provider-specific activity payloads.
//!
//! Only the fields the normalizer reads are modelled; everything else in a
//! provider payload is dropped here and survives only in the ledger's raw
//! payload copy.

use crate::error::AppError;
use crate::time_utils::parse_start_date;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Supported activity providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Strava (OAuth, pull-based)
    Strava,
    /// Intervals.icu (API key, webhook-driven)
    Intervals,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::Strava, Provider::Intervals];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Strava => "strava",
            Provider::Intervals => "intervals",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "strava" => Ok(Provider::Strava),
            "intervals" => Ok(Provider::Intervals),
            other => Err(AppError::BadRequest(format!("Unknown provider: {}", other))),
        }
    }
}

/// Accept ids sent either as JSON strings or numbers.
fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

fn opt_id_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

// ─── Strava ──────────────────────────────────────────────────────────────────

/// Strava activity (summary from the list endpoint or detail with laps).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StravaActivity {
    pub id: u64,
    pub name: Option<String>,
    pub sport_type: Option<String>,
    /// Legacy activity type, used when `sport_type` is absent.
    #[serde(rename = "type")]
    pub activity_type: Option<String>,
    pub start_date: Option<String>,
    pub start_date_local: Option<String>,
    pub description: Option<String>,
    /// Meters
    pub distance: Option<f64>,
    /// Seconds
    pub moving_time: Option<f64>,
    /// Seconds
    pub elapsed_time: Option<f64>,
    /// Meters
    pub total_elevation_gain: Option<f64>,
    /// Meters per second
    pub average_speed: Option<f64>,
    pub max_speed: Option<f64>,
    pub average_heartrate: Option<f64>,
    pub max_heartrate: Option<f64>,
    pub average_cadence: Option<f64>,
    pub average_watts: Option<f64>,
    pub weighted_average_watts: Option<f64>,
    pub calories: Option<f64>,
    /// Relative effort
    pub suffer_score: Option<f64>,
    /// User-entered RPE (1-10)
    pub perceived_exertion: Option<f64>,
    pub laps: Option<Vec<StravaLap>>,
}

impl StravaActivity {
    pub fn sport_label(&self) -> Option<&str> {
        self.sport_type
            .as_deref()
            .or(self.activity_type.as_deref())
    }
}

/// A lap in a detailed Strava activity.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StravaLap {
    pub name: Option<String>,
    pub lap_index: Option<u32>,
    pub elapsed_time: Option<f64>,
    pub moving_time: Option<f64>,
    pub distance: Option<f64>,
    pub average_speed: Option<f64>,
    pub average_heartrate: Option<f64>,
    pub max_heartrate: Option<f64>,
    pub average_cadence: Option<f64>,
    pub average_watts: Option<f64>,
}

// ─── Intervals.icu ───────────────────────────────────────────────────────────

/// Intervals.icu activity.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IntervalsActivity {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub start_date_local: Option<String>,
    #[serde(rename = "type")]
    pub activity_type: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub distance: Option<f64>,
    pub moving_time: Option<f64>,
    pub elapsed_time: Option<f64>,
    pub total_elevation_gain: Option<f64>,
    pub average_speed: Option<f64>,
    pub average_heartrate: Option<f64>,
    pub max_heartrate: Option<f64>,
    pub average_cadence: Option<f64>,
    pub icu_average_watts: Option<f64>,
    pub icu_weighted_avg_watts: Option<f64>,
    pub calories: Option<f64>,
    pub icu_training_load: Option<f64>,
    /// Intensity as a percentage of threshold (0-100+)
    pub icu_intensity: Option<f64>,
    pub icu_rpe: Option<f64>,
    pub icu_intervals: Option<Vec<IntervalsInterval>>,
}

/// A detected or planned interval within an Intervals.icu activity.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IntervalsInterval {
    pub label: Option<String>,
    #[serde(rename = "type")]
    pub interval_type: Option<String>,
    pub elapsed_time: Option<f64>,
    pub moving_time: Option<f64>,
    pub distance: Option<f64>,
    pub average_speed: Option<f64>,
    pub average_heartrate: Option<f64>,
    pub max_heartrate: Option<f64>,
    pub average_cadence: Option<f64>,
    pub average_watts: Option<f64>,
}

/// Calendar entry carried by `CALENDAR_UPDATED` webhooks.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CalendarEvent {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub start_date_local: Option<String>,
    /// Sport type; absent for notes and other non-workout entries.
    #[serde(rename = "type", default, deserialize_with = "opt_id_string")]
    pub sport: Option<String>,
    pub category: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub moving_time: Option<f64>,
    pub distance: Option<f64>,
    pub icu_training_load: Option<f64>,
}

impl CalendarEvent {
    /// Id used in the ledger, kept apart from native activity ids.
    pub fn external_id(&self) -> String {
        format!("cal_{}", self.id)
    }

    /// Build an activity-shaped record, or `None` for non-workout entries.
    pub fn to_activity(&self) -> Option<IntervalsActivity> {
        let sport = self.sport.clone()?;
        Some(IntervalsActivity {
            id: self.external_id(),
            start_date_local: self.start_date_local.clone(),
            activity_type: Some(sport),
            name: self.name.clone(),
            description: self.description.clone(),
            distance: self.distance,
            moving_time: self.moving_time,
            icu_training_load: self.icu_training_load,
            ..IntervalsActivity::default()
        })
    }
}

// ─── Provider-neutral wrappers ───────────────────────────────────────────────

/// A decoded activity from either provider.
#[derive(Debug, Clone)]
pub enum ProviderActivity {
    Strava(StravaActivity),
    Intervals(IntervalsActivity),
}

impl ProviderActivity {
    pub fn provider(&self) -> Provider {
        match self {
            ProviderActivity::Strava(_) => Provider::Strava,
            ProviderActivity::Intervals(_) => Provider::Intervals,
        }
    }

    pub fn external_id(&self) -> String {
        match self {
            ProviderActivity::Strava(a) => a.id.to_string(),
            ProviderActivity::Intervals(a) => a.id.clone(),
        }
    }

    /// Local start timestamp as sent by the provider.
    pub fn start_date_raw(&self) -> Option<&str> {
        match self {
            ProviderActivity::Strava(a) => a
                .start_date_local
                .as_deref()
                .or(a.start_date.as_deref()),
            ProviderActivity::Intervals(a) => a.start_date_local.as_deref(),
        }
    }
}

/// An activity ready for normalization, paired with its verbatim payload.
#[derive(Debug, Clone)]
pub struct FetchedActivity {
    pub external_id: String,
    pub start_date: NaiveDate,
    pub payload: Value,
    pub activity: ProviderActivity,
}

impl FetchedActivity {
    /// Decode a raw provider payload.
    pub fn from_payload(provider: Provider, payload: Value) -> Result<Self, AppError> {
        let activity = match provider {
            Provider::Strava => ProviderActivity::Strava(
                serde_json::from_value(payload.clone())
                    .map_err(|e| AppError::BadRequest(format!("Invalid Strava activity: {}", e)))?,
            ),
            Provider::Intervals => {
                ProviderActivity::Intervals(serde_json::from_value(payload.clone()).map_err(
                    |e| AppError::BadRequest(format!("Invalid Intervals.icu activity: {}", e)),
                )?)
            }
        };
        Self::new(activity, payload)
    }

    /// Build from a calendar entry; `Ok(None)` when the entry is not a workout.
    pub fn from_calendar_event(payload: Value) -> Result<Option<Self>, AppError> {
        let event: CalendarEvent = serde_json::from_value(payload.clone())
            .map_err(|e| AppError::BadRequest(format!("Invalid calendar event: {}", e)))?;

        match event.to_activity() {
            Some(activity) => Self::new(ProviderActivity::Intervals(activity), payload).map(Some),
            None => Ok(None),
        }
    }

    fn new(activity: ProviderActivity, payload: Value) -> Result<Self, AppError> {
        let external_id = activity.external_id();
        let start_date = activity
            .start_date_raw()
            .and_then(parse_start_date)
            .ok_or_else(|| {
                AppError::BadRequest(format!("Activity {} has no start date", external_id))
            })?;

        Ok(Self {
            external_id,
            start_date,
            payload,
            activity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_provider_round_trip_names() {
        for provider in Provider::ALL {
            assert_eq!(provider.as_str().parse::<Provider>().unwrap(), provider);
        }
        assert!("garmin".parse::<Provider>().is_err());
    }

    #[test]
    fn test_fetched_strava_activity_keeps_raw_payload() {
        let payload = json!({
            "id": 987654321_u64,
            "name": "Morning Run",
            "sport_type": "Run",
            "start_date_local": "2024-05-01T07:00:00Z",
            "map": {"summary_polyline": "abc"}
        });

        let fetched = FetchedActivity::from_payload(Provider::Strava, payload.clone()).unwrap();
        assert_eq!(fetched.external_id, "987654321");
        assert_eq!(fetched.start_date, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert_eq!(fetched.payload, payload);
    }

    #[test]
    fn test_intervals_numeric_id_is_accepted() {
        let payload = json!({"id": 42, "start_date_local": "2024-05-02T18:00:00"});
        let fetched = FetchedActivity::from_payload(Provider::Intervals, payload).unwrap();
        assert_eq!(fetched.external_id, "42");
    }

    #[test]
    fn test_missing_start_date_is_rejected() {
        let payload = json!({"id": "i1"});
        assert!(FetchedActivity::from_payload(Provider::Intervals, payload).is_err());
    }

    #[test]
    fn test_calendar_event_gets_prefixed_id() {
        let payload = json!({
            "id": 555,
            "start_date_local": "2024-05-03T00:00:00",
            "type": "Ride",
            "category": "WORKOUT",
            "name": "Sweet spot"
        });
        let fetched = FetchedActivity::from_calendar_event(payload).unwrap().unwrap();
        assert_eq!(fetched.external_id, "cal_555");
    }

    #[test]
    fn test_calendar_note_is_skipped() {
        let payload = json!({
            "id": 556,
            "start_date_local": "2024-05-03T00:00:00",
            "category": "NOTE",
            "name": "Travel"
        });
        assert!(FetchedActivity::from_calendar_event(payload).unwrap().is_none());
    }
}
