// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting and conversion.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Current time as unix seconds.
pub fn now_unix() -> i64 {
    Utc::now().timestamp()
}

/// Unix timestamp of midnight UTC at the start of `date`.
pub fn start_of_day_unix(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

/// Unix timestamp of the last second of `date` (UTC).
pub fn end_of_day_unix(date: NaiveDate) -> i64 {
    start_of_day_unix(date) + 86_399
}

/// Extract the calendar date from a provider timestamp.
///
/// Accepts RFC3339 (`2024-05-01T07:00:00Z`), naive local times
/// (`2024-05-01T07:00:00`) and bare dates.
pub fn parse_start_date(raw: &str) -> Option<NaiveDate> {
    let date_part = raw.get(..10)?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// Format a duration in seconds as `H:MM:SS` or `M:SS`.
pub fn format_duration(total_secs: f64) -> String {
    let secs = total_secs.round().max(0.0) as u64;
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

/// Format a pace given in seconds per meter as `M:SS` per kilometer.
pub fn format_pace(secs_per_meter: f64) -> Option<String> {
    if !secs_per_meter.is_finite() || secs_per_meter <= 0.0 {
        return None;
    }
    let secs_per_km = (secs_per_meter * 1000.0).round() as u64;
    Some(format!("{}:{:02}", secs_per_km / 60, secs_per_km % 60))
}
