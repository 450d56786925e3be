// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Provider activity → canonical workout fields.
//!
//! Everything here is pure: no I/O, no clock. Both providers are first
//! reduced to [`ActivityFacts`] so that the sport, duration, RPE, notes and
//! pro data rules are written once.

use crate::models::{
    IntervalsActivity, IntervalsInterval, NormalizedActivity, ProData, ProviderActivity,
    SportType, StravaActivity, StravaLap,
};
use crate::time_utils::{format_duration, format_pace, parse_start_date};
use std::collections::BTreeMap;

/// Provider sport strings and their canonical category.
static SPORT_TYPES: &[(&str, SportType)] = &[
    ("Run", SportType::Running),
    ("TrailRun", SportType::Running),
    ("VirtualRun", SportType::Running),
    ("Ride", SportType::Cycling),
    ("VirtualRide", SportType::Cycling),
    ("MountainBikeRide", SportType::Cycling),
    ("GravelRide", SportType::Cycling),
    ("EBikeRide", SportType::Cycling),
    ("EMountainBikeRide", SportType::Cycling),
    ("Velomobile", SportType::Cycling),
    ("Swim", SportType::Swimming),
    ("WeightTraining", SportType::Strength),
    ("Crossfit", SportType::Strength),
    ("Walk", SportType::Walking),
    ("Hike", SportType::Hiking),
    ("Rowing", SportType::Rowing),
    ("VirtualRow", SportType::Rowing),
    ("NordicSki", SportType::Skiing),
    ("AlpineSki", SportType::Skiing),
    ("BackcountrySki", SportType::Skiing),
    ("Yoga", SportType::Yoga),
    ("Pilates", SportType::Yoga),
];

/// Separator between the parts of the composed notes.
pub const NOTES_SEPARATOR: &str = " | ";

/// RPE used when the provider gives no usable signal.
pub const DEFAULT_RPE: u8 = 5;

pub fn sport_type(provider_type: Option<&str>) -> SportType {
    provider_type
        .and_then(|t| SPORT_TYPES.iter().find(|(name, _)| *name == t))
        .map(|(_, sport)| *sport)
        .unwrap_or(SportType::Other)
}

/// Map a training load (TSS-like) value onto the 1-10 scale.
fn rpe_from_load(load: f64) -> u8 {
    if load < 30.0 {
        3
    } else if load < 60.0 {
        5
    } else if load < 100.0 {
        7
    } else {
        9
    }
}

fn clamp_rpe(value: f64) -> u8 {
    value.round().clamp(1.0, 10.0) as u8
}

/// Returns `(rpe, is_estimate)`.
fn estimate_rpe(direct: Option<f64>, load: Option<f64>, intensity: Option<f64>) -> (u8, bool) {
    if let Some(rpe) = direct.filter(|v| *v > 0.0) {
        return (clamp_rpe(rpe), false);
    }
    if let Some(load) = load.filter(|v| *v > 0.0) {
        return (rpe_from_load(load), true);
    }
    if let Some(intensity) = intensity.filter(|v| *v > 0.0) {
        return (clamp_rpe(intensity / 10.0), true);
    }
    (DEFAULT_RPE, true)
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

/// Common view of one activity.
#[derive(Debug, Default)]
struct ActivityFacts<'a> {
    sport: Option<&'a str>,
    name: Option<&'a str>,
    description: Option<&'a str>,
    start: Option<&'a str>,
    distance: Option<f64>,
    moving_time: Option<f64>,
    elapsed_time: Option<f64>,
    elevation: Option<f64>,
    average_speed: Option<f64>,
    average_heartrate: Option<f64>,
    max_heartrate: Option<f64>,
    cadence: Option<f64>,
    power: Option<f64>,
    normalized_power: Option<f64>,
    calories: Option<f64>,
    direct_rpe: Option<f64>,
    load: Option<f64>,
    intensity: Option<f64>,
    laps: Vec<LapFacts<'a>>,
}

#[derive(Debug, Default)]
struct LapFacts<'a> {
    label: Option<&'a str>,
    moving_time: Option<f64>,
    elapsed_time: Option<f64>,
    distance: Option<f64>,
    average_speed: Option<f64>,
    average_heartrate: Option<f64>,
    max_heartrate: Option<f64>,
    cadence: Option<f64>,
    power: Option<f64>,
}

impl<'a> ActivityFacts<'a> {
    fn from_strava(a: &'a StravaActivity) -> Self {
        Self {
            sport: a.sport_label(),
            name: a.name.as_deref(),
            description: a.description.as_deref(),
            start: a.start_date_local.as_deref().or(a.start_date.as_deref()),
            distance: a.distance,
            moving_time: a.moving_time,
            elapsed_time: a.elapsed_time,
            elevation: a.total_elevation_gain,
            average_speed: a.average_speed,
            average_heartrate: a.average_heartrate,
            max_heartrate: a.max_heartrate,
            cadence: a.average_cadence,
            power: a.average_watts,
            normalized_power: a.weighted_average_watts,
            calories: a.calories,
            direct_rpe: a.perceived_exertion,
            load: a.suffer_score,
            intensity: None,
            laps: a
                .laps
                .iter()
                .flatten()
                .map(LapFacts::from_strava)
                .collect(),
        }
    }

    fn from_intervals(a: &'a IntervalsActivity) -> Self {
        Self {
            sport: a.activity_type.as_deref(),
            name: a.name.as_deref(),
            description: a.description.as_deref(),
            start: a.start_date_local.as_deref(),
            distance: a.distance,
            moving_time: a.moving_time,
            elapsed_time: a.elapsed_time,
            elevation: a.total_elevation_gain,
            average_speed: a.average_speed,
            average_heartrate: a.average_heartrate,
            max_heartrate: a.max_heartrate,
            cadence: a.average_cadence,
            power: a.icu_average_watts,
            normalized_power: a.icu_weighted_avg_watts,
            calories: a.calories,
            direct_rpe: a.icu_rpe,
            load: a.icu_training_load,
            intensity: a.icu_intensity,
            laps: a
                .icu_intervals
                .iter()
                .flatten()
                .map(LapFacts::from_intervals)
                .collect(),
        }
    }

    fn duration_secs(&self) -> Option<f64> {
        positive(self.moving_time).or(positive(self.elapsed_time))
    }
}

impl<'a> LapFacts<'a> {
    fn from_strava(lap: &'a StravaLap) -> Self {
        Self {
            label: lap.name.as_deref(),
            moving_time: lap.moving_time,
            elapsed_time: lap.elapsed_time,
            distance: lap.distance,
            average_speed: lap.average_speed,
            average_heartrate: lap.average_heartrate,
            max_heartrate: lap.max_heartrate,
            cadence: lap.average_cadence,
            power: lap.average_watts,
        }
    }

    fn from_intervals(interval: &'a IntervalsInterval) -> Self {
        Self {
            label: interval
                .label
                .as_deref()
                .or(interval.interval_type.as_deref()),
            moving_time: interval.moving_time,
            elapsed_time: interval.elapsed_time,
            distance: interval.distance,
            average_speed: interval.average_speed,
            average_heartrate: interval.average_heartrate,
            max_heartrate: interval.max_heartrate,
            cadence: interval.average_cadence,
            power: interval.average_watts,
        }
    }

    fn duration_secs(&self) -> Option<f64> {
        positive(self.moving_time).or(positive(self.elapsed_time))
    }
}

/// How a sport reports speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpeedStyle {
    /// `M:SS` per km
    Pace,
    /// km/h
    Speed,
    None,
}

fn speed_style(sport: SportType) -> SpeedStyle {
    match sport {
        SportType::Running | SportType::Walking | SportType::Hiking => SpeedStyle::Pace,
        SportType::Cycling | SportType::Skiing => SpeedStyle::Speed,
        _ => SpeedStyle::None,
    }
}

fn pace_from(time_secs: Option<f64>, distance_m: Option<f64>) -> Option<String> {
    format_pace(time_secs? / distance_m?)
}

/// m/s → km/h, one decimal.
fn speed_kmh(meters_per_sec: f64) -> String {
    format!("{:.1}", meters_per_sec * 3.6)
}

fn whole(value: f64) -> String {
    format!("{:.0}", value)
}

/// Insert `value` under `key` when present.
fn put(fields: &mut BTreeMap<String, String>, key: &str, value: Option<String>) {
    if let Some(value) = value {
        fields.insert(key.to_string(), value);
    }
}

fn summary_fields(facts: &ActivityFacts<'_>, sport: SportType) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    let distance = positive(facts.distance);
    let duration = facts.duration_secs();

    put(&mut fields, "time", duration.map(format_duration));
    put(&mut fields, "distance", distance.map(|d| format!("{:.2}", d / 1000.0)));
    match speed_style(sport) {
        SpeedStyle::Pace => put(&mut fields, "pace", pace_from(duration, distance)),
        SpeedStyle::Speed => put(
            &mut fields,
            "speed",
            positive(facts.average_speed).map(speed_kmh),
        ),
        SpeedStyle::None => {}
    }
    put(&mut fields, "avgHr", positive(facts.average_heartrate).map(whole));
    put(&mut fields, "maxHr", positive(facts.max_heartrate).map(whole));
    put(&mut fields, "cadence", positive(facts.cadence).map(whole));
    put(&mut fields, "power", positive(facts.power).map(whole));
    put(
        &mut fields,
        "normalizedPower",
        positive(facts.normalized_power).map(whole),
    );
    put(&mut fields, "elevation", positive(facts.elevation).map(whole));
    put(&mut fields, "calories", positive(facts.calories).map(whole));
    fields
}

/// Lap columns in display order, with the speed column picked per sport.
fn lap_columns(sport: SportType) -> Vec<&'static str> {
    let mut columns = vec!["lap", "time", "distance"];
    match speed_style(sport) {
        SpeedStyle::Pace => columns.push("pace"),
        SpeedStyle::Speed => columns.push("speed"),
        SpeedStyle::None => {}
    }
    columns.extend(["avgHr", "maxHr", "cadence", "power"]);
    columns
}

fn lap_row(index: usize, lap: &LapFacts<'_>, sport: SportType) -> BTreeMap<String, String> {
    let mut row = BTreeMap::new();
    let distance = positive(lap.distance);
    let duration = lap.duration_secs();

    put(
        &mut row,
        "lap",
        Some(
            lap.label
                .filter(|l| !l.trim().is_empty())
                .map(|l| l.trim().to_string())
                .unwrap_or_else(|| (index + 1).to_string()),
        ),
    );
    put(&mut row, "time", duration.map(format_duration));
    put(&mut row, "distance", distance.map(|d| format!("{:.2}", d / 1000.0)));
    match speed_style(sport) {
        SpeedStyle::Pace => put(&mut row, "pace", pace_from(duration, distance)),
        SpeedStyle::Speed => {
            let speed = positive(lap.average_speed)
                .or_else(|| Some(distance? / duration?));
            put(&mut row, "speed", speed.map(speed_kmh));
        }
        SpeedStyle::None => {}
    }
    put(&mut row, "avgHr", positive(lap.average_heartrate).map(whole));
    put(&mut row, "maxHr", positive(lap.max_heartrate).map(whole));
    put(&mut row, "cadence", positive(lap.cadence).map(whole));
    put(&mut row, "power", positive(lap.power).map(whole));
    row
}

fn build_pro_data(facts: &ActivityFacts<'_>, sport: SportType) -> Option<ProData> {
    let summary = summary_fields(facts, sport);

    let rows: Vec<BTreeMap<String, String>> = facts
        .laps
        .iter()
        .enumerate()
        .map(|(i, lap)| lap_row(i, lap, sport))
        // A row holding only its label carries no data.
        .filter(|row| row.len() > 1)
        .collect();

    let pro_data = if rows.is_empty() {
        ProData::Simple { fields: summary }
    } else {
        let columns = lap_columns(sport)
            .into_iter()
            .filter(|c| rows.iter().any(|r| r.contains_key(*c)))
            .map(str::to_string)
            .collect();
        ProData::Intervals {
            columns,
            rows,
            summary,
        }
    };

    (!pro_data.is_empty()).then_some(pro_data)
}

fn compose_notes(facts: &ActivityFacts<'_>) -> String {
    let mut parts: Vec<String> = Vec::new();

    for text in [facts.name, facts.description].into_iter().flatten() {
        let text = text.trim();
        if !text.is_empty() {
            parts.push(text.to_string());
        }
    }
    if let Some(distance) = positive(facts.distance) {
        parts.push(format!("Distance: {:.2} km", distance / 1000.0));
    }
    if let Some(elevation) = positive(facts.elevation) {
        parts.push(format!("Elevation: {:.0} m", elevation));
    }
    if let Some(load) = positive(facts.load) {
        parts.push(format!("Training load: {:.0}", load));
    }

    parts.join(NOTES_SEPARATOR)
}

/// Convert a provider activity to canonical workout fields.
pub fn normalize(activity: &ProviderActivity) -> NormalizedActivity {
    let facts = match activity {
        ProviderActivity::Strava(a) => ActivityFacts::from_strava(a),
        ProviderActivity::Intervals(a) => ActivityFacts::from_intervals(a),
    };

    let sport = sport_type(facts.sport);
    let (estimated_rpe, rpe_is_estimate) =
        estimate_rpe(facts.direct_rpe, facts.load, facts.intensity);

    NormalizedActivity {
        sport_type: sport,
        title: facts
            .name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string),
        date: facts.start.and_then(parse_start_date),
        duration_minutes: facts
            .duration_secs()
            .map(|secs| (secs / 60.0).round().max(1.0) as u32),
        average_heart_rate: positive(facts.average_heartrate).map(|hr| hr.round() as u32),
        estimated_rpe,
        rpe_is_estimate,
        notes: compose_notes(&facts),
        pro_data: build_pro_data(&facts, sport),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn strava(payload: serde_json::Value) -> ProviderActivity {
        ProviderActivity::Strava(serde_json::from_value(payload).unwrap())
    }

    fn intervals(payload: serde_json::Value) -> ProviderActivity {
        ProviderActivity::Intervals(serde_json::from_value(payload).unwrap())
    }

    #[test]
    fn test_sport_lookup_and_fallback() {
        assert_eq!(sport_type(Some("TrailRun")), SportType::Running);
        assert_eq!(sport_type(Some("GravelRide")), SportType::Cycling);
        assert_eq!(sport_type(Some("Kitesurf")), SportType::Other);
        assert_eq!(sport_type(None), SportType::Other);
    }

    #[test]
    fn test_duration_prefers_moving_time_and_stays_unset() {
        let n = normalize(&strava(json!({"id": 1, "moving_time": 1800, "elapsed_time": 2400})));
        assert_eq!(n.duration_minutes, Some(30));

        let n = normalize(&strava(json!({"id": 1, "elapsed_time": 2400})));
        assert_eq!(n.duration_minutes, Some(40));

        let n = normalize(&strava(json!({"id": 1})));
        assert_eq!(n.duration_minutes, None);
    }

    #[test]
    fn test_rpe_sources_in_order() {
        let n = normalize(&intervals(json!({"id": "i1", "icu_rpe": 8, "icu_training_load": 20})));
        assert_eq!((n.estimated_rpe, n.rpe_is_estimate), (8, false));

        for (load, expected) in [(10.0, 3), (45.0, 5), (99.0, 7), (150.0, 9)] {
            let n = normalize(&intervals(json!({"id": "i1", "icu_training_load": load})));
            assert_eq!(n.estimated_rpe, expected, "load {}", load);
            assert!(n.rpe_is_estimate);
        }

        let n = normalize(&intervals(json!({"id": "i1", "icu_intensity": 84.0})));
        assert_eq!(n.estimated_rpe, 8);

        let n = normalize(&intervals(json!({"id": "i1", "icu_intensity": 130.0})));
        assert_eq!(n.estimated_rpe, 10);

        let n = normalize(&intervals(json!({"id": "i1"})));
        assert_eq!((n.estimated_rpe, n.rpe_is_estimate), (DEFAULT_RPE, true));
    }

    #[test]
    fn test_notes_omit_absent_parts() {
        let n = normalize(&intervals(json!({
            "id": "i1",
            "name": "Tempo",
            "distance": 10234.0,
            "icu_training_load": 72.4
        })));
        assert_eq!(n.notes, "Tempo | Distance: 10.23 km | Training load: 72");

        let n = normalize(&strava(json!({
            "id": 1,
            "name": "Hills",
            "description": "  ",
            "total_elevation_gain": 412.6
        })));
        assert_eq!(n.notes, "Hills | Elevation: 413 m");
    }

    #[test]
    fn test_running_pro_data_with_laps() {
        let n = normalize(&strava(json!({
            "id": 1,
            "sport_type": "Run",
            "distance": 10000.0,
            "moving_time": 3000,
            "average_heartrate": 151.6,
            "laps": [
                {"lap_index": 1, "distance": 1000.0, "moving_time": 290, "average_heartrate": 148.0},
                {"lap_index": 2, "distance": 1000.0, "moving_time": 300}
            ]
        })));

        let Some(ProData::Intervals { columns, rows, summary }) = n.pro_data else {
            panic!("expected lap table");
        };
        assert_eq!(columns, ["lap", "time", "distance", "pace", "avgHr"]);
        assert_eq!(rows[0]["pace"], "4:50");
        assert_eq!(rows[1]["lap"], "2");
        assert!(!rows[1].contains_key("avgHr"));
        assert_eq!(summary["pace"], "5:00");
        assert_eq!(summary["avgHr"], "152");
        assert_eq!(n.average_heart_rate, Some(152));
    }

    #[test]
    fn test_cycling_summary_uses_kmh() {
        let n = normalize(&intervals(json!({
            "id": "i9",
            "type": "Ride",
            "average_speed": 8.5,
            "icu_average_watts": 201.4
        })));
        let Some(ProData::Simple { fields }) = n.pro_data else {
            panic!("expected simple pro data");
        };
        assert_eq!(fields["speed"], "30.6");
        assert_eq!(fields["power"], "201");
        assert!(!fields.contains_key("pace"));
    }

    #[test]
    fn test_no_observations_means_no_pro_data() {
        let n = normalize(&strava(json!({"id": 1, "sport_type": "Yoga"})));
        assert!(n.pro_data.is_none());
        assert_eq!(n.sport_type, SportType::Yoga);
    }
}
