// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Intervals.icu API client.
//!
//! Authenticates with HTTP basic auth (`API_KEY:<key>`). The activity list
//! endpoint returns the whole requested date range in one response.

use crate::error::AppError;
use crate::services::strava::check_response_json;
use chrono::NaiveDate;
use serde_json::Value;
use std::time::Duration;

const INTERVALS_API_BASE: &str = "https://intervals.icu/api/v1";

/// Basic-auth user name Intervals.icu expects alongside an API key.
const API_KEY_USER: &str = "API_KEY";

#[derive(Clone)]
pub struct IntervalsClient {
    http: reqwest::Client,
    base_url: String,
}

impl IntervalsClient {
    pub fn new(timeout: Duration) -> Self {
        Self::with_base_url(INTERVALS_API_BASE, timeout)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Activities with local start dates in `[oldest, newest]`.
    pub async fn list_activities(
        &self,
        api_key: &str,
        athlete_id: &str,
        oldest: NaiveDate,
        newest: NaiveDate,
    ) -> Result<Vec<Value>, AppError> {
        let url = format!("{}/athlete/{}/activities", self.base_url, athlete_id);

        let response = self
            .http
            .get(&url)
            .basic_auth(API_KEY_USER, Some(api_key))
            .query(&[
                ("oldest", oldest.format("%Y-%m-%d").to_string()),
                ("newest", newest.format("%Y-%m-%d").to_string()),
            ])
            .send()
            .await?;

        check_response_json(response).await
    }

    /// Full activity including detected intervals.
    pub async fn get_activity(&self, api_key: &str, activity_id: &str) -> Result<Value, AppError> {
        let url = format!(
            "{}/activity/{}",
            self.base_url,
            urlencoding::encode(activity_id)
        );

        let response = self
            .http
            .get(&url)
            .basic_auth(API_KEY_USER, Some(api_key))
            .query(&[("intervals", "true")])
            .send()
            .await?;

        check_response_json(response).await
    }
}
