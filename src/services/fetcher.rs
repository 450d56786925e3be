// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Paginated, throttled bulk retrieval of provider activities.
//!
//! The fetcher only reads: ledger writes and record creation happen in
//! [`crate::services::SyncService`].

use crate::config::SyncSettings;
use crate::db::SettingsRepository;
use crate::error::AppError;
use crate::models::{FetchedActivity, Provider};
use crate::services::intervals::IntervalsClient;
use crate::services::strava::TokenBroker;
use crate::time_utils::{end_of_day_unix, start_of_day_unix};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use std::sync::Arc;

/// A provider activity listing.
#[async_trait]
pub trait ActivitySource: Send + Sync {
    fn provider(&self) -> Provider;

    /// One page (1-based) of activity summaries in `[oldest, newest]`.
    async fn list_page(
        &self,
        oldest: NaiveDate,
        newest: NaiveDate,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Value>, AppError>;

    /// Detailed payload for a summary returned by [`Self::list_page`].
    async fn get_detail(&self, summary: &Value) -> Result<Value, AppError>;
}

/// Activity id from a raw payload (string or number).
pub fn payload_id(payload: &Value) -> Option<String> {
    match payload.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Strava listing, authenticated through the [`TokenBroker`].
pub struct StravaSource {
    broker: Arc<TokenBroker>,
}

impl StravaSource {
    pub fn new(broker: Arc<TokenBroker>) -> Self {
        Self { broker }
    }

    async fn access_token(&self) -> Result<String, AppError> {
        self.broker
            .get_valid_access_token()
            .await?
            .ok_or_else(|| AppError::NotConnected("Strava is not connected".to_string()))
    }
}

#[async_trait]
impl ActivitySource for StravaSource {
    fn provider(&self) -> Provider {
        Provider::Strava
    }

    async fn list_page(
        &self,
        oldest: NaiveDate,
        newest: NaiveDate,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Value>, AppError> {
        let token = self.access_token().await?;
        self.broker
            .client()
            .list_activities(
                &token,
                start_of_day_unix(oldest),
                end_of_day_unix(newest),
                page,
                per_page,
            )
            .await
    }

    async fn get_detail(&self, summary: &Value) -> Result<Value, AppError> {
        let id = payload_id(summary)
            .ok_or_else(|| AppError::BadRequest("Strava summary without id".to_string()))?;
        let token = self.access_token().await?;
        self.broker.client().get_activity(&token, &id).await
    }
}

/// Intervals.icu listing (API key from the settings repository).
pub struct IntervalsSource {
    client: IntervalsClient,
    settings: SettingsRepository,
}

impl IntervalsSource {
    pub fn new(client: IntervalsClient, settings: SettingsRepository) -> Self {
        Self { client, settings }
    }

    async fn credentials(&self) -> Result<(String, String), AppError> {
        let settings = self.settings.intervals_settings().await?;
        match (settings.api_key, settings.athlete_id) {
            (Some(key), Some(athlete)) => Ok((key, athlete)),
            _ => Err(AppError::NotConnected(
                "Intervals.icu API key or athlete id not configured".to_string(),
            )),
        }
    }
}

#[async_trait]
impl ActivitySource for IntervalsSource {
    fn provider(&self) -> Provider {
        Provider::Intervals
    }

    async fn list_page(
        &self,
        oldest: NaiveDate,
        newest: NaiveDate,
        page: u32,
        _per_page: u32,
    ) -> Result<Vec<Value>, AppError> {
        // The whole range comes back on the first page.
        if page > 1 {
            return Ok(Vec::new());
        }
        let (api_key, athlete_id) = self.credentials().await?;
        self.client
            .list_activities(&api_key, &athlete_id, oldest, newest)
            .await
    }

    async fn get_detail(&self, summary: &Value) -> Result<Value, AppError> {
        let id = payload_id(summary)
            .ok_or_else(|| AppError::BadRequest("Intervals.icu summary without id".to_string()))?;
        let (api_key, _) = self.credentials().await?;
        self.client.get_activity(&api_key, &id).await
    }
}

/// Result of one bulk fetch.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// Activities returned (detail or summary fallback)
    pub fetched: usize,
    /// Summaries listed (after the page cap)
    pub total: usize,
    pub activities: Vec<FetchedActivity>,
    pub errors: Vec<String>,
}

/// Pages through a source with a fixed-window throttle.
#[derive(Debug, Clone)]
pub struct ActivityFetcher {
    settings: SyncSettings,
}

impl ActivityFetcher {
    pub fn new(settings: SyncSettings) -> Self {
        Self { settings }
    }

    /// Most activities a single fetch will return.
    pub fn max_activities(&self) -> usize {
        (self.settings.max_pages as usize) * (self.settings.page_size as usize)
    }

    /// Fetch every activity in `[oldest, newest]`.
    ///
    /// Fails only if the first listing call fails; everything later is
    /// reported in `errors`.
    pub async fn fetch(
        &self,
        source: &dyn ActivitySource,
        oldest: NaiveDate,
        newest: NaiveDate,
    ) -> Result<FetchOutcome, AppError> {
        let provider = source.provider();
        let page_size = self.settings.page_size.max(1);
        let mut requests = 0u32;
        let mut errors = Vec::new();
        let mut summaries: Vec<Value> = Vec::new();

        for page in 1..=self.settings.max_pages {
            self.pace(&mut requests).await;
            match source.list_page(oldest, newest, page, page_size).await {
                Ok(items) => {
                    let count = items.len();
                    tracing::debug!(provider = %provider, page, count, "Listed activity page");
                    summaries.extend(items);
                    if count < page_size as usize {
                        break;
                    }
                }
                Err(e) if page == 1 => return Err(e),
                Err(e) => {
                    tracing::warn!(provider = %provider, page, error = %e, "Listing page failed");
                    errors.push(format!("Listing page {} failed: {}", page, e));
                    break;
                }
            }
        }

        if summaries.len() > self.max_activities() {
            tracing::info!(
                provider = %provider,
                listed = summaries.len(),
                cap = self.max_activities(),
                "Activity listing truncated at cap"
            );
            summaries.truncate(self.max_activities());
        }

        let total = summaries.len();
        let mut activities = Vec::with_capacity(total);
        let mut rate_limited = false;

        for summary in summaries {
            let id = payload_id(&summary).unwrap_or_else(|| "?".to_string());

            let detail = if rate_limited {
                None
            } else {
                self.pace(&mut requests).await;
                match source.get_detail(&summary).await {
                    Ok(detail) => Some(detail),
                    Err(e) => {
                        tracing::warn!(
                            provider = %provider,
                            external_id = %id,
                            error = %e,
                            "Detail fetch failed, using summary"
                        );
                        if e.is_rate_limited() {
                            rate_limited = true;
                        }
                        errors.push(format!("Activity {}: detail fetch failed: {}", id, e));
                        None
                    }
                }
            };

            let decoded = match detail.map(|d| FetchedActivity::from_payload(provider, d)) {
                Some(Ok(activity)) => Ok(activity),
                Some(Err(e)) => {
                    tracing::warn!(
                        provider = %provider,
                        external_id = %id,
                        error = %e,
                        "Detail not decodable, using summary"
                    );
                    errors.push(format!("Activity {}: detail not decodable: {}", id, e));
                    FetchedActivity::from_payload(provider, summary)
                }
                None => FetchedActivity::from_payload(provider, summary),
            };

            match decoded {
                Ok(activity) => activities.push(activity),
                Err(e) => errors.push(format!("Activity {}: {}", id, e)),
            }
        }

        tracing::info!(
            provider = %provider,
            total,
            fetched = activities.len(),
            errors = errors.len(),
            "Fetch complete"
        );

        Ok(FetchOutcome {
            fetched: activities.len(),
            total,
            activities,
            errors,
        })
    }

    /// Count a request, pausing first after every `throttle_every` requests.
    async fn pace(&self, requests: &mut u32) {
        let every = self.settings.throttle_every;
        if every > 0 && *requests > 0 && *requests % every == 0 && !self.settings.cooldown.is_zero()
        {
            tokio::time::sleep(self.settings.cooldown).await;
        }
        *requests += 1;
    }
}
