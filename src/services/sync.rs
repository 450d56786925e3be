// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sync orchestration: ledger bookkeeping and record creation.
//!
//! Both the manual bulk sync and the webhook path end up in
//! [`SyncService::process_activity`], which holds the ledger's per-id lock
//! from the idempotency check until the new record id is stored. That is
//! what keeps one remote activity from producing two local records when a
//! webhook races a manual sync.

use crate::db::Ledgers;
use crate::error::AppError;
use crate::models::{FetchedActivity, Provider, RecordDraft, SyncedRecord};
use crate::services::backend::RecordBackend;
use crate::services::fetcher::{ActivityFetcher, ActivitySource};
use crate::services::normalizer::normalize;
use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Listing sources, one per provider.
#[derive(Clone)]
pub struct ActivitySources {
    pub strava: Arc<dyn ActivitySource>,
    pub intervals: Arc<dyn ActivitySource>,
}

impl ActivitySources {
    pub fn for_provider(&self, provider: Provider) -> &Arc<dyn ActivitySource> {
        match provider {
            Provider::Strava => &self.strava,
            Provider::Intervals => &self.intervals,
        }
    }
}

/// What happened to one activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Created { local_record_id: String },
    /// The ledger already points at a local record.
    AlreadyRecorded,
    /// Health check failed; the ledger row is kept for a later attempt.
    BackendUnavailable,
}

impl ProcessOutcome {
    pub fn created(&self) -> bool {
        matches!(self, ProcessOutcome::Created { .. })
    }
}

/// Result of a manual sync.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub success: bool,
    /// Activities written to the ledger
    pub synced: usize,
    /// Activities listed by the provider
    pub total: usize,
    pub created: usize,
    pub skipped: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

pub struct SyncService {
    ledgers: Ledgers,
    backend: Arc<dyn RecordBackend>,
    fetcher: ActivityFetcher,
    sources: ActivitySources,
    /// One manual sync (or reset) per provider at a time.
    in_flight: DashMap<Provider, Arc<Mutex<()>>>,
}

impl SyncService {
    pub fn new(
        ledgers: Ledgers,
        backend: Arc<dyn RecordBackend>,
        fetcher: ActivityFetcher,
        sources: ActivitySources,
    ) -> Self {
        Self {
            ledgers,
            backend,
            fetcher,
            sources,
            in_flight: DashMap::new(),
        }
    }

    pub fn ledgers(&self) -> &Ledgers {
        &self.ledgers
    }

    fn begin(&self, provider: Provider) -> Result<OwnedMutexGuard<()>, AppError> {
        let lock = self
            .in_flight
            .entry(provider)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.try_lock_owned()
            .map_err(|_| AppError::SyncInProgress(provider.to_string()))
    }

    /// Record `activity` in the ledger and create a local record if none exists.
    pub async fn process_activity(
        &self,
        provider: Provider,
        activity: FetchedActivity,
    ) -> Result<ProcessOutcome, AppError> {
        let ledger = self.ledgers.for_provider(provider);
        let external_id = activity.external_id.clone();
        let _guard = ledger.lock(&external_id).await;

        let existing = ledger.get(&external_id);
        let stored = ledger
            .upsert(SyncedRecord {
                external_id: external_id.clone(),
                raw_payload: activity.payload.clone(),
                local_record_id: existing.and_then(|r| r.local_record_id),
                synced_at: Utc::now(),
                start_date: activity.start_date,
            })
            .await?;

        if let Some(local_record_id) = stored.local_record_id {
            tracing::debug!(
                provider = %provider,
                external_id = %external_id,
                local_record_id = %local_record_id,
                "Activity already recorded"
            );
            return Ok(ProcessOutcome::AlreadyRecorded);
        }

        if !self.backend.health_check().await {
            tracing::warn!(
                provider = %provider,
                external_id = %external_id,
                "Record backend unavailable, skipping creation"
            );
            return Ok(ProcessOutcome::BackendUnavailable);
        }

        let draft = RecordDraft {
            activity: normalize(&activity.activity),
            source: provider.to_string(),
            source_id: external_id.clone(),
        };
        let created = self.backend.create_record(&draft).await?;
        ledger
            .set_local_record_id(&external_id, Some(created.id.clone()))
            .await?;

        tracing::info!(
            provider = %provider,
            external_id = %external_id,
            local_record_id = %created.id,
            "Local record created"
        );
        Ok(ProcessOutcome::Created {
            local_record_id: created.id,
        })
    }

    /// Fetch `[oldest, newest]` from `provider` and process every activity.
    pub async fn sync_provider(
        &self,
        provider: Provider,
        oldest: NaiveDate,
        newest: NaiveDate,
    ) -> Result<SyncReport, AppError> {
        let _flight = self.begin(provider)?;
        tracing::info!(provider = %provider, %oldest, %newest, "Manual sync started");

        let source = self.sources.for_provider(provider);
        let outcome = self.fetcher.fetch(source.as_ref(), oldest, newest).await?;

        let mut report = SyncReport {
            success: true,
            total: outcome.total,
            errors: outcome.errors,
            ..SyncReport::default()
        };

        for activity in outcome.activities {
            let external_id = activity.external_id.clone();
            match self.process_activity(provider, activity).await {
                Ok(result) => {
                    report.synced += 1;
                    if result.created() {
                        report.created += 1;
                    } else {
                        report.skipped += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        provider = %provider,
                        external_id = %external_id,
                        error = %e,
                        "Failed to process activity"
                    );
                    report
                        .errors
                        .push(format!("Activity {}: {}", external_id, e));
                }
            }
        }

        tracing::info!(
            provider = %provider,
            synced = report.synced,
            total = report.total,
            created = report.created,
            skipped = report.skipped,
            errors = report.errors.len(),
            "Manual sync finished"
        );
        Ok(report)
    }

    /// Clear every local record id for `provider`.
    pub async fn reset(&self, provider: Provider) -> Result<usize, AppError> {
        let _flight = self.begin(provider)?;
        self.ledgers.for_provider(provider).reset_all().await
    }

    /// Ledger rows, newest first.
    pub fn list_records(&self, provider: Provider) -> Vec<SyncedRecord> {
        self.ledgers.for_provider(provider).list_all(true)
    }
}
