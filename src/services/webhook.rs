// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Intervals.icu webhook ingestion.

use crate::db::SettingsRepository;
use crate::error::AppError;
use crate::models::{FetchedActivity, Provider, WebhookEvent, WebhookEventKind, WebhookPayload};
use crate::services::sync::SyncService;
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Counts for one webhook batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WebhookSummary {
    pub processed: usize,
    pub created: usize,
}

/// Result of one event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventOutcome {
    pub created: bool,
    /// Local records created (calendar events may carry several workouts)
    pub records: usize,
}

impl EventOutcome {
    fn from_records(records: usize) -> Self {
        Self {
            created: records > 0,
            records,
        }
    }
}

pub struct WebhookIngestor {
    settings: SettingsRepository,
    sync: Arc<SyncService>,
}

impl WebhookIngestor {
    pub fn new(settings: SettingsRepository, sync: Arc<SyncService>) -> Self {
        Self { settings, sync }
    }

    /// Check the payload secret against the configured one.
    ///
    /// Without a configured secret every request is accepted.
    pub async fn verify_secret(&self, provided: Option<&str>) -> Result<(), AppError> {
        let Some(expected) = self.settings.intervals_settings().await?.webhook_secret else {
            return Ok(());
        };

        let provided = provided.unwrap_or_default();
        if bool::from(expected.as_bytes().ct_eq(provided.as_bytes())) {
            Ok(())
        } else {
            tracing::warn!("Webhook secret mismatch");
            Err(AppError::Unauthorized)
        }
    }

    /// Authenticate, then process every event in order.
    pub async fn handle_batch(&self, payload: &WebhookPayload) -> Result<WebhookSummary, AppError> {
        self.verify_secret(payload.secret.as_deref()).await?;

        let mut summary = WebhookSummary::default();
        for raw in &payload.events {
            summary.processed += 1;
            let event = match WebhookEvent::from_value(raw.clone()) {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping undecodable webhook event");
                    continue;
                }
            };
            summary.created += self.handle_event(&event).await.records;
        }

        tracing::info!(
            processed = summary.processed,
            created = summary.created,
            "Webhook batch handled"
        );
        Ok(summary)
    }

    /// Process one event. Failures are logged and reported as not created.
    pub async fn handle_event(&self, event: &WebhookEvent) -> EventOutcome {
        tracing::info!(
            event_type = %event.event_type,
            athlete_id = ?event.athlete_id,
            timestamp = ?event.timestamp,
            "Webhook event received"
        );

        match event.kind() {
            WebhookEventKind::ActivityUploaded
            | WebhookEventKind::ActivityAnalyzed
            | WebhookEventKind::ActivityUpdated => {
                let Some(payload) = event.activity.clone() else {
                    tracing::warn!(event_type = %event.event_type, "Activity event without activity");
                    return EventOutcome::default();
                };
                match FetchedActivity::from_payload(Provider::Intervals, payload) {
                    Ok(activity) => EventOutcome::from_records(self.process(activity).await),
                    Err(e) => {
                        tracing::warn!(error = %e, "Undecodable webhook activity");
                        EventOutcome::default()
                    }
                }
            }
            WebhookEventKind::CalendarUpdated => {
                let mut records = 0;
                for entry in &event.events {
                    match FetchedActivity::from_calendar_event(entry.clone()) {
                        Ok(Some(activity)) => records += self.process(activity).await,
                        Ok(None) => {
                            tracing::debug!("Skipping non-workout calendar entry");
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Undecodable calendar entry");
                        }
                    }
                }
                EventOutcome::from_records(records)
            }
            WebhookEventKind::ActivityDeleted => {
                // Local history stays authoritative once captured.
                tracing::info!(
                    deleted = ?event.deleted_events,
                    "Activity deleted upstream, local records kept"
                );
                EventOutcome::default()
            }
            WebhookEventKind::Unknown => {
                tracing::info!(event_type = %event.event_type, "Ignoring unknown webhook event type");
                EventOutcome::default()
            }
        }
    }

    /// Returns the number of records created (0 or 1).
    async fn process(&self, activity: FetchedActivity) -> usize {
        let external_id = activity.external_id.clone();
        match self.sync.process_activity(Provider::Intervals, activity).await {
            Ok(outcome) => usize::from(outcome.created()),
            Err(e) => {
                tracing::warn!(
                    external_id = %external_id,
                    error = %e,
                    "Webhook activity not recorded"
                );
                0
            }
        }
    }
}
