// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - provider clients, normalization and sync logic.

pub mod backend;
pub mod fetcher;
pub mod intervals;
pub mod normalizer;
pub mod pro_data;
pub mod strava;
pub mod sync;
pub mod webhook;

pub use backend::{CreatedRecord, HttpRecordBackend, RecordBackend};
pub use fetcher::{ActivityFetcher, ActivitySource, FetchOutcome, IntervalsSource, StravaSource};
pub use intervals::IntervalsClient;
pub use strava::{StravaClient, StravaStatus, TokenBroker};
pub use sync::{ActivitySources, ProcessOutcome, SyncReport, SyncService};
pub use webhook::{EventOutcome, WebhookIngestor, WebhookSummary};
