// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod credential;
pub mod provider;
pub mod record;
pub mod webhook;

pub use credential::{IntervalsSettings, OAuthCredential};
pub use provider::{
    CalendarEvent, FetchedActivity, IntervalsActivity, IntervalsInterval, Provider,
    ProviderActivity, StravaActivity, StravaLap,
};
pub use record::{NormalizedActivity, ProData, RecordDraft, SportType, SyncedRecord};
pub use webhook::{WebhookEvent, WebhookEventKind, WebhookPayload};
