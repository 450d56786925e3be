// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-provider sync ledger.
//!
//! Maps remote activity ids to the downstream record created for them. The
//! `local_record_id` column is the idempotency marker: once set, routine
//! re-syncs keep it, and only [`SyncLedger::set_local_record_id`] or
//! [`SyncLedger::reset_all`] may change it.

use crate::db::{read_json, write_json_atomic};
use crate::error::AppError;
use crate::models::{Provider, SyncedRecord};
use chrono::NaiveDate;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Idempotency table for one provider.
pub struct SyncLedger {
    provider: Provider,
    rows: DashMap<String, SyncedRecord>,
    /// Per-external-id mutex serializing read-modify-write cycles.
    key_locks: DashMap<String, Arc<Mutex<()>>>,
    snapshot_path: Option<PathBuf>,
    snapshot_lock: Mutex<()>,
}

impl SyncLedger {
    pub fn in_memory(provider: Provider) -> Self {
        Self {
            provider,
            rows: DashMap::new(),
            key_locks: DashMap::new(),
            snapshot_path: None,
            snapshot_lock: Mutex::new(()),
        }
    }

    /// Open a ledger stored as `<dir>/<provider>_ledger.json`.
    pub async fn open(provider: Provider, dir: &Path) -> Result<Self, AppError> {
        let path = dir.join(format!("{}_ledger.json", provider));
        let stored: Vec<SyncedRecord> = read_json(&path).await?.unwrap_or_default();

        let ledger = Self {
            snapshot_path: Some(path),
            ..Self::in_memory(provider)
        };
        for row in stored {
            ledger.rows.insert(row.external_id.clone(), row);
        }

        tracing::info!(
            provider = %provider,
            rows = ledger.rows.len(),
            "Sync ledger loaded"
        );
        Ok(ledger)
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Acquire the lock for one external id.
    ///
    /// Hold the guard across the whole check-create-mark sequence.
    pub async fn lock(&self, external_id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .key_locks
            .entry(external_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    pub fn get(&self, external_id: &str) -> Option<SyncedRecord> {
        self.rows.get(external_id).map(|r| r.clone())
    }

    /// Insert or replace a row.
    ///
    /// A stored `local_record_id` survives an incoming row that carries
    /// `None`. Returns the row as stored.
    pub async fn upsert(&self, mut record: SyncedRecord) -> Result<SyncedRecord, AppError> {
        if record.local_record_id.is_none() {
            if let Some(existing) = self.rows.get(&record.external_id) {
                record.local_record_id = existing.local_record_id.clone();
            }
        }
        self.rows
            .insert(record.external_id.clone(), record.clone());
        self.persist().await?;
        Ok(record)
    }

    /// All rows ordered by start date (then id for stable output).
    pub fn list_all(&self, newest_first: bool) -> Vec<SyncedRecord> {
        let mut rows: Vec<SyncedRecord> = self.rows.iter().map(|r| r.value().clone()).collect();
        rows.sort_by(|a, b| {
            a.start_date
                .cmp(&b.start_date)
                .then_with(|| a.external_id.cmp(&b.external_id))
        });
        if newest_first {
            rows.reverse();
        }
        rows
    }

    /// Rows with `oldest <= start_date <= newest`, newest first.
    pub fn list_by_date_range(&self, oldest: NaiveDate, newest: NaiveDate) -> Vec<SyncedRecord> {
        self.list_all(true)
            .into_iter()
            .filter(|r| r.start_date >= oldest && r.start_date <= newest)
            .collect()
    }

    /// Assign or clear the idempotency marker. Returns `false` if no row exists.
    pub async fn set_local_record_id(
        &self,
        external_id: &str,
        local_record_id: Option<String>,
    ) -> Result<bool, AppError> {
        let updated = match self.rows.get_mut(external_id) {
            Some(mut row) => {
                row.local_record_id = local_record_id;
                true
            }
            None => false,
        };
        if updated {
            self.persist().await?;
        }
        Ok(updated)
    }

    /// Clear every `local_record_id`; returns how many were set.
    pub async fn reset_all(&self) -> Result<usize, AppError> {
        let mut cleared = 0;
        for mut row in self.rows.iter_mut() {
            if row.local_record_id.take().is_some() {
                cleared += 1;
            }
        }
        self.persist().await?;

        tracing::info!(provider = %self.provider, cleared, "Ledger reset");
        Ok(cleared)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    async fn persist(&self) -> Result<(), AppError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let _guard = self.snapshot_lock.lock().await;
        let rows = self.list_all(false);
        write_json_atomic(path, &rows).await
    }
}

/// One ledger per provider.
#[derive(Clone)]
pub struct Ledgers {
    pub strava: Arc<SyncLedger>,
    pub intervals: Arc<SyncLedger>,
}

impl Ledgers {
    pub fn in_memory() -> Self {
        Self {
            strava: Arc::new(SyncLedger::in_memory(Provider::Strava)),
            intervals: Arc::new(SyncLedger::in_memory(Provider::Intervals)),
        }
    }

    pub async fn open(dir: &Path) -> Result<Self, AppError> {
        Ok(Self {
            strava: Arc::new(SyncLedger::open(Provider::Strava, dir).await?),
            intervals: Arc::new(SyncLedger::open(Provider::Intervals, dir).await?),
        })
    }

    pub fn for_provider(&self, provider: Provider) -> &Arc<SyncLedger> {
        match provider {
            Provider::Strava => &self.strava,
            Provider::Intervals => &self.intervals,
        }
    }
}
