// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Applies a [`ReconcilePlan`]: store first, then one cache batch.
//!
//! A store failure is returned before the cache is touched. A cache failure
//! is only counted, since the store is already authoritative by then.

use std::sync::Arc;

use tracing::{info, warn};

use crate::cache::{CacheKey, ReadThroughCache};
use crate::record::CountryRecord;
use crate::store::{CountryStore, StorageError};
use super::reconciler::ReconcilePlan;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PropagationReport {
    pub inserted: usize,
    pub updated: usize,
    pub cached: usize,
    pub cache_failures: usize,
}

pub struct WritePropagator {
    store: Arc<dyn CountryStore>,
    cache: Arc<ReadThroughCache>,
}

impl WritePropagator {
    pub fn new(store: Arc<dyn CountryStore>, cache: Arc<ReadThroughCache>) -> Self {
        Self { store, cache }
    }

    pub async fn apply(&self, plan: &ReconcilePlan) -> Result<PropagationReport, StorageError> {
        let mut report = PropagationReport::default();

        if !plan.new.is_empty() {
            report.inserted = self.store.bulk_insert(&plan.new).await?;
        }
        if !plan.updated.is_empty() {
            report.updated = self.store.bulk_update(&plan.updated).await?;
            if report.updated < plan.updated.len() {
                let missing = self.absent_from_store(&plan.updated).await?;
                if !missing.is_empty() {
                    // Last-known state came from a cache the store no longer backs
                    warn!(count = missing.len(), "Updated countries absent from store, inserting instead");
                    report.inserted += self.store.bulk_insert(&missing).await?;
                }
                report.updated = plan.updated.len() - missing.len();
            }
        }

        let entries: Vec<(CacheKey, &CountryRecord)> = plan
            .new
            .iter()
            .chain(plan.updated.iter())
            .map(|record| (CacheKey::country(record.name.as_str()), record))
            .collect();

        if !entries.is_empty() {
            report.cached = self.cache.set_records(&entries).await;
            report.cache_failures = entries.len() - report.cached;
            if report.cache_failures > 0 {
                warn!(failed = report.cache_failures, "Cache refresh incomplete after store write");
            }
        }

        info!(
            inserted = report.inserted,
            updated = report.updated,
            cached = report.cached,
            "Propagated changes"
        );
        Ok(report)
    }

    async fn absent_from_store(&self, records: &[CountryRecord]) -> Result<Vec<CountryRecord>, StorageError> {
        let mut missing = Vec::new();
        for record in records {
            if self.store.get_country(&record.name).await?.is_none() {
                missing.push(record.clone());
            }
        }
        Ok(missing)
    }
}
