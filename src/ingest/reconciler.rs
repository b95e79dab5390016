// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Change detection for an upstream batch.
//!
//! Each incoming record is compared with its last-known state (cache first,
//! store on a cache miss) and lands in exactly one bucket:
//!
//! | last known          | population/area | decision    |
//! |---------------------|-----------------|-------------|
//! | absent              | -               | `New`       |
//! | present             | differ          | `Updated`   |
//! | present             | equal           | `Unchanged` |
//!
//! Only reads happen here. Writing the plan out is the job of
//! [`WritePropagator`](super::propagator::WritePropagator).

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::cache::{CacheKey, ReadThroughCache};
use crate::error::IngestError;
use crate::metrics;
use crate::record::{CountryRecord, RawCountry};
use crate::store::CountryStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    New,
    Updated,
    Unchanged,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
        }
    }
}

/// Outcome of classifying one batch. Both lists keep input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcilePlan {
    pub new: Vec<CountryRecord>,
    pub updated: Vec<CountryRecord>,
    pub unchanged: usize,
}

impl ReconcilePlan {
    /// Nothing to write.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.updated.is_empty()
    }
}

pub struct Reconciler {
    store: Arc<dyn CountryStore>,
    cache: Arc<ReadThroughCache>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn CountryStore>, cache: Arc<ReadThroughCache>) -> Self {
        Self { store, cache }
    }

    async fn last_known(&self, name: &str) -> Result<Option<CountryRecord>, IngestError> {
        if let Some(record) = self.cache.get_record::<CountryRecord>(&CacheKey::country(name)).await {
            return Ok(Some(record));
        }
        Ok(self.store.get_country(name).await?)
    }

    /// Classify a raw batch. The first malformed record or store failure
    /// aborts the whole batch.
    pub async fn classify(&self, batch: &[Value]) -> Result<ReconcilePlan, IngestError> {
        let mut plan = ReconcilePlan::default();
        // name -> (decision, position in its list) for records already planned
        let mut pending: HashMap<String, (Decision, usize)> = HashMap::new();

        for (index, value) in batch.iter().enumerate() {
            let record = RawCountry::from_value(index, value)?.into_record()?;

            let decision = if let Some(&(bucket, pos)) = pending.get(&record.name) {
                // Repeated name inside this batch: the later record replaces the pending one
                let list = match bucket {
                    Decision::New => &mut plan.new,
                    _ => &mut plan.updated,
                };
                if list[pos].same_measurements(record.population, record.area) {
                    plan.unchanged += 1;
                    Decision::Unchanged
                } else {
                    list[pos] = record;
                    bucket
                }
            } else {
                match self.last_known(&record.name).await? {
                    None => {
                        pending.insert(record.name.clone(), (Decision::New, plan.new.len()));
                        plan.new.push(record);
                        Decision::New
                    }
                    Some(known) if !known.same_measurements(record.population, record.area) => {
                        pending.insert(record.name.clone(), (Decision::Updated, plan.updated.len()));
                        plan.updated.push(record);
                        Decision::Updated
                    }
                    Some(_) => {
                        plan.unchanged += 1;
                        Decision::Unchanged
                    }
                }
            };

            debug!(index, decision = decision.as_str(), "Classified country");
            metrics::record_decision(decision.as_str());
        }

        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use crate::error::DataError;
    use crate::store::InMemoryStore;
    use serde_json::json;

    fn raw(name: &str, population: u64, area: f64) -> Value {
        json!({"name": {"common": name}, "region": "Europe", "population": population, "area": area})
    }

    fn setup() -> (Arc<InMemoryStore>, Arc<ReadThroughCache>, Reconciler) {
        let store = Arc::new(InMemoryStore::new());
        let cache = Arc::new(ReadThroughCache::new(Arc::new(InMemoryCache::new())));
        let reconciler = Reconciler::new(store.clone(), cache.clone());
        (store, cache, reconciler)
    }

    #[tokio::test]
    async fn test_unknown_country_is_new() {
        let (_, _, reconciler) = setup();
        let plan = reconciler.classify(&[raw("Vali", 1_000_000, 50_000.0)]).await.unwrap();

        assert_eq!(plan.new.len(), 1);
        assert_eq!(plan.new[0].population_density, 20.0);
        assert!(plan.updated.is_empty());
        assert_eq!(plan.unchanged, 0);
    }

    #[tokio::test]
    async fn test_cached_country_unchanged() {
        let (_, cache, reconciler) = setup();
        let vali = CountryRecord::new("Vali", "Europe", 1_000_000, 50_000.0).unwrap();
        cache.set_record(&CacheKey::country("Vali"), &vali).await;

        let plan = reconciler.classify(&[raw("Vali", 1_000_000, 50_000.0)]).await.unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.unchanged, 1);
    }

    #[tokio::test]
    async fn test_store_consulted_on_cache_miss() {
        let (store, _, reconciler) = setup();
        store
            .bulk_insert(&[CountryRecord::new("Vali", "Europe", 1_000_000, 50_000.0).unwrap()])
            .await
            .unwrap();

        let plan = reconciler.classify(&[raw("Vali", 1_200_000, 50_000.0)]).await.unwrap();
        assert!(plan.new.is_empty());
        assert_eq!(plan.updated.len(), 1);
        assert_eq!(plan.updated[0].population_density, 24.0);
    }

    #[tokio::test]
    async fn test_area_change_is_update() {
        let (_, cache, reconciler) = setup();
        let known = CountryRecord::new("A", "R", 1000, 10.0).unwrap();
        cache.set_record(&CacheKey::country("A"), &known).await;

        let plan = reconciler.classify(&[raw("A", 1000, 20.0)]).await.unwrap();
        assert_eq!(plan.updated.len(), 1);
        assert_eq!(plan.updated[0].population_density, 50.0);
    }

    #[tokio::test]
    async fn test_missing_field_aborts_batch() {
        let (_, _, reconciler) = setup();
        let batch = vec![
            raw("Country1", 1000, 10.0),
            json!({"name": {"common": "Country2"}, "region": "Region2", "population": 2000}),
        ];
        let err = reconciler.classify(&batch).await.unwrap_err();
        assert!(matches!(err, IngestError::Data(DataError::Malformed { index: 1, .. })));
    }

    #[tokio::test]
    async fn test_zero_area_aborts_batch() {
        let (_, _, reconciler) = setup();
        let err = reconciler.classify(&[raw("Void", 10, 0.0)]).await.unwrap_err();
        assert!(matches!(err, IngestError::Data(DataError::NonPositiveArea { .. })));
    }

    #[tokio::test]
    async fn test_repeated_name_in_batch_later_wins() {
        let (_, _, reconciler) = setup();
        let plan = reconciler
            .classify(&[raw("A", 100, 10.0), raw("B", 1, 1.0), raw("A", 300, 10.0), raw("A", 300, 10.0)])
            .await
            .unwrap();

        let names: Vec<_> = plan.new.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(plan.new[0].population, 300);
        assert_eq!(plan.unchanged, 1);
    }

    #[tokio::test]
    async fn test_input_order_preserved() {
        let (_, _, reconciler) = setup();
        let plan = reconciler
            .classify(&[raw("C", 1, 1.0), raw("A", 1, 1.0), raw("B", 1, 1.0)])
            .await
            .unwrap();
        let names: Vec<_> = plan.new.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["C", "A", "B"]);
    }

    #[tokio::test]
    async fn test_classify_performs_no_writes() {
        let (store, _, reconciler) = setup();
        reconciler.classify(&[raw("Vali", 1_000_000, 50_000.0)]).await.unwrap();
        assert_eq!(store.insert_calls(), 0);
        assert_eq!(store.update_calls(), 0);
    }
}
