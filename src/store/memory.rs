// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Document-style in-memory store.
//!
//! Countries are keyed by name, images by id. Holds the same contract as
//! [`SqlStore`](super::sql::SqlStore), including constraint errors on a
//! duplicate insert, so it can stand in for it in tests and local runs.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::record::{CountryRecord, ImageRecord};
use super::query::CountryQuery;
use super::traits::{CountryStore, StorageError};

pub struct InMemoryStore {
    countries: DashMap<String, CountryRecord>,
    /// image_id -> (insertion sequence, metadata)
    images: DashMap<String, (u64, ImageRecord)>,
    image_seq: AtomicU64,
    /// Counts of write round trips, for asserting write behaviour in tests
    insert_calls: AtomicU64,
    update_calls: AtomicU64,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            countries: DashMap::new(),
            images: DashMap::new(),
            image_seq: AtomicU64::new(0),
            insert_calls: AtomicU64::new(0),
            update_calls: AtomicU64::new(0),
        }
    }

    /// Number of stored countries
    #[must_use]
    pub fn len(&self) -> usize {
        self.countries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.countries.is_empty()
    }

    /// Number of `bulk_insert` calls that reached the store
    #[must_use]
    pub fn insert_calls(&self) -> u64 {
        self.insert_calls.load(Ordering::Relaxed)
    }

    /// Number of `bulk_update` calls that reached the store
    #[must_use]
    pub fn update_calls(&self) -> u64 {
        self.update_calls.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CountryStore for InMemoryStore {
    async fn get_country(&self, name: &str) -> Result<Option<CountryRecord>, StorageError> {
        Ok(self.countries.get(name).map(|r| r.value().clone()))
    }

    async fn get_countries(&self, query: &CountryQuery) -> Result<Vec<CountryRecord>, StorageError> {
        let mut records: Vec<CountryRecord> = self.countries.iter().map(|r| r.value().clone()).collect();
        query.apply(&mut records);
        Ok(records)
    }

    async fn bulk_insert(&self, records: &[CountryRecord]) -> Result<usize, StorageError> {
        if records.is_empty() {
            return Ok(0);
        }
        self.insert_calls.fetch_add(1, Ordering::Relaxed);

        // All-or-nothing, like the SQL transaction
        if let Some(dup) = records.iter().find(|r| self.countries.contains_key(&r.name)) {
            return Err(StorageError::Constraint(format!("country '{}' already exists", dup.name)));
        }
        for record in records {
            self.countries.insert(record.name.clone(), record.clone());
        }
        Ok(records.len())
    }

    async fn bulk_update(&self, records: &[CountryRecord]) -> Result<usize, StorageError> {
        if records.is_empty() {
            return Ok(0);
        }
        self.update_calls.fetch_add(1, Ordering::Relaxed);

        let mut updated = 0;
        for record in records {
            if let Some(mut existing) = self.countries.get_mut(&record.name) {
                *existing = record.clone();
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn add_image_metadata(&self, image: &ImageRecord) -> Result<String, StorageError> {
        if self.images.contains_key(&image.image_id) {
            return Err(StorageError::Constraint(format!("image '{}' already exists", image.image_id)));
        }
        let seq = self.image_seq.fetch_add(1, Ordering::Relaxed);
        self.images.insert(image.image_id.clone(), (seq, image.clone()));
        Ok(image.image_id.clone())
    }

    async fn get_images_metadata(&self, country_name: &str) -> Result<Vec<ImageRecord>, StorageError> {
        let mut images: Vec<(u64, ImageRecord)> = self
            .images
            .iter()
            .filter(|r| r.value().1.country_name == country_name)
            .map(|r| r.value().clone())
            .collect();
        images.sort_by_key(|(seq, _)| *seq);
        Ok(images.into_iter().map(|(_, image)| image).collect())
    }

    async fn delete_image_metadata(&self, image_id: &str) -> Result<(), StorageError> {
        self.images.remove(image_id);
        Ok(())
    }

    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::query::{SortDirection, SortField};

    fn country(name: &str, population: u64, area: f64) -> CountryRecord {
        CountryRecord::new(name, "Region", population, area).unwrap()
    }

    fn image(id: &str, country: &str) -> ImageRecord {
        ImageRecord {
            image_id: id.into(),
            country_name: country.into(),
            title: format!("title-{}", id),
            description: "desc".into(),
        }
    }

    #[tokio::test]
    async fn test_new_store_is_empty() {
        let store = InMemoryStore::new();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = InMemoryStore::new();
        store.bulk_insert(&[country("Vali", 1_000_000, 50_000.0)]).await.unwrap();

        let found = store.get_country("Vali").await.unwrap().unwrap();
        assert_eq!(found.population_density, 20.0);
        assert!(store.get_country("Nowhere").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_bulk_ops_do_not_round_trip() {
        let store = InMemoryStore::new();
        assert_eq!(store.bulk_insert(&[]).await.unwrap(), 0);
        assert_eq!(store.bulk_update(&[]).await.unwrap(), 0);
        assert_eq!(store.insert_calls(), 0);
        assert_eq!(store.update_calls(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_constraint_error() {
        let store = InMemoryStore::new();
        store.bulk_insert(&[country("A", 1, 1.0)]).await.unwrap();

        let err = store
            .bulk_insert(&[country("B", 1, 1.0), country("A", 2, 1.0)])
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Constraint(_)));
        // Nothing from the failed batch landed
        assert!(store.get_country("B").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bulk_update_replaces_record() {
        let store = InMemoryStore::new();
        store.bulk_insert(&[country("A", 100, 10.0)]).await.unwrap();
        store.bulk_update(&[country("A", 200, 10.0)]).await.unwrap();

        let found = store.get_country("A").await.unwrap().unwrap();
        assert_eq!(found.population, 200);
        assert_eq!(found.population_density, 20.0);
    }

    #[tokio::test]
    async fn test_get_countries_sorted_and_limited() {
        let store = InMemoryStore::new();
        store
            .bulk_insert(&[country("A", 300, 1.0), country("B", 100, 1.0), country("C", 200, 1.0)])
            .await
            .unwrap();

        let query = CountryQuery::new(Some(2), SortField::Population, SortDirection::Asc).unwrap();
        let names: Vec<_> = store
            .get_countries(&query)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["B", "C"]);
    }

    #[tokio::test]
    async fn test_images_in_insertion_order_per_country() {
        let store = InMemoryStore::new();
        store.add_image_metadata(&image("z", "Vali")).await.unwrap();
        store.add_image_metadata(&image("a", "Vali")).await.unwrap();
        store.add_image_metadata(&image("m", "Other")).await.unwrap();

        let ids: Vec<_> = store
            .get_images_metadata("Vali")
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.image_id)
            .collect();
        assert_eq!(ids, vec!["z", "a"]);
    }

    #[tokio::test]
    async fn test_delete_image_metadata() {
        let store = InMemoryStore::new();
        store.add_image_metadata(&image("x", "Vali")).await.unwrap();
        store.delete_image_metadata("x").await.unwrap();
        assert!(store.get_images_metadata("Vali").await.unwrap().is_empty());
        // Deleting again is not an error
        assert!(store.delete_image_metadata("x").await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_inserts() {
        use std::sync::Arc;

        let store = Arc::new(InMemoryStore::new());
        let mut handles = vec![];
        for batch in 0..10 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let records: Vec<_> = (0..10)
                    .map(|i| country(&format!("c-{}-{}", batch, i), 10, 1.0))
                    .collect();
                store.bulk_insert(&records).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(store.len(), 100);
    }
}
