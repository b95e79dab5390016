// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Process-local cache backend with per-entry expiry.
//!
//! The map is bounded. Inserting a new key at capacity first sweeps expired
//! entries, then evicts the entry closest to expiry. List keys vary with the
//! client's `limit`, so without the bound the map would grow with traffic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use super::{CacheBackend, CacheError};
use crate::metrics;

/// Default cap on stored entries.
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

pub struct InMemoryCache {
    entries: DashMap<String, (String, Instant)>,
    writes: AtomicU64,
    max_entries: usize,
}

impl InMemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            writes: AtomicU64::new(0),
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }

    #[must_use]
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    /// Stored entries, expired or not
    #[must_use]
    pub fn stored(&self) -> usize {
        self.entries.len()
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, (_, expires)| *expires > now);
        let purged = before.saturating_sub(self.entries.len());
        if purged > 0 {
            metrics::record_cache_eviction("expired", purged);
        }
        purged
    }

    fn make_room(&self) {
        if self.entries.len() < self.max_entries {
            return;
        }
        self.purge_expired();
        while self.entries.len() >= self.max_entries {
            let victim = self
                .entries
                .iter()
                .min_by_key(|e| e.value().1)
                .map(|e| e.key().clone());
            match victim {
                Some(key) => {
                    self.entries.remove(&key);
                    metrics::record_cache_eviction("capacity", 1);
                }
                None => break,
            }
        }
    }

    /// Live (unexpired) entries
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| e.value().1 > now).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total entries written since creation
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Raw stored value, ignoring expiry
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|e| e.value().0.clone())
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        let hit = match self.entries.get(key) {
            Some(entry) if entry.value().1 > now => return Ok(Some(entry.value().0.clone())),
            Some(_) => true,
            None => false,
        };
        if hit {
            self.entries.remove_if(key, |_, (_, expires)| *expires <= now);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        if !self.entries.contains_key(key) {
            self.make_room();
        }
        self.entries
            .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_then_get() {
        let cache = InMemoryCache::new();
        cache.set("k", "v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some("v".into()));
        assert_eq!(cache.write_count(), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_reads_absent() {
        let cache = InMemoryCache::new();
        cache.set("k", "v", Duration::from_millis(5)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(cache.is_empty());
        assert!(cache.peek("k").is_none());
    }

    #[tokio::test]
    async fn test_set_resets_ttl() {
        let cache = InMemoryCache::new();
        cache.set("k", "v1", Duration::from_millis(5)).await.unwrap();
        cache.set("k", "v2", Duration::from_secs(60)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.get("k").await.unwrap(), Some("v2".into()));
    }

    #[tokio::test]
    async fn test_default_set_many_loops() {
        let cache = InMemoryCache::new();
        let entries = vec![("a".to_string(), "1".to_string()), ("b".to_string(), "2".to_string())];
        assert_eq!(cache.set_many(&entries, Duration::from_secs(60)).await.unwrap(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_capacity_bounds_distinct_keys() {
        let cache = InMemoryCache::new().with_max_entries(100);
        for limit in 1..=5000 {
            let key = format!("countries:limit={}:sort_by=name:order_by=asc", limit);
            cache.set(&key, "[]", Duration::from_secs(60)).await.unwrap();
        }
        assert_eq!(cache.stored(), 100);
        assert!(cache.peek("countries:limit=5000:sort_by=name:order_by=asc").is_some());
    }

    #[tokio::test]
    async fn test_full_cache_sweeps_expired_first() {
        let cache = InMemoryCache::new().with_max_entries(3);
        cache.set("old1", "v", Duration::from_millis(5)).await.unwrap();
        cache.set("old2", "v", Duration::from_millis(5)).await.unwrap();
        cache.set("keep", "v", Duration::from_secs(60)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        cache.set("new", "v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.stored(), 2);
        assert!(cache.peek("keep").is_some());
        assert!(cache.peek("new").is_some());
    }

    #[tokio::test]
    async fn test_overwrite_at_capacity_evicts_nothing() {
        let cache = InMemoryCache::new().with_max_entries(2);
        cache.set("a", "1", Duration::from_secs(60)).await.unwrap();
        cache.set("b", "1", Duration::from_secs(60)).await.unwrap();
        cache.set("a", "2", Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.stored(), 2);
        assert_eq!(cache.get("b").await.unwrap(), Some("1".into()));
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let cache = InMemoryCache::new();
        cache.set("a", "1", Duration::from_millis(5)).await.unwrap();
        cache.set("b", "1", Duration::from_secs(60)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.stored(), 1);
    }
}
