// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Read-through cache.
//!
//! [`CacheBackend`] is the raw transport and may fail. [`ReadThroughCache`]
//! wraps it and never does: every backend error or timeout is logged,
//! counted, and turned into a miss (reads) or `false` (writes). A cache
//! outage therefore costs latency, not correctness.
//!
//! Values are stored inside a tagged envelope (see [`envelope`]), so a value
//! of the wrong kind or an older schema reads as a miss rather than as a
//! half-decoded object.

pub mod envelope;
pub mod keys;
pub mod memory;
pub mod redis;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::metrics;
pub use envelope::{Cacheable, RecordKind};
pub use keys::CacheKey;
pub use memory::InMemoryCache;
pub use self::redis::RedisCache;

/// Default time-to-live of every cache entry (24h).
pub const DEFAULT_TTL: Duration = Duration::from_secs(86_400);

/// Default bound on a single cache round trip.
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache backend error: {0}")]
    Backend(String),
    #[error("Cache operation timed out")]
    Timeout,
}

/// Key/value transport with per-entry TTL.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store `value`, resetting the TTL of `key`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Store many entries. Returns how many were written.
    async fn set_many(&self, entries: &[(String, String)], ttl: Duration) -> Result<usize, CacheError> {
        for (key, value) in entries {
            self.set(key, value, ttl).await?;
        }
        Ok(entries.len())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

/// Fail-open façade over a [`CacheBackend`].
pub struct ReadThroughCache {
    backend: Arc<dyn CacheBackend>,
    ttl: Duration,
    op_timeout: Duration,
}

impl ReadThroughCache {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend,
            ttl: DEFAULT_TTL,
            op_timeout: DEFAULT_OP_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_op_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, CacheError>
    where
        F: std::future::Future<Output = Result<T, CacheError>>,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout),
        }
    }

    /// Raw lookup. Any failure is a miss.
    pub async fn get(&self, key: &str) -> Option<String> {
        match self.bounded(self.backend.get(key)).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed, treating as miss");
                metrics::record_cache_error("get");
                None
            }
        }
    }

    /// Raw write. Returns `false` on failure; never errors.
    pub async fn set(&self, key: &str, value: &str) -> bool {
        match self.bounded(self.backend.set(key, value, self.ttl)).await {
            Ok(()) => {
                metrics::record_cache_write("success", 1);
                true
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Cache write failed");
                metrics::record_cache_error("set");
                metrics::record_cache_write("error", 1);
                false
            }
        }
    }

    /// Raw multi-write. Returns the number of entries written (0 on failure).
    pub async fn set_many(&self, entries: &[(String, String)]) -> usize {
        if entries.is_empty() {
            return 0;
        }
        match self.bounded(self.backend.set_many(entries, self.ttl)).await {
            Ok(written) => {
                metrics::record_cache_write("success", written);
                written
            }
            Err(e) => {
                warn!(count = entries.len(), error = %e, "Cache batch write failed");
                metrics::record_cache_error("set_many");
                metrics::record_cache_write("error", entries.len());
                0
            }
        }
    }

    /// Typed lookup. Absent, failing, or undecodable entries are all `None`.
    pub async fn get_record<T: Cacheable>(&self, key: &CacheKey) -> Option<T> {
        let key_str = key.to_string();
        let Some(raw) = self.get(&key_str).await else {
            debug!(key = %key_str, "Cache miss");
            metrics::record_cache_lookup(key.kind(), "miss");
            return None;
        };
        match envelope::decode::<T>(&raw) {
            Ok(value) => {
                debug!(key = %key_str, "Cache hit");
                metrics::record_cache_lookup(key.kind(), "hit");
                Some(value)
            }
            Err(e) => {
                warn!(key = %key_str, error = %e, "Discarding stale cache entry");
                metrics::record_cache_lookup(key.kind(), "stale");
                None
            }
        }
    }

    /// Typed write. Returns `false` on failure.
    pub async fn set_record<T: Cacheable>(&self, key: &CacheKey, value: &T) -> bool {
        match envelope::encode(value) {
            Ok(raw) => self.set(&key.to_string(), &raw).await,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to encode cache value");
                false
            }
        }
    }

    /// Typed multi-write in one backend call. Returns entries written.
    pub async fn set_records<T: Cacheable>(&self, entries: &[(CacheKey, &T)]) -> usize {
        let mut encoded = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            match envelope::encode(*value) {
                Ok(raw) => encoded.push((key.to_string(), raw)),
                Err(e) => warn!(key = %key, error = %e, "Failed to encode cache value"),
            }
        }
        self.set_many(&encoded).await
    }

    /// Whether the backend answers within the op timeout.
    pub async fn is_healthy(&self) -> bool {
        let healthy = self.bounded(self.backend.ping()).await.is_ok();
        metrics::set_backend_healthy("cache", healthy);
        healthy
    }
}
