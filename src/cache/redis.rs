// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Redis cache backend.
//!
//! Plain string values with `SET key value EX ttl`. Batch writes go out as a
//! single pipeline. Connection setup retries with the startup preset;
//! individual operations do not retry.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{cmd, pipe, AsyncCommands, Client};
use tracing::info;

use super::{CacheBackend, CacheError};
use crate::resilience::retry::{retry, RetryConfig};

fn backend(e: redis::RedisError) -> CacheError {
    CacheError::Backend(e.to_string())
}

pub struct RedisCache {
    connection: ConnectionManager,
    /// Optional key prefix for namespacing (e.g., "countries-svc:" → "countries-svc:country:Vali")
    prefix: String,
}

impl RedisCache {
    pub async fn new(connection_string: &str) -> Result<Self, CacheError> {
        Self::with_prefix(connection_string, None).await
    }

    /// Connect with an optional key prefix, for sharing a Redis instance.
    ///
    /// ```rust,no_run
    /// # use country_service::cache::RedisCache;
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let cache = RedisCache::with_prefix("redis://localhost", Some("countries:")).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn with_prefix(connection_string: &str, prefix: Option<&str>) -> Result<Self, CacheError> {
        let client = Client::open(connection_string).map_err(backend)?;

        let connection = retry("redis_connect", &RetryConfig::startup(), || async {
            ConnectionManager::new(client.clone()).await
        })
        .await
        .map_err(backend)?;

        info!(prefix = prefix.unwrap_or(""), "Redis cache connected");
        Ok(Self {
            connection,
            prefix: prefix.unwrap_or("").to_string(),
        })
    }

    #[inline]
    fn prefixed_key(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}{}", self.prefix, key)
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

#[async_trait]
impl CacheBackend for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection.clone();
        conn.get(self.prefixed_key(key)).await.map_err(backend)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        cmd("SET")
            .arg(self.prefixed_key(key))
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async::<()>(&mut conn)
            .await
            .map_err(backend)
    }

    async fn set_many(&self, entries: &[(String, String)], ttl: Duration) -> Result<usize, CacheError> {
        if entries.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection.clone();
        let mut pipeline = pipe();
        for (key, value) in entries {
            pipeline
                .cmd("SET")
                .arg(self.prefixed_key(key))
                .arg(value)
                .arg("EX")
                .arg(ttl.as_secs().max(1))
                .ignore();
        }
        pipeline.query_async::<()>(&mut conn).await.map_err(backend)?;
        Ok(entries.len())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        cmd("PING").query_async::<String>(&mut conn).await.map(|_| ()).map_err(backend)
    }
}
