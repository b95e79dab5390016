// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Startup wiring: build every component from a [`ServiceConfig`].

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::info;

use crate::blob::{BlobStore, FsBlobStore};
use crate::cache::{CacheBackend, CacheError, InMemoryCache, ReadThroughCache, RedisCache};
use crate::config::{ConfigError, ServiceConfig};
use crate::ingest::{CountrySource, IngestionPipeline, IngestionScheduler, RestCountriesClient, SourceError};
use crate::metrics;
use crate::service::CountryService;
use crate::store::{CountryStore, SqlStore, StorageError};
use crate::web::AppState;

#[derive(Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Store unavailable: {0}")]
    Store(#[from] StorageError),
    #[error("Cache unavailable: {0}")]
    Cache(#[from] CacheError),
    #[error("Upstream client: {0}")]
    Source(#[from] SourceError),
}

/// Connection string without credentials, for logs.
fn redacted(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}

/// Every long-lived component, shared through `Arc`s.
pub struct App {
    pub config: ServiceConfig,
    pub store: Arc<dyn CountryStore>,
    pub cache: Arc<ReadThroughCache>,
    pub blobs: Arc<dyn BlobStore>,
    pub service: Arc<CountryService>,
    pub pipeline: Arc<IngestionPipeline>,
}

impl App {
    /// Connect store and cache (with startup retry) and assemble the rest.
    #[tracing::instrument(skip(config))]
    pub async fn build(config: ServiceConfig) -> Result<Self, StartupError> {
        let startup = Instant::now();
        config.validate()?;

        let phase = Instant::now();
        info!(url = %redacted(&config.database_url), "Connecting to store");
        let store: Arc<dyn CountryStore> = Arc::new(SqlStore::new(&config.database_url).await?);
        metrics::record_startup_phase("store_connect", phase.elapsed());

        let phase = Instant::now();
        let backend: Arc<dyn CacheBackend> = match &config.redis_url {
            Some(url) => {
                info!(url = %redacted(url), "Connecting to Redis cache");
                Arc::new(RedisCache::with_prefix(url, config.redis_prefix.as_deref()).await?)
            }
            None => {
                info!("No redis_url configured, using in-process cache");
                Arc::new(InMemoryCache::new().with_max_entries(config.cache_max_entries))
            }
        };
        metrics::record_startup_phase("cache_connect", phase.elapsed());

        let cache = Arc::new(
            ReadThroughCache::new(backend)
                .with_ttl(config.cache_ttl())
                .with_op_timeout(config.cache_op_timeout()),
        );
        let blobs: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(&config.blob_root));
        let source: Arc<dyn CountrySource> =
            Arc::new(RestCountriesClient::new(&config.source_url, config.source_timeout())?);

        let app = Self::assemble(config, store, cache, blobs, source);
        metrics::record_startup_phase("total", startup.elapsed());
        info!(duration_ms = startup.elapsed().as_millis() as u64, "Startup complete");
        Ok(app)
    }

    /// Assemble from already-built parts.
    pub fn assemble(
        config: ServiceConfig,
        store: Arc<dyn CountryStore>,
        cache: Arc<ReadThroughCache>,
        blobs: Arc<dyn BlobStore>,
        source: Arc<dyn CountrySource>,
    ) -> Self {
        let service = Arc::new(
            CountryService::new(store.clone(), cache.clone(), blobs.clone())
                .with_image_cache_mode(config.image_cache_mode),
        );
        let pipeline = Arc::new(IngestionPipeline::new(source, store.clone(), cache.clone()));
        Self { config, store, cache, blobs, service, pipeline }
    }

    pub fn scheduler(&self) -> IngestionScheduler {
        IngestionScheduler::new(
            self.pipeline.clone(),
            self.config.ingest_interval(),
            self.config.ingest_on_startup,
        )
    }

    pub fn state(&self) -> AppState {
        AppState { service: self.service.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::StaticSource;

    #[test]
    fn test_redacted_hides_credentials() {
        assert_eq!(redacted("mysql://user:secret@db:3306/countries"), "mysql://***@db:3306/countries");
        assert_eq!(redacted("sqlite:countries.db?mode=rwc"), "sqlite:countries.db?mode=rwc");
        assert_eq!(redacted("redis://localhost:6379"), "redis://localhost:6379");
    }

    #[tokio::test]
    async fn test_build_with_sqlite_and_memory_cache() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServiceConfig {
            database_url: format!("sqlite://{}?mode=rwc", dir.path().join("c.db").display()),
            blob_root: dir.path().join("assets").display().to_string(),
            ..Default::default()
        };

        let app = App::build(config).await.unwrap();
        assert!(app.store.ping().await.is_ok());
        assert!(app.cache.is_healthy().await);
    }

    #[tokio::test]
    async fn test_assemble_runs_pipeline() {
        let store = Arc::new(crate::store::InMemoryStore::new());
        let cache = Arc::new(ReadThroughCache::new(Arc::new(InMemoryCache::new())));
        let source = Arc::new(StaticSource::new(vec![serde_json::json!({
            "name": {"common": "Vali"}, "region": "Europe", "population": 1_000_000, "area": 50_000.0
        })]));
        let app = App::assemble(
            ServiceConfig::default(),
            store.clone(),
            cache,
            Arc::new(crate::blob::InMemoryBlobStore::new()),
            source,
        );

        app.scheduler().trigger().await.unwrap();
        assert_eq!(app.service.get_country("Vali").await.unwrap().population_density, 20.0);
    }
}
