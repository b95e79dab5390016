// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # Country Service
//!
//! Country reference data and per-country images over HTTP, backed by a
//! relational store, a read-through cache, and a periodic ingestion job.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────┐        ┌──────────────────────────────┐
//! │   restcountries.com      │        │        HTTP clients          │
//! └────────────┬─────────────┘        └───────────────┬──────────────┘
//!              │ fetch_batch                          │ axum
//!              ▼                                      ▼
//! ┌──────────────────────────┐        ┌──────────────────────────────┐
//! │  Reconciler              │        │  CountryService (read path)  │
//! │  new / updated / same    │        │  cache-aside, image upload   │
//! └────────────┬─────────────┘        └───────┬──────────────┬───────┘
//!              ▼                              │              │
//! ┌──────────────────────────┐                │              ▼
//! │  WritePropagator         │                │     ┌─────────────────┐
//! │  store first, then cache │                │     │  BlobStore      │
//! └──────┬────────────┬──────┘                │     └─────────────────┘
//!        ▼            ▼                       ▼
//! ┌────────────┐ ┌──────────────────────────────────────┐
//! │ SqlStore   │ │ ReadThroughCache (Redis, 24h TTL)    │
//! │ (truth)    │ │ fail-open: errors become misses      │
//! └────────────┘ └──────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use country_service::{App, ServiceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig {
//!         redis_url: Some("redis://localhost:6379".into()),
//!         ..Default::default()
//!     };
//!     let app = App::build(config).await?;
//!
//!     let report = app.pipeline.run_once().await?;
//!     println!("{} new, {} updated", report.new, report.updated);
//!
//!     let vali = app.service.get_country("Vali").await?;
//!     println!("density: {}", vali.population_density);
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod blob;
pub mod cache;
pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod record;
pub mod resilience;
pub mod service;
pub mod store;
pub mod web;

pub use app::{App, StartupError};
pub use blob::{BlobStore, FsBlobStore, InMemoryBlobStore};
pub use cache::{CacheBackend, CacheKey, InMemoryCache, ReadThroughCache, RedisCache};
pub use config::ServiceConfig;
pub use error::{DataError, IngestError, ServiceError, ValidationError};
pub use ingest::{IngestReport, IngestionPipeline, IngestionScheduler, ReconcilePlan, Reconciler, WritePropagator};
pub use record::{CountryRecord, ImageEntry, ImageRecord};
pub use resilience::retry::RetryConfig;
pub use service::{CountryService, ImageCacheMode};
pub use store::{CountryQuery, CountryStore, InMemoryStore, SortDirection, SortField, SqlStore, StorageError};
pub use metrics::LatencyTimer;
