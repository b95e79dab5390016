// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use async_trait::async_trait;
use thiserror::Error;

use crate::record::{CountryRecord, ImageRecord};
use super::query::CountryQuery;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("Constraint violation: {0}")]
    Constraint(String),
}

/// Uniform CRUD surface over countries and image metadata.
///
/// Implementations must not retry failed operations; failures propagate so
/// the caller can abort (ingestion) or answer 500 (read path).
#[async_trait]
pub trait CountryStore: Send + Sync {
    async fn get_country(&self, name: &str) -> Result<Option<CountryRecord>, StorageError>;

    async fn get_countries(&self, query: &CountryQuery) -> Result<Vec<CountryRecord>, StorageError>;

    /// Insert new countries. An empty slice returns immediately without I/O.
    async fn bulk_insert(&self, records: &[CountryRecord]) -> Result<usize, StorageError>;

    /// Replace existing countries (every attribute except the name).
    /// An empty slice returns immediately without I/O.
    async fn bulk_update(&self, records: &[CountryRecord]) -> Result<usize, StorageError>;

    /// Persist image metadata and return its id.
    async fn add_image_metadata(&self, image: &ImageRecord) -> Result<String, StorageError>;

    async fn get_images_metadata(&self, country_name: &str) -> Result<Vec<ImageRecord>, StorageError>;

    /// Remove image metadata (compensation for a failed blob write).
    async fn delete_image_metadata(&self, image_id: &str) -> Result<(), StorageError>;

    /// Cheap connectivity check.
    async fn ping(&self) -> Result<(), StorageError>;
}
