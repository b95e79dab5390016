// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error taxonomy.
//!
//! | Category          | Type                | Surfaced as                       |
//! |-------------------|---------------------|-----------------------------------|
//! | bad parameters    | [`ValidationError`] | 400, before any I/O               |
//! | bad upstream data | [`DataError`]       | aborts the ingestion batch        |
//! | store failure     | [`StorageError`]    | 500 / aborts the ingestion batch  |
//! | cache failure     | `CacheError`        | never surfaced, becomes a miss    |
//!
//! Cache errors live in [`crate::cache`] because nothing outside the cache
//! module is allowed to see them.

use thiserror::Error;

pub use crate::blob::BlobError;
pub use crate::ingest::source::SourceError;
pub use crate::store::traits::StorageError;

/// Rejected request parameters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Limit must be a positive integer, got '{0}'")]
    InvalidLimit(String),
    #[error("Invalid sort field '{field}', expected one of: {allowed}")]
    InvalidSortField { field: String, allowed: String },
    #[error("Invalid sort order '{order}', expected one of: {allowed}")]
    InvalidSortOrder { order: String, allowed: String },
    #[error("Invalid country name '{0}'")]
    InvalidCountryName(String),
}

/// Malformed upstream record. Fatal to the ingestion batch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataError {
    #[error("Couldn't process country at index {index}: {reason}")]
    Malformed { index: usize, reason: String },
    #[error("Country '{name}' has non-positive area {area}, cannot compute population density")]
    NonPositiveArea { name: String, area: f64 },
}

/// Errors returned by the read path.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{resource} '{id}' not found")]
    NotFound { resource: &'static str, id: String },
    #[error(transparent)]
    Store(#[from] StorageError),
    #[error(transparent)]
    Blob(#[from] BlobError),
}

impl ServiceError {
    pub fn country_not_found(name: &str) -> Self {
        Self::NotFound { resource: "Country", id: name.to_string() }
    }
}

/// Errors that abort an ingestion run.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Failed to fetch countries: {0}")]
    Source(#[from] SourceError),
    #[error(transparent)]
    Data(#[from] DataError),
    #[error("Store write failed, run aborted: {0}")]
    Store(#[from] StorageError),
    #[error("An ingestion run is already in progress")]
    AlreadyRunning,
}
