// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Country and image records.
//!
//! [`CountryRecord`] is the unit that flows through ingestion, the store and
//! the cache. Its `population_density` is always derived from its own
//! population and area; every constructor recomputes it.
//!
//! # Example
//!
//! ```
//! use country_service::CountryRecord;
//!
//! let vali = CountryRecord::new("Vali", "Europe", 1_000_000, 50_000.0).unwrap();
//! assert_eq!(vali.population_density, 20.0);
//!
//! // Zero area is an upstream defect, never infinity
//! assert!(CountryRecord::new("Void", "Nowhere", 10, 0.0).is_err());
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DataError;

/// A country as stored and served.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryRecord {
    /// Common name, the record identity
    pub name: String,
    pub region: String,
    pub population: u64,
    /// Square kilometres, always > 0
    pub area: f64,
    /// population / area as of the last write
    pub population_density: f64,
}

impl CountryRecord {
    pub fn new(
        name: impl Into<String>,
        region: impl Into<String>,
        population: u64,
        area: f64,
    ) -> Result<Self, DataError> {
        let name = name.into();
        let population_density = density(&name, population, area)?;
        Ok(Self {
            name,
            region: region.into(),
            population,
            area,
            population_density,
        })
    }

    /// Exact comparison on the fields that drive change detection.
    #[must_use]
    pub fn same_measurements(&self, population: u64, area: f64) -> bool {
        self.population == population && self.area == area
    }
}

fn density(name: &str, population: u64, area: f64) -> Result<f64, DataError> {
    if !area.is_finite() || area <= 0.0 {
        return Err(DataError::NonPositiveArea { name: name.to_string(), area });
    }
    Ok(population as f64 / area)
}

/// Upstream country shape (restcountries.com v3.1). Extra fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCountry {
    pub name: RawName,
    pub region: String,
    pub population: u64,
    pub area: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawName {
    pub common: String,
}

impl RawCountry {
    /// Parse one upstream record. `index` is its position in the batch.
    pub fn from_value(index: usize, value: &Value) -> Result<Self, DataError> {
        Self::deserialize(value).map_err(|e| DataError::Malformed {
            index,
            reason: e.to_string(),
        })
    }

    pub fn into_record(self) -> Result<CountryRecord, DataError> {
        CountryRecord::new(self.name.common, self.region, self.population, self.area)
    }
}

/// Image metadata as persisted in the store.
///
/// The bytes live in the blob store under `(country_name, image_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub image_id: String,
    pub country_name: String,
    pub title: String,
    pub description: String,
}

/// An image as served to clients, bytes base64-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageEntry {
    pub image_id: String,
    pub title: String,
    pub description: String,
    pub file: String,
}

impl ImageEntry {
    #[must_use]
    pub fn from_parts(meta: &ImageRecord, bytes: &[u8]) -> Self {
        use base64::Engine;
        Self {
            image_id: meta.image_id.clone(),
            title: meta.title.clone(),
            description: meta.description.clone(),
            file: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }

    /// Decode the base64 payload back to raw bytes.
    pub fn decode_file(&self) -> Result<Vec<u8>, base64::DecodeError> {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.decode(&self.file)
    }
}

/// Fresh opaque image id: 16 random bytes as 32 hex chars.
#[must_use]
pub fn new_image_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
