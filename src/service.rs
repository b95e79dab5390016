// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Read path and image upload.
//!
//! Every read is cache-aside: look up the key, and on a miss load from the
//! store, write the full result back under the same key, and return it.

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::blob::BlobStore;
use crate::cache::{CacheKey, ReadThroughCache};
use crate::error::{ServiceError, ValidationError};
use crate::record::{new_image_id, CountryRecord, ImageEntry, ImageRecord};
use crate::store::{CountryQuery, CountryStore};

/// What an upload does to the cached image list of its country.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageCacheMode {
    /// Append to the cached list, or rebuild it from the store on a miss
    #[default]
    Append,
    /// Leave the cache alone; the list refreshes when its entry expires
    Skip,
}

impl FromStr for ImageCacheMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "append" => Ok(Self::Append),
            "skip" => Ok(Self::Skip),
            other => Err(format!("unknown image cache mode '{}', expected append or skip", other)),
        }
    }
}

/// Country names become blob path components and cache key suffixes.
fn check_country_name(name: &str) -> Result<(), ValidationError> {
    let bad = name.trim().is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name.contains("..")
        || name.chars().any(char::is_control);
    if bad {
        return Err(ValidationError::InvalidCountryName(name.to_string()));
    }
    Ok(())
}

pub struct CountryService {
    store: Arc<dyn CountryStore>,
    cache: Arc<ReadThroughCache>,
    blobs: Arc<dyn BlobStore>,
    image_cache_mode: ImageCacheMode,
}

impl CountryService {
    pub fn new(
        store: Arc<dyn CountryStore>,
        cache: Arc<ReadThroughCache>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            store,
            cache,
            blobs,
            image_cache_mode: ImageCacheMode::default(),
        }
    }

    #[must_use]
    pub fn with_image_cache_mode(mut self, mode: ImageCacheMode) -> Self {
        self.image_cache_mode = mode;
        self
    }

    pub fn store(&self) -> &Arc<dyn CountryStore> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<ReadThroughCache> {
        &self.cache
    }

    pub async fn get_countries(&self, query: &CountryQuery) -> Result<Vec<CountryRecord>, ServiceError> {
        let key = CacheKey::from(query);
        if let Some(countries) = self.cache.get_record::<Vec<CountryRecord>>(&key).await {
            return Ok(countries);
        }

        let countries = self.store.get_countries(query).await?;
        self.cache.set_record(&key, &countries).await;
        Ok(countries)
    }

    pub async fn get_country(&self, name: &str) -> Result<CountryRecord, ServiceError> {
        check_country_name(name)?;
        let key = CacheKey::country(name);
        if let Some(country) = self.cache.get_record::<CountryRecord>(&key).await {
            return Ok(country);
        }

        let country = self
            .store
            .get_country(name)
            .await?
            .ok_or_else(|| ServiceError::country_not_found(name))?;
        self.cache.set_record(&key, &country).await;
        Ok(country)
    }

    /// Store an image for `country` and return its new id.
    pub async fn upload_image(
        &self,
        country: &str,
        bytes: &[u8],
        title: &str,
        description: &str,
    ) -> Result<String, ServiceError> {
        check_country_name(country)?;

        let meta = ImageRecord {
            image_id: new_image_id(),
            country_name: country.to_string(),
            title: title.to_string(),
            description: description.to_string(),
        };
        let image_id = self.store.add_image_metadata(&meta).await?;

        if let Err(e) = self.blobs.put(country, &image_id, bytes).await {
            warn!(country = %country, image_id = %image_id, error = %e, "Blob write failed, removing metadata");
            if let Err(cleanup) = self.store.delete_image_metadata(&image_id).await {
                warn!(image_id = %image_id, error = %cleanup, "Compensating metadata delete failed");
            }
            return Err(e.into());
        }

        match self.image_cache_mode {
            ImageCacheMode::Skip => {}
            ImageCacheMode::Append => self.append_cached_image(&meta, bytes).await,
        }

        info!(country = %country, image_id = %image_id, size = bytes.len(), "Image uploaded");
        Ok(image_id)
    }

    async fn append_cached_image(&self, meta: &ImageRecord, bytes: &[u8]) {
        let key = CacheKey::images(meta.country_name.as_str());
        match self.cache.get_record::<Vec<ImageEntry>>(&key).await {
            Some(mut images) => {
                images.push(ImageEntry::from_parts(meta, bytes));
                self.cache.set_record(&key, &images).await;
            }
            None => {
                // Rebuild from the store so older images stay visible
                match self.load_images(&meta.country_name).await {
                    Ok(images) => {
                        self.cache.set_record(&key, &images).await;
                    }
                    Err(e) => warn!(country = %meta.country_name, error = %e, "Could not rebuild image cache"),
                }
            }
        }
    }

    pub async fn get_images(&self, country: &str) -> Result<Vec<ImageEntry>, ServiceError> {
        check_country_name(country)?;
        let key = CacheKey::images(country);
        if let Some(images) = self.cache.get_record::<Vec<ImageEntry>>(&key).await {
            return Ok(images);
        }

        let images = self.load_images(country).await?;
        self.cache.set_record(&key, &images).await;
        Ok(images)
    }

    /// Metadata from the store joined with bytes from the blob store.
    async fn load_images(&self, country: &str) -> Result<Vec<ImageEntry>, ServiceError> {
        let metas = self.store.get_images_metadata(country).await?;
        let mut images = Vec::with_capacity(metas.len());
        for meta in &metas {
            match self.blobs.get(country, &meta.image_id).await? {
                Some(bytes) => images.push(ImageEntry::from_parts(meta, &bytes)),
                None => warn!(country = %country, image_id = %meta.image_id, "Image blob missing, skipping"),
            }
        }
        debug!(country = %country, count = images.len(), "Loaded images from store");
        Ok(images)
    }

    /// Store and cache reachability.
    pub async fn health(&self) -> (bool, bool) {
        let store_ok = self.store.ping().await.is_ok();
        let cache_ok = self.cache.is_healthy().await;
        (store_ok, cache_ok)
    }
}
