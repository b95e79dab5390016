// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Image byte storage.
//!
//! Blobs are addressed by `(country, image_id)`. On disk that is
//! `{root}/{country}/images/{image_id}.jpg`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use tokio::fs;

#[derive(Error, Debug)]
pub enum BlobError {
    #[error("Blob I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid blob key component '{0}'")]
    InvalidKey(String),
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, country: &str, image_id: &str, bytes: &[u8]) -> Result<(), BlobError>;

    /// Missing blobs are `Ok(None)`.
    async fn get(&self, country: &str, image_id: &str) -> Result<Option<Vec<u8>>, BlobError>;

    async fn delete(&self, country: &str, image_id: &str) -> Result<(), BlobError>;
}

/// Reject anything that could escape its directory.
fn check_component(part: &str) -> Result<&str, BlobError> {
    let bad = part.is_empty()
        || part == "."
        || part.contains("..")
        || part.contains('/')
        || part.contains('\\')
        || part.contains('\0');
    if bad {
        return Err(BlobError::InvalidKey(part.to_string()));
    }
    Ok(part)
}

/// Filesystem blob store.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dir(&self, country: &str) -> Result<PathBuf, BlobError> {
        Ok(self.root.join(check_component(country)?).join("images"))
    }

    /// Path of one image, validating both components.
    pub fn path(&self, country: &str, image_id: &str) -> Result<PathBuf, BlobError> {
        Ok(self.dir(country)?.join(format!("{}.jpg", check_component(image_id)?)))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, country: &str, image_id: &str, bytes: &[u8]) -> Result<(), BlobError> {
        let path = self.path(country, image_id)?;
        let dir = self.dir(country)?;
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
        }
        fs::write(&path, bytes).await?;
        Ok(())
    }

    async fn get(&self, country: &str, image_id: &str) -> Result<Option<Vec<u8>>, BlobError> {
        let path = self.path(country, image_id)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, country: &str, image_id: &str) -> Result<(), BlobError> {
        let path = self.path(country, image_id)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory blob store for tests.
#[derive(Default)]
pub struct InMemoryBlobStore {
    blobs: DashMap<(String, String), Vec<u8>>,
}

impl InMemoryBlobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, country: &str, image_id: &str, bytes: &[u8]) -> Result<(), BlobError> {
        check_component(country)?;
        check_component(image_id)?;
        self.blobs
            .insert((country.to_string(), image_id.to_string()), bytes.to_vec());
        Ok(())
    }

    async fn get(&self, country: &str, image_id: &str) -> Result<Option<Vec<u8>>, BlobError> {
        Ok(self
            .blobs
            .get(&(country.to_string(), image_id.to_string()))
            .map(|b| b.value().clone()))
    }

    async fn delete(&self, country: &str, image_id: &str) -> Result<(), BlobError> {
        self.blobs.remove(&(country.to_string(), image_id.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fs_put_get_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());

        store.put("Vali", "abc123", b"\xff\xd8jpeg").await.unwrap();

        let expected = dir.path().join("Vali").join("images").join("abc123.jpg");
        assert!(expected.exists());
        assert_eq!(store.get("Vali", "abc123").await.unwrap().unwrap(), b"\xff\xd8jpeg");
    }

    #[tokio::test]
    async fn test_fs_missing_blob_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        assert!(store.get("Vali", "nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fs_delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        store.put("Vali", "x", b"1").await.unwrap();
        store.delete("Vali", "x").await.unwrap();
        store.delete("Vali", "x").await.unwrap();
        assert!(store.get("Vali", "x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        for bad in ["..", "../etc", "a/b", "a\\b", ""] {
            let err = store.put(bad, "x", b"1").await.unwrap_err();
            assert!(matches!(err, BlobError::InvalidKey(_)), "accepted {:?}", bad);
        }
        assert!(matches!(
            store.put("Vali", "../x", b"1").await.unwrap_err(),
            BlobError::InvalidKey(_)
        ));
    }

    #[tokio::test]
    async fn test_country_names_with_spaces_ok() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        store.put("United Kingdom", "id1", b"img").await.unwrap();
        assert!(store.get("United Kingdom", "id1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemoryBlobStore::new();
        store.put("Vali", "a", b"bytes").await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("Vali", "a").await.unwrap().unwrap(), b"bytes");
        store.delete("Vali", "a").await.unwrap();
        assert!(store.is_empty());
    }
}
