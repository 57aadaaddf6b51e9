//! Blob Storage
//!
//! Path-addressed object storage: a filesystem-backed store for the app and
//! an in-memory one for tests.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use tokio::sync::Mutex;

use super::traits::BlobStore;
use crate::domain::{DomainError, DomainResult};

/// Characters escaped in `file://` URLs
const PATH_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Reject absolute paths, empty segments and `..`
pub fn validate_blob_path(path: &str) -> DomainResult<()> {
    let invalid = path.is_empty()
        || path.starts_with('/')
        || path.contains('\\')
        || path.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if invalid {
        return Err(DomainError::InvalidInput(format!("Invalid blob path: {}", path)));
    }
    Ok(())
}

/// Blobs stored as files under a root directory
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

    fn resolve(&self, path: &str) -> DomainResult<PathBuf> {
        validate_blob_path(path)?;
        Ok(self.root.join(path))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn upload(&self, path: &str, bytes: Vec<u8>) -> DomainResult<()> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;
        log::debug!("Stored blob {}", path);
        Ok(())
    }

    async fn download_url(&self, path: &str) -> DomainResult<String> {
        let target = self.resolve(path)?;
        let absolute = tokio::fs::canonicalize(&target).await?;
        let display = absolute.to_string_lossy().replace('\\', "/");
        let display = if display.starts_with('/') {
            display
        } else {
            format!("/{}", display)
        };
        Ok(format!("file://{}", utf8_percent_encode(&display, PATH_SET)))
    }

    async fn delete(&self, path: &str) -> DomainResult<()> {
        let target = self.resolve(path)?;
        tokio::fs::remove_file(&target).await?;
        log::debug!("Removed blob {}", path);
        Ok(())
    }
}

/// Blobs kept in a map
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, path: &str) -> bool {
        self.objects.lock().await.contains_key(path)
    }

    /// Stored paths, sorted
    pub async fn paths(&self) -> Vec<String> {
        self.objects.lock().await.keys().cloned().collect()
    }

    pub async fn read(&self, path: &str) -> Option<Vec<u8>> {
        self.objects.lock().await.get(path).cloned()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, path: &str, bytes: Vec<u8>) -> DomainResult<()> {
        validate_blob_path(path)?;
        self.objects.lock().await.insert(path.to_string(), bytes);
        Ok(())
    }

    async fn download_url(&self, path: &str) -> DomainResult<String> {
        validate_blob_path(path)?;
        if !self.objects.lock().await.contains_key(path) {
            return Err(DomainError::NotFound(format!("Blob {}", path)));
        }
        Ok(format!("mem://{}", utf8_percent_encode(path, PATH_SET)))
    }

    async fn delete(&self, path: &str) -> DomainResult<()> {
        validate_blob_path(path)?;
        match self.objects.lock().await.remove(path) {
            Some(_) => Ok(()),
            None => Err(DomainError::NotFound(format!("Blob {}", path))),
        }
    }
}
