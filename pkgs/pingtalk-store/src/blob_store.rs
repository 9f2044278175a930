//! Blob store seam: binary uploads that resolve to a durable fetch URL

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::fs;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Result, StoreError};
use crate::paths::is_valid_segment;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` under `key`, replacing any previous blob.
    async fn upload(&self, key: &str, data: Bytes, content_type: &str) -> Result<()>;

    /// Resolve a durable URL for a previously uploaded blob.
    async fn download_url(&self, key: &str) -> Result<Url>;
}

/// Keys are `/`-separated relative paths without empty or dot segments.
pub fn validate_key(key: &str) -> Result<()> {
    let ok = key
        .split('/')
        .all(|segment| is_valid_segment(segment) && segment != "." && segment != "..");
    if !ok {
        return Err(StoreError::InvalidPath(key.to_string()));
    }
    Ok(())
}

/// A blob held by [`MemoryBlobStore`]
#[derive(Debug, Clone, PartialEq)]
pub struct StoredBlob {
    pub data: Bytes,
    pub content_type: String,
}

/// In-memory blob store with per-stage failure injection
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<Mutex<HashMap<String, StoredBlob>>>,
    failing_uploads: Arc<AtomicUsize>,
    failing_url_lookups: Arc<AtomicUsize>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_uploads(&self, count: usize) {
        self.failing_uploads.store(count, Ordering::SeqCst);
    }

    pub fn fail_next_url_lookups(&self, count: usize) {
        self.failing_url_lookups.store(count, Ordering::SeqCst);
    }

    pub fn get(&self, key: &str) -> Option<StoredBlob> {
        self.blobs.lock().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.blobs.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.lock().is_empty()
    }
}

fn take_failure(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, key: &str, data: Bytes, content_type: &str) -> Result<()> {
        validate_key(key)?;
        if take_failure(&self.failing_uploads) {
            warn!("Injected upload failure for {}", key);
            return Err(StoreError::UploadFailed(key.to_string()));
        }
        debug!("Stored blob {} ({} bytes)", key, data.len());
        self.blobs.lock().insert(
            key.to_string(),
            StoredBlob {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn download_url(&self, key: &str) -> Result<Url> {
        validate_key(key)?;
        if take_failure(&self.failing_url_lookups) {
            warn!("Injected URL lookup failure for {}", key);
            return Err(StoreError::UrlUnavailable(key.to_string()));
        }
        if !self.blobs.lock().contains_key(key) {
            return Err(StoreError::UrlUnavailable(key.to_string()));
        }
        Url::parse(&format!("memory://blobs/{}", key))
            .map_err(|e| StoreError::UrlUnavailable(format!("{}: {}", key, e)))
    }
}

/// Blob store backed by a directory; URLs are `file://` URLs.
///
/// Each blob is stored as a single flat file at `{root}/{key}`.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub async fn new(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root).await?;
        let root = fs::canonicalize(&root)
            .await
            .map_err(|_| StoreError::BlobRoot(root.clone()))?;
        info!("Blob storage directory: {}", root.display());
        Ok(Self { root })
    }

    pub fn blob_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn upload(&self, key: &str, data: Bytes, _content_type: &str) -> Result<()> {
        validate_key(key)?;
        let path = self.blob_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, &data)
            .await
            .map_err(|e| StoreError::UploadFailed(format!("{}: {}", key, e)))?;
        debug!("Wrote blob {} ({} bytes)", path.display(), data.len());
        Ok(())
    }

    async fn download_url(&self, key: &str) -> Result<Url> {
        validate_key(key)?;
        let path = self.blob_path(key);
        if !fs::try_exists(&path).await? {
            return Err(StoreError::UrlUnavailable(key.to_string()));
        }
        Url::from_file_path(&path).map_err(|_| StoreError::UrlUnavailable(key.to_string()))
    }
}
