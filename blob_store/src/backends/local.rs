//! Local filesystem blob store backend.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use object_store::local::LocalFileSystem;
use url::Url;

use crate::{backends, presign, BlobError, BlobResult, BlobStore, PresignedUrl};

/// A bucket mapped to the directory `<root>/<bucket>`.
pub struct LocalBlobStore {
    store: LocalFileSystem,
    dir: PathBuf,
}

impl LocalBlobStore {
    /// The bucket directory must already exist.
    pub fn new(root: &Path, bucket: &str) -> BlobResult<Self> {
        let dir = root.join(bucket);
        let dir = std::fs::canonicalize(&dir).map_err(|e| BlobError::InvalidLocation {
            location: dir.display().to_string(),
            reason: e.to_string(),
        })?;
        let store =
            LocalFileSystem::new_with_prefix(&dir).map_err(|e| BlobError::InvalidLocation {
                location: dir.display().to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { store, dir })
    }

    /// Shared-filesystem assumption: the file URL is the download link.
    fn file_url(&self, key: &str) -> BlobResult<String> {
        let url = Url::from_file_path(self.dir.join(key)).map_err(|_| BlobError::Presign {
            key: key.to_string(),
            reason: "path cannot be expressed as a file URL".to_string(),
        })?;
        Ok(url.to_string())
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn head_last_modified(&self, key: &str) -> BlobResult<DateTime<Utc>> {
        backends::head_last_modified(&self.store, key).await
    }

    async fn get_body(&self, key: &str) -> BlobResult<Bytes> {
        backends::get_body(&self.store, key).await
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> BlobResult<PresignedUrl> {
        presign::validate_expiry(key, expires_in)?;
        Ok(PresignedUrl::get(self.file_url(key)?, expires_in))
    }

    async fn presign_put(
        &self,
        key: &str,
        expires_in: Duration,
        _metadata: &HashMap<String, String>,
    ) -> BlobResult<PresignedUrl> {
        presign::validate_expiry(key, expires_in)?;
        Ok(PresignedUrl::put(self.file_url(key)?, expires_in))
    }
}
