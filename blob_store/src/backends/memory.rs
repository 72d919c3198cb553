//! In-memory blob store backend.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use object_store::{memory::InMemory, ObjectStore};
use url::Url;

use crate::{backends, presign, BlobError, BlobResult, BlobStore, PresignedUrl};

/// A bucket held in process memory. Clones share the same objects.
#[derive(Clone)]
pub struct MemoryBlobStore {
    store: Arc<InMemory>,
    bucket: String,
}

impl MemoryBlobStore {
    pub fn new(bucket: &str, store: Arc<InMemory>) -> Self {
        Self {
            store,
            bucket: bucket.to_string(),
        }
    }

    /// Write an object. Used to stand in for the workflow engine and
    /// uploaders.
    pub async fn put(&self, key: &str, body: impl Into<Bytes>) -> BlobResult<()> {
        let body: Bytes = body.into();
        self.store
            .put(&backends::object_path(key)?, body.into())
            .await
            .map_err(|e| BlobError::from_object_store(key, e))?;
        Ok(())
    }

    fn memory_url(&self, key: &str, expires_in: Duration) -> BlobResult<String> {
        let presign_error = |reason: String| BlobError::Presign {
            key: key.to_string(),
            reason,
        };
        let mut url = Url::parse(&format!("memory://{}", self.bucket))
            .map_err(|e| presign_error(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| presign_error("bucket is not a valid URL host".to_string()))?
            .extend(key.split('/'));
        url.query_pairs_mut()
            .append_pair("expires_in", &expires_in.as_secs().to_string());
        Ok(url.to_string())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn head_last_modified(&self, key: &str) -> BlobResult<DateTime<Utc>> {
        backends::head_last_modified(self.store.as_ref(), key).await
    }

    async fn get_body(&self, key: &str) -> BlobResult<Bytes> {
        backends::get_body(self.store.as_ref(), key).await
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> BlobResult<PresignedUrl> {
        presign::validate_expiry(key, expires_in)?;
        Ok(PresignedUrl::get(self.memory_url(key, expires_in)?, expires_in))
    }

    async fn presign_put(
        &self,
        key: &str,
        expires_in: Duration,
        _metadata: &HashMap<String, String>,
    ) -> BlobResult<PresignedUrl> {
        presign::validate_expiry(key, expires_in)?;
        Ok(PresignedUrl::put(self.memory_url(key, expires_in)?, expires_in))
    }
}
