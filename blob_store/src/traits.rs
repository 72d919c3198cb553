//! Core blob store trait.

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::{BlobError, BlobResult, PresignedUrl};

/// Read-side view of one bucket, plus presigning.
///
/// Keys are bucket-relative. Implementations never retry; a failed call is
/// returned to the caller as is.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Whether an object exists at `key`.
    ///
    /// Only a NotFound answer maps to `false`; any other failure is an error.
    async fn exists(&self, key: &str) -> BlobResult<bool> {
        match self.head_last_modified(key).await {
            Ok(_) => Ok(true),
            Err(BlobError::NotFound { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Last-modified timestamp of the object at `key`.
    ///
    /// Returns `BlobError::NotFound` if the object doesn't exist.
    async fn head_last_modified(&self, key: &str) -> BlobResult<DateTime<Utc>>;

    /// Entire object body.
    ///
    /// Returns `BlobError::NotFound` if the object doesn't exist.
    async fn get_body(&self, key: &str) -> BlobResult<Bytes>;

    /// Generate a presigned GET URL valid for `expires_in`.
    async fn presign_get(&self, key: &str, expires_in: Duration) -> BlobResult<PresignedUrl>;

    /// Generate a presigned PUT URL valid for `expires_in`.
    ///
    /// `metadata` is signed into the request as user metadata when the
    /// backend supports it, so the uploader must send the same headers.
    async fn presign_put(
        &self,
        key: &str,
        expires_in: Duration,
        metadata: &HashMap<String, String>,
    ) -> BlobResult<PresignedUrl>;
}
