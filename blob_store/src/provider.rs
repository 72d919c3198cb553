//! Per-bucket store construction.
//!
//! Requests name their bucket, so stores are built on demand. Nothing about
//! the objects themselves is cached here.

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_sdk_s3::error::DisplayErrorContext;
use object_store::memory::InMemory;
use tracing::debug;

use crate::{
    BlobError,
    BlobResult,
    BlobStorageConfig,
    BlobStore,
    LocalBlobStore,
    MemoryBlobStore,
    S3BlobStore,
    S3Options,
    StorageBackend,
};

/// Hands out a [`BlobStore`] for a bucket.
#[async_trait]
pub trait BlobStoreProvider: Send + Sync {
    async fn store_for(&self, bucket: &str) -> BlobResult<Arc<dyn BlobStore>>;
}

/// S3 bucket naming rules, minus the reserved prefixes.
pub fn validate_bucket_name(bucket: &str) -> BlobResult<()> {
    let invalid = |reason: &str| BlobError::InvalidLocation {
        location: bucket.to_string(),
        reason: reason.to_string(),
    };
    if !(3..=63).contains(&bucket.len()) {
        return Err(invalid("bucket name must be between 3 and 63 characters"));
    }
    if !bucket
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        return Err(invalid(
            "bucket name may only contain lowercase letters, digits, '-' and '.'",
        ));
    }
    let starts_and_ends_alphanumeric = |c: Option<char>| {
        c.map(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
            .unwrap_or(false)
    };
    if !starts_and_ends_alphanumeric(bucket.chars().next())
        || !starts_and_ends_alphanumeric(bucket.chars().last())
    {
        return Err(invalid("bucket name must start and end with a letter or digit"));
    }
    if bucket.contains("..") {
        return Err(invalid("bucket name must not contain '..'"));
    }
    Ok(())
}

pub struct S3BlobStoreProvider {
    options: S3Options,
    credentials: SharedCredentialsProvider,
}

impl S3BlobStoreProvider {
    pub fn new(options: S3Options, credentials: SharedCredentialsProvider) -> Self {
        Self {
            options,
            credentials,
        }
    }
}

#[async_trait]
impl BlobStoreProvider for S3BlobStoreProvider {
    async fn store_for(&self, bucket: &str) -> BlobResult<Arc<dyn BlobStore>> {
        validate_bucket_name(bucket)?;
        // Fail before touching the bucket when no identity is available.
        self.credentials
            .provide_credentials()
            .await
            .map_err(|e| BlobError::Credentials {
                reason: DisplayErrorContext(&e).to_string(),
            })?;
        let store = S3BlobStore::new(bucket, &self.options, self.credentials.clone())?;
        Ok(Arc::new(store))
    }
}

pub struct LocalBlobStoreProvider {
    root: PathBuf,
}

impl LocalBlobStoreProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl BlobStoreProvider for LocalBlobStoreProvider {
    async fn store_for(&self, bucket: &str) -> BlobResult<Arc<dyn BlobStore>> {
        validate_bucket_name(bucket)?;
        Ok(Arc::new(LocalBlobStore::new(&self.root, bucket)?))
    }
}

/// Buckets spring into existence on first use and live as long as the
/// provider.
#[derive(Default)]
pub struct MemoryBlobStoreProvider {
    buckets: Mutex<HashMap<String, Arc<InMemory>>>,
}

impl MemoryBlobStoreProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bucket(&self, bucket: &str) -> BlobResult<MemoryBlobStore> {
        validate_bucket_name(bucket)?;
        let mut buckets = self
            .buckets
            .lock()
            .map_err(|_| anyhow::anyhow!("memory bucket map poisoned"))?;
        let store = buckets
            .entry(bucket.to_string())
            .or_insert_with(|| Arc::new(InMemory::new()))
            .clone();
        Ok(MemoryBlobStore::new(bucket, store))
    }
}

#[async_trait]
impl BlobStoreProvider for MemoryBlobStoreProvider {
    async fn store_for(&self, bucket: &str) -> BlobResult<Arc<dyn BlobStore>> {
        Ok(Arc::new(self.bucket(bucket)?))
    }
}

/// Build the provider selected by `config`. `credentials` is only consulted
/// for S3.
pub fn provider_from_config(
    config: &BlobStorageConfig,
    credentials: Option<SharedCredentialsProvider>,
) -> BlobResult<Arc<dyn BlobStoreProvider>> {
    match &config.backend {
        StorageBackend::S3(options) => {
            let credentials = credentials.ok_or_else(|| BlobError::Credentials {
                reason: "no credentials provider configured for S3".to_string(),
            })?;
            debug!(region = %options.region, "using S3 blob store provider");
            Ok(Arc::new(S3BlobStoreProvider::new(
                options.clone(),
                credentials,
            )))
        }
        StorageBackend::Local(options) => {
            debug!(root = %options.root, "using local blob store provider");
            Ok(Arc::new(LocalBlobStoreProvider::new(&options.root)))
        }
        StorageBackend::Memory => {
            debug!("using in-memory blob store provider");
            Ok(Arc::new(MemoryBlobStoreProvider::new()))
        }
    }
}
