//! S3 blob store backend using object_store for reads and aws-sdk-s3 for
//! presigning.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    error::DisplayErrorContext,
    presigning::PresigningConfig,
    Client as S3Client,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use object_store::aws::{AmazonS3, AmazonS3Builder};
use tracing::debug;
use url::Url;

use crate::{
    backends,
    credentials::SdkCredentialBridge,
    presign,
    BlobError,
    BlobMetrics,
    BlobResult,
    BlobStore,
    PresignedUrl,
    S3Options,
};

const BACKEND: &str = "s3";

/// One S3 bucket.
pub struct S3BlobStore {
    /// object_store client for data I/O.
    object_store: Arc<AmazonS3>,

    /// AWS SDK S3 client for presigning.
    s3_client: S3Client,

    bucket: String,
    metrics: BlobMetrics,
}

impl S3BlobStore {
    pub fn new(
        bucket: &str,
        options: &S3Options,
        credentials: SharedCredentialsProvider,
    ) -> BlobResult<Self> {
        let object_store = Self::object_store_builder(bucket, options, credentials.clone())?
            .build()
            .map_err(|e| BlobError::InvalidLocation {
                location: format!("s3://{}", bucket),
                reason: e.to_string(),
            })?;

        let mut config = S3ConfigBuilder::new()
            .region(Region::new(options.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(options.force_path_style);
        if let Some(endpoint) = &options.endpoint {
            config = config.endpoint_url(endpoint);
        }
        let s3_client = S3Client::from_conf(config.build());

        debug!(bucket = %bucket, region = %options.region, "created S3 blob store");

        Ok(Self {
            object_store: Arc::new(object_store),
            s3_client,
            bucket: bucket.to_string(),
            metrics: BlobMetrics::new(),
        })
    }

    /// Reads use the same addressing style as the presigner.
    fn object_store_builder(
        bucket: &str,
        options: &S3Options,
        credentials: SharedCredentialsProvider,
    ) -> BlobResult<AmazonS3Builder> {
        let virtual_hosted = !options.force_path_style;
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(bucket)
            .with_region(&options.region)
            .with_virtual_hosted_style_request(virtual_hosted)
            .with_credentials(Arc::new(SdkCredentialBridge::new(credentials)));
        if let Some(endpoint) = &options.endpoint {
            let endpoint = if virtual_hosted {
                virtual_hosted_endpoint(endpoint, bucket)?
            } else {
                endpoint.clone()
            };
            builder = builder
                .with_allow_http(endpoint.starts_with("http://"))
                .with_endpoint(endpoint);
        }
        Ok(builder)
    }

    fn presigning_config(key: &str, expires_in: Duration) -> BlobResult<PresigningConfig> {
        presign::validate_expiry(key, expires_in)?;
        PresigningConfig::expires_in(expires_in).map_err(|e| BlobError::Presign {
            key: key.to_string(),
            reason: format!("failed to create presigning config: {}", e),
        })
    }
}

/// object_store takes a virtual-hosted endpoint with the bucket already in
/// the host name.
fn virtual_hosted_endpoint(endpoint: &str, bucket: &str) -> BlobResult<String> {
    let invalid = |reason: String| BlobError::InvalidLocation {
        location: endpoint.to_string(),
        reason,
    };
    let mut url = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
    let host = url
        .host_str()
        .ok_or_else(|| invalid("endpoint has no host".to_string()))?
        .to_string();
    url.set_host(Some(&format!("{}.{}", bucket, host)))
        .map_err(|e| invalid(e.to_string()))?;
    Ok(url.as_str().trim_end_matches('/').to_string())
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn head_last_modified(&self, key: &str) -> BlobResult<DateTime<Utc>> {
        let _timer = self.metrics.timer(BACKEND, "head");
        backends::head_last_modified(self.object_store.as_ref(), key)
            .await
            .inspect_err(|e| self.metrics.record_error(BACKEND, "head", e))
    }

    async fn get_body(&self, key: &str) -> BlobResult<Bytes> {
        let _timer = self.metrics.timer(BACKEND, "get");
        backends::get_body(self.object_store.as_ref(), key)
            .await
            .inspect_err(|e| self.metrics.record_error(BACKEND, "get", e))
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> BlobResult<PresignedUrl> {
        let _timer = self.metrics.timer(BACKEND, "presign_get");
        let presigning_config = Self::presigning_config(key, expires_in)?;

        let presigned = self
            .s3_client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning_config)
            .await
            .map_err(|e| BlobError::Presign {
                key: key.to_string(),
                reason: DisplayErrorContext(&e).to_string(),
            })
            .inspect_err(|e| self.metrics.record_error(BACKEND, "presign_get", e))?;

        Ok(PresignedUrl::get(presigned.uri().to_string(), expires_in))
    }

    async fn presign_put(
        &self,
        key: &str,
        expires_in: Duration,
        metadata: &HashMap<String, String>,
    ) -> BlobResult<PresignedUrl> {
        let _timer = self.metrics.timer(BACKEND, "presign_put");
        let presigning_config = Self::presigning_config(key, expires_in)?;

        let metadata = (!metadata.is_empty()).then(|| metadata.clone());
        let presigned = self
            .s3_client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .set_metadata(metadata)
            .presigned(presigning_config)
            .await
            .map_err(|e| BlobError::Presign {
                key: key.to_string(),
                reason: DisplayErrorContext(&e).to_string(),
            })
            .inspect_err(|e| self.metrics.record_error(BACKEND, "presign_put", e))?;

        Ok(PresignedUrl::put(presigned.uri().to_string(), expires_in))
    }
}
