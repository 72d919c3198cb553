use std::{collections::HashMap, sync::Arc, time::Duration};

use blob_store::{BlobError, BlobStore};
use data_model::UploadKey;
use thiserror::Error;
use tracing::info;

use crate::{
    http_objects::{NamedUploadUrl, UploadUrl, UploadUrlRequest, UploadUrls},
    readiness::Clock,
};

pub const DEFAULT_UPLOAD_URL_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("invalid file name {0:?}")]
    InvalidFileName(String),

    #[error(transparent)]
    Storage(#[from] BlobError),
}

/// Mints presigned PUT URLs under a fresh, time-stamped prefix per file.
pub struct UploadUrlMinter {
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl UploadUrlMinter {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { ttl, clock }
    }

    /// `file_name` wins over `file_names`; with neither there is nothing to
    /// mint.
    pub async fn mint(
        &self,
        store: &dyn BlobStore,
        request: &UploadUrlRequest,
    ) -> Result<Option<UploadUrls>, UploadError> {
        if let Some(file_name) = &request.file_name {
            let url = self.mint_one(store, file_name, &request.metadata).await?;
            return Ok(Some(UploadUrls::Single(url)));
        }
        if request.file_names.is_empty() {
            return Ok(None);
        }

        let mut urls = Vec::with_capacity(request.file_names.len());
        for file_name in &request.file_names {
            let url = self.mint_one(store, file_name, &request.metadata).await?;
            urls.push(NamedUploadUrl {
                file_name: file_name.clone(),
                upload_url: url.upload_url,
                object_key: url.object_key,
            });
        }
        Ok(Some(UploadUrls::Batch(urls)))
    }

    async fn mint_one(
        &self,
        store: &dyn BlobStore,
        file_name: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<UploadUrl, UploadError> {
        validate_file_name(file_name)?;
        let key = UploadKey::new(file_name, self.clock.now());
        let presigned = store.presign_put(key.get(), self.ttl, metadata).await?;
        info!(object_key = %key, "minted upload url");
        Ok(UploadUrl {
            upload_url: presigned.url,
            object_key: key.to_string(),
        })
    }
}

/// A bare file name: no separators, not empty, not a dot path.
fn validate_file_name(file_name: &str) -> Result<(), UploadError> {
    if file_name.is_empty() || file_name == "." || file_name == ".." || file_name.contains('/') {
        return Err(UploadError::InvalidFileName(file_name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use blob_store::MemoryBlobStoreProvider;
    use data_model::test_objects::tests::{mock_upload_time, TEST_BUCKET};

    use super::*;
    use crate::readiness::FixedClock;

    fn minter() -> UploadUrlMinter {
        UploadUrlMinter::new(
            DEFAULT_UPLOAD_URL_TTL,
            Arc::new(FixedClock::new(mock_upload_time())),
        )
    }

    fn request(file_name: Option<&str>, file_names: &[&str]) -> UploadUrlRequest {
        UploadUrlRequest {
            bucket_name: TEST_BUCKET.to_string(),
            file_name: file_name.map(str::to_string),
            file_names: file_names.iter().map(|s| s.to_string()).collect(),
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_single_file_name() {
        let store = MemoryBlobStoreProvider::new().bucket(TEST_BUCKET).unwrap();
        let urls = minter()
            .mint(&store, &request(Some("sales.xlsx"), &["ignored.xlsx"]))
            .await
            .unwrap();

        match urls {
            Some(UploadUrls::Single(url)) => {
                assert_eq!(url.object_key, "sales_202401011200/sales.xlsx");
                assert_eq!(
                    url.upload_url,
                    "memory://alice-report-service/sales_202401011200/sales.xlsx?expires_in=60"
                );
            }
            other => panic!("expected a single url, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_batch_keeps_request_order() {
        let store = MemoryBlobStoreProvider::new().bucket(TEST_BUCKET).unwrap();
        let urls = minter()
            .mint(&store, &request(None, &["b.csv", "a.xlsx"]))
            .await
            .unwrap();

        match urls {
            Some(UploadUrls::Batch(urls)) => {
                let names: Vec<_> = urls.iter().map(|u| u.file_name.as_str()).collect();
                assert_eq!(names, vec!["b.csv", "a.xlsx"]);
                assert_eq!(urls[1].object_key, "a_202401011200/a.xlsx");
            }
            other => panic!("expected a batch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_nothing_requested() {
        let store = MemoryBlobStoreProvider::new().bucket(TEST_BUCKET).unwrap();
        let urls = minter().mint(&store, &request(None, &[])).await.unwrap();
        assert!(urls.is_none());
        assert_eq!(serde_json::to_string(&urls).unwrap(), "null");
    }

    #[tokio::test]
    async fn test_rejects_path_like_names() {
        let store = MemoryBlobStoreProvider::new().bucket(TEST_BUCKET).unwrap();
        for name in ["", "..", "nested/sales.xlsx"] {
            let err = minter()
                .mint(&store, &request(Some(name), &[]))
                .await
                .unwrap_err();
            assert!(matches!(err, UploadError::InvalidFileName(_)), "{:?}", name);
        }
    }
}
