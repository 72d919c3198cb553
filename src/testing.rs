use std::sync::Arc;

use anyhow::Result;
use blob_store::{BlobStorageConfig, MemoryBlobStore, MemoryBlobStoreProvider, StorageBackend};
use data_model::test_objects::tests::mock_upload_time;
use tracing::subscriber;
use tracing_subscriber::{layer::SubscriberExt, Layer};

use crate::{
    config::ServerConfig,
    metrics::api_io_stats,
    readiness::{DownloadReadinessResolver, FixedClock, ReadinessConfig},
    routes::RouteState,
    service::Service,
    upload::{UploadUrlMinter, DEFAULT_UPLOAD_URL_TTL},
};

fn init_test_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug"));
    let _ = subscriber::set_global_default(
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_filter(env_filter)),
    );
}

/// Route state over in-memory buckets with the clock pinned to
/// `mock_upload_time`.
pub struct TestRouteState {
    blob_stores: Arc<MemoryBlobStoreProvider>,
    clock: Arc<FixedClock>,
    metrics: Arc<api_io_stats::Metrics>,
}

impl TestRouteState {
    pub fn new() -> Self {
        init_test_tracing();
        Self {
            blob_stores: Arc::new(MemoryBlobStoreProvider::new()),
            clock: Arc::new(FixedClock::new(mock_upload_time())),
            metrics: Arc::new(api_io_stats::Metrics::new()),
        }
    }

    pub fn bucket(&self, bucket: &str) -> MemoryBlobStore {
        self.blob_stores.bucket(bucket).unwrap()
    }

    pub fn route_state(&self) -> RouteState {
        RouteState {
            blob_stores: self.blob_stores.clone(),
            resolver: Arc::new(DownloadReadinessResolver::new(
                ReadinessConfig::default(),
                self.clock.clone(),
            )),
            upload_urls: Arc::new(UploadUrlMinter::new(
                DEFAULT_UPLOAD_URL_TTL,
                self.clock.clone(),
            )),
            metrics: self.metrics.clone(),
        }
    }
}

pub struct TestService {
    pub service: Service,
}

impl TestService {
    pub async fn new() -> Result<Self> {
        init_test_tracing();
        let cfg = ServerConfig {
            listen_addr: "127.0.0.1:0".to_string(),
            blob_storage: BlobStorageConfig {
                backend: StorageBackend::Memory,
                ..Default::default()
            },
            ..Default::default()
        };
        let service = Service::new(cfg).await?;
        Ok(Self { service })
    }
}
