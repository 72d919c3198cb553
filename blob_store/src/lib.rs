//! Object storage access for the download gate.
//!
//! A [`BlobStore`] is a read-only view of one bucket that can also mint
//! time-limited URLs. [`BlobStoreProvider`] builds one per requested bucket.

mod backends;
mod config;
mod credentials;
mod error;
mod metrics;
mod presign;
mod provider;
mod traits;

pub use aws_credential_types::provider::SharedCredentialsProvider;
pub use backends::{local::LocalBlobStore, memory::MemoryBlobStore, s3::S3BlobStore};
pub use config::{default_local_root, BlobStorageConfig, LocalOptions, S3Options, StorageBackend};
pub use credentials::{build_credentials_provider, CredentialsConfig, SdkCredentialBridge};
pub use error::{BlobError, BlobResult};
pub use metrics::{BlobMetrics, Timer};
pub use presign::{validate_expiry, HttpMethod, PresignedUrl, MAX_PRESIGN_EXPIRY};
pub use provider::{
    provider_from_config,
    validate_bucket_name,
    BlobStoreProvider,
    LocalBlobStoreProvider,
    MemoryBlobStoreProvider,
    S3BlobStoreProvider,
};
pub use traits::BlobStore;
