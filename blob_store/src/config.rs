//! Blob storage configuration.

use std::env;

use serde::{Deserialize, Serialize};

use crate::CredentialsConfig;

/// Which object storage serves the buckets named in requests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageBackend {
    S3(S3Options),
    /// One directory per bucket under `root`.
    Local(LocalOptions),
    /// Process-local buckets, for development.
    Memory,
}

impl Default for StorageBackend {
    fn default() -> Self {
        StorageBackend::Local(LocalOptions {
            root: default_local_root(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct S3Options {
    pub region: String,
    /// Custom endpoint, e.g. MinIO or localstack.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub force_path_style: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocalOptions {
    #[serde(default = "default_local_root")]
    pub root: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlobStorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Only used by the S3 backend.
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

pub fn default_local_root() -> String {
    env::current_dir()
        .unwrap_or_else(|_| std::path::PathBuf::from("."))
        .join("download_gate_storage")
        .to_str()
        .unwrap_or("./download_gate_storage")
        .to_string()
}
