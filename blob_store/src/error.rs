//! Error types for blob store operations.

use thiserror::Error;

/// Result type for blob store operations.
pub type BlobResult<T> = Result<T, BlobError>;

/// Errors that can occur while talking to object storage.
#[derive(Debug, Error)]
pub enum BlobError {
    /// No object at the requested key.
    #[error("object not found: {key}")]
    NotFound { key: String },

    /// Bucket name, local root or object key that cannot be used.
    #[error("invalid storage location '{location}': {reason}")]
    InvalidLocation { location: String, reason: String },

    /// The backend rejected or failed a request.
    #[error("storage request failed for '{key}': {source}")]
    Storage {
        key: String,
        #[source]
        source: object_store::Error,
    },

    /// Presigned URL generation error.
    #[error("presigned URL generation failed for '{key}': {reason}")]
    Presign { key: String, reason: String },

    /// Credentials could not be obtained for the backend.
    #[error("credentials unavailable: {reason}")]
    Credentials { reason: String },

    /// Backend construction failed.
    #[error("blob store error: {source}")]
    Other {
        #[from]
        source: anyhow::Error,
    },
}

impl BlobError {
    /// Map an object_store error for `key`, keeping NotFound distinguishable.
    pub fn from_object_store(key: &str, err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { .. } => BlobError::NotFound {
                key: key.to_string(),
            },
            source => BlobError::Storage {
                key: key.to_string(),
                source,
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BlobError::NotFound { .. })
    }

    /// Stable label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            BlobError::NotFound { .. } => "not_found",
            BlobError::InvalidLocation { .. } => "invalid_location",
            BlobError::Storage { .. } => "storage",
            BlobError::Presign { .. } => "presign",
            BlobError::Credentials { .. } => "credentials",
            BlobError::Other { .. } => "other",
        }
    }
}
