//! Presigned URL structures for direct client access.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{BlobError, BlobResult};

/// Maximum presigned URL expiry (7 days for S3).
pub const MAX_PRESIGN_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// HTTP method a presigned URL is valid for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Put,
}

/// A presigned URL and the window it was minted for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresignedUrl {
    pub url: String,
    pub expires_in: Duration,
    pub method: HttpMethod,
}

impl PresignedUrl {
    pub fn get(url: String, expires_in: Duration) -> Self {
        Self {
            url,
            expires_in,
            method: HttpMethod::Get,
        }
    }

    pub fn put(url: String, expires_in: Duration) -> Self {
        Self {
            url,
            expires_in,
            method: HttpMethod::Put,
        }
    }
}

/// Reject expiries S3 would refuse: zero, or longer than seven days.
pub fn validate_expiry(key: &str, expires_in: Duration) -> BlobResult<()> {
    if expires_in.is_zero() {
        return Err(BlobError::Presign {
            key: key.to_string(),
            reason: "expiry must be greater than zero".to_string(),
        });
    }
    if expires_in > MAX_PRESIGN_EXPIRY {
        return Err(BlobError::Presign {
            key: key.to_string(),
            reason: format!(
                "expiry {:?} exceeds maximum allowed {:?}",
                expires_in, MAX_PRESIGN_EXPIRY
            ),
        });
    }
    Ok(())
}
