//! Blob store backend implementations.

pub mod local;
pub mod memory;
pub mod s3;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use object_store::{path::Path as ObjectPath, ObjectStore};

use crate::{BlobError, BlobResult};

/// Map a key to an object_store path verbatim.
///
/// `Path::from` percent-encodes reserved characters such as `#` and `%`, so
/// the stored location would differ from the key a presigned URL writes to.
/// Keys that cannot be stored verbatim (empty, empty segments, a leading or
/// trailing `/`, control characters) are rejected.
pub(crate) fn object_path(key: &str) -> BlobResult<ObjectPath> {
    let invalid = |reason: String| BlobError::InvalidLocation {
        location: key.to_string(),
        reason,
    };
    let path = ObjectPath::parse(key).map_err(|e| invalid(e.to_string()))?;
    if path.as_ref() != key {
        return Err(invalid("key is not a canonical object path".to_string()));
    }
    Ok(path)
}

pub(crate) async fn head_last_modified(
    store: &dyn ObjectStore,
    key: &str,
) -> BlobResult<DateTime<Utc>> {
    let meta = store
        .head(&object_path(key)?)
        .await
        .map_err(|e| BlobError::from_object_store(key, e))?;
    Ok(meta.last_modified)
}

pub(crate) async fn get_body(store: &dyn ObjectStore, key: &str) -> BlobResult<Bytes> {
    let result = store
        .get(&object_path(key)?)
        .await
        .map_err(|e| BlobError::from_object_store(key, e))?;
    result
        .bytes()
        .await
        .map_err(|e| BlobError::from_object_store(key, e))
}
