use std::collections::HashMap;

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use blob_store::BlobError;
use data_model::Decision;
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

use crate::{readiness::ResolveError, upload::UploadError};

/// Every failure is answered with 403 and the error text as a JSON string.
#[derive(Debug)]
pub struct ApiError {
    kind: &'static str,
    message: String,
}

impl ApiError {
    pub fn new(kind: &'static str, message: String) -> Self {
        Self { kind, message }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!(kind = self.kind, "API Error: {}", self.message);
        (StatusCode::FORBIDDEN, Json(self.message)).into_response()
    }
}

impl From<ResolveError> for ApiError {
    fn from(e: ResolveError) -> Self {
        Self::new(e.kind(), e.to_string())
    }
}

impl From<BlobError> for ApiError {
    fn from(e: BlobError) -> Self {
        ResolveError::from(e).into()
    }
}

impl From<UploadError> for ApiError {
    fn from(e: UploadError) -> Self {
        match e {
            UploadError::Storage(e) => e.into(),
            e => Self::new("invalid_request", e.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        Self::new("invalid_request", e.body_text())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DownloadUrlRequest {
    pub bucket_name: String,
    /// Key of the uploaded input object.
    #[serde(alias = "object_key")]
    pub file_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DownloadDecision {
    /// 1 success, 0 pending, -1 failed.
    pub status_code: i8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    pub message: String,
}

impl From<Decision> for DownloadDecision {
    fn from(decision: Decision) -> Self {
        Self {
            status_code: decision.status_code.into(),
            download_url: decision.download_url,
            message: decision.message,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UploadUrlRequest {
    pub bucket_name: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_names: Vec<String>,
    /// Signed into S3 uploads as user metadata; the uploader must send the
    /// matching `x-amz-meta-*` headers.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct UploadUrl {
    pub upload_url: String,
    pub object_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct NamedUploadUrl {
    pub file_name: String,
    pub upload_url: String,
    pub object_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(untagged)]
pub enum UploadUrls {
    Single(UploadUrl),
    Batch(Vec<NamedUploadUrl>),
}
