use blob_store::BlobError;
use thiserror::Error;

pub type ResolveResult<T> = Result<T, ResolveError>;

/// Infrastructure failures while resolving readiness. A FAIL decision is not
/// one of these.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("storage error: {0}")]
    Storage(#[source] BlobError),

    #[error("malformed step state at {key}: {source}")]
    MalformedStepState {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("precondition missing: {0}")]
    PreconditionMissing(String),
}

impl From<BlobError> for ResolveError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::Credentials { reason } => ResolveError::PreconditionMissing(reason),
            err => ResolveError::Storage(err),
        }
    }
}

impl ResolveError {
    pub fn kind(&self) -> &'static str {
        match self {
            ResolveError::Storage(_) => "storage",
            ResolveError::MalformedStepState { .. } => "malformed_step_state",
            ResolveError::PreconditionMissing(_) => "precondition_missing",
        }
    }
}
