pub mod step_state;
pub mod test_objects;

use std::{
    fmt::{self, Display},
    time::Duration,
};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display as StrumDisplay};
use thiserror::Error;

pub use step_state::{StepState, StepStatus};

pub const SUCCESS_MESSAGE: &str = "Success";
pub const STEP_FAILED_MESSAGE: &str = "Step Function Execution Fail";
pub const STEP_STATUS_MESSAGE_PREFIX: &str = "Step Function Status => ";
pub const AWAITING_TRIGGER_MESSAGE: &str = "Wait Step Function Execute";
pub const RETRY_MESSAGE: &str = "Please retry fail";

const OUTPUT_KEY_PREFIX: &str = "output_";
const OUTPUT_KEY_SUFFIX: &str = ".csv";
const STEP_STATE_KEY_PREFIX: &str = "step-state-";

/// Returns the last path segment of `key` with its final extension removed.
///
/// A leading dot is part of the name, not an extension, so `.env` stays
/// `.env`. Trailing slashes are ignored.
pub fn basename_without_extension(key: &str) -> &str {
    let trimmed = key.trim_end_matches('/');
    let base = trimmed.rsplit('/').next().unwrap_or(trimmed);
    match base.rfind('.') {
        Some(idx) if idx > 0 => &base[..idx],
        _ => base,
    }
}

/// Key of the object a client originally uploaded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectKey(String);

impl ObjectKey {
    pub fn new(key: String) -> Self {
        Self(key)
    }

    pub fn get(&self) -> &str {
        &self.0
    }

    pub fn output_key(&self) -> OutputKey {
        OutputKey(format!(
            "{}{}{}",
            OUTPUT_KEY_PREFIX,
            basename_without_extension(&self.0),
            OUTPUT_KEY_SUFFIX
        ))
    }

    pub fn step_state_key(&self) -> StepStateKey {
        StepStateKey(format!("{}{}", STEP_STATE_KEY_PREFIX, self.0))
    }
}

impl Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ObjectKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ObjectKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Key of the artifact the transformation pipeline writes when it is done.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OutputKey(String);

impl OutputKey {
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl Display for OutputKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key of the marker object the workflow engine keeps its status in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StepStateKey(String);

impl StepStateKey {
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl Display for StepStateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Destination of a presigned upload: `<stem>_<YYYYmmddHHMM>/<file_name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UploadKey(String);

impl UploadKey {
    pub fn new(file_name: &str, at: DateTime<Utc>) -> Self {
        Self(format!(
            "{}_{}/{}",
            basename_without_extension(file_name),
            at.format("%Y%m%d%H%M"),
            file_name
        ))
    }

    pub fn get(&self) -> &str {
        &self.0
    }
}

impl Display for UploadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a storage head tells us about the original object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub last_modified: DateTime<Utc>,
}

impl ObjectMetadata {
    pub fn new(last_modified: DateTime<Utc>) -> Self {
        Self { last_modified }
    }

    /// True while `now` is at or before `last_modified + window`.
    pub fn within_window(&self, now: DateTime<Utc>, window: Duration) -> bool {
        let window = TimeDelta::from_std(window).unwrap_or(TimeDelta::MAX);
        match self.last_modified.checked_add_signed(window) {
            Some(deadline) => now <= deadline,
            None => true,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid status code: {0}")]
pub struct InvalidStatusCode(pub i8);

/// Status of a [`Decision`], sent to clients as `0`, `1` or `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Pending,
    Success,
    Fail,
}

impl From<StatusCode> for i8 {
    fn from(value: StatusCode) -> Self {
        match value {
            StatusCode::Pending => 0,
            StatusCode::Success => 1,
            StatusCode::Fail => -1,
        }
    }
}

impl TryFrom<i8> for StatusCode {
    type Error = InvalidStatusCode;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(StatusCode::Pending),
            1 => Ok(StatusCode::Success),
            -1 => Ok(StatusCode::Fail),
            other => Err(InvalidStatusCode(other)),
        }
    }
}

impl Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StatusCode::Pending => "pending",
            StatusCode::Success => "success",
            StatusCode::Fail => "fail",
        };
        write!(f, "{}", label)
    }
}

/// How far the external pipeline has progressed for one object, inferred
/// from storage on every call.
///
/// `TriggerWindow` and `Running` are transient and meant to be polled again.
/// `Done` and `Failed` are terminal for the call that produced them.
/// Every call starts over from `NoSignal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, StrumDisplay, AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ReadinessState {
    #[default]
    NoSignal,
    TriggerWindow,
    Running,
    Failed,
    Done,
}

impl ReadinessState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReadinessState::Done | ReadinessState::Failed)
    }
}

/// The answer rendered for a download request. The HTTP layer owns its wire
/// format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub status_code: StatusCode,
    pub download_url: Option<String>,
    pub message: String,
    pub state: ReadinessState,
}

impl Decision {
    pub fn ready(download_url: String) -> Self {
        Self {
            status_code: StatusCode::Success,
            download_url: Some(download_url),
            message: SUCCESS_MESSAGE.to_string(),
            state: ReadinessState::Done,
        }
    }

    pub fn step_failed() -> Self {
        Self {
            status_code: StatusCode::Fail,
            download_url: None,
            message: STEP_FAILED_MESSAGE.to_string(),
            state: ReadinessState::Failed,
        }
    }

    pub fn step_running(raw_status: &str) -> Self {
        Self {
            status_code: StatusCode::Pending,
            download_url: None,
            message: format!("{}{}", STEP_STATUS_MESSAGE_PREFIX, raw_status),
            state: ReadinessState::Running,
        }
    }

    pub fn awaiting_trigger() -> Self {
        Self {
            status_code: StatusCode::Pending,
            download_url: None,
            message: AWAITING_TRIGGER_MESSAGE.to_string(),
            state: ReadinessState::TriggerWindow,
        }
    }

    /// Default fallback: nothing recorded any progress in time.
    pub fn retry() -> Self {
        Self {
            status_code: StatusCode::Fail,
            download_url: None,
            message: RETRY_MESSAGE.to_string(),
            state: ReadinessState::Failed,
        }
    }
}
