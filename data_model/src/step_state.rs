use serde::{Deserialize, Serialize};

const FAIL_STATUS: &str = "fail";

/// Marker document the workflow engine writes next to an input object.
///
/// Only `status` is read; any other fields the engine adds are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepState {
    pub status: String,
}

impl StepState {
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    pub fn step_status(&self) -> StepStatus {
        StepStatus::from(self.status.as_str())
    }
}

/// Only `"fail"` is terminal. Every other value, including ones the engine
/// may add later, means the execution is still going.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Fail,
    InProgress(String),
}

impl StepStatus {
    pub fn raw(&self) -> &str {
        match self {
            StepStatus::Fail => FAIL_STATUS,
            StepStatus::InProgress(raw) => raw,
        }
    }
}

impl From<&str> for StepStatus {
    fn from(value: &str) -> Self {
        if value == FAIL_STATUS {
            StepStatus::Fail
        } else {
            StepStatus::InProgress(value.to_string())
        }
    }
}
