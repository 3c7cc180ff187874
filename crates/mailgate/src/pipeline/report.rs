use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A structured failure entry in a [`RunReport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureNotice {
    pub timestamp: DateTime<Utc>,
    /// Where the failure was caught.
    pub code: String,
    pub message: String,
    pub detail: String,
}

impl FailureNotice {
    pub fn new(code: impl Into<String>, message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            code: code.into(),
            message: message.into(),
            detail: detail.into(),
        }
    }
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub success: bool,
    /// Messages handed to the handler. Zero when the run failed.
    pub processed: usize,
    /// The run was stopped by its cancellation signal.
    pub cancelled: bool,
    #[serde(default)]
    pub notices: Vec<FailureNotice>,
}

impl RunReport {
    pub fn succeeded(processed: usize) -> Self {
        Self {
            success: true,
            processed,
            cancelled: false,
            notices: Vec::new(),
        }
    }

    pub fn failed(notice: FailureNotice) -> Self {
        Self {
            success: false,
            processed: 0,
            cancelled: false,
            notices: vec![notice],
        }
    }

    pub fn cancelled(notice: FailureNotice) -> Self {
        Self {
            cancelled: true,
            ..Self::failed(notice)
        }
    }
}
