//! Terminal result of an install or update call.

use std::path::PathBuf;

use serde::Serialize;

use crate::error::{ErrorKind, StepError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Success,
    /// `success` is true but a step before the launcher failed, or the
    /// launcher itself could not be written.
    PartialSuccess,
    Failed,
    AlreadyExists,
}

/// Produced exactly once per orchestration call, after the last step settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    pub success: bool,
    pub status: OperationStatus,
    /// Full transcript, each chunk prefixed with its step tag.
    pub output: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub already_exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
}

impl OperationResult {
    pub fn succeeded(output: String, message: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self {
            success: true,
            status: OperationStatus::Success,
            output,
            message: message.into(),
            path,
            already_exists: false,
            error: None,
        }
    }

    pub fn partial(
        output: String,
        message: impl Into<String>,
        path: Option<PathBuf>,
        cause: &StepError,
    ) -> Self {
        Self {
            success: true,
            status: OperationStatus::PartialSuccess,
            output,
            message: message.into(),
            path,
            already_exists: false,
            error: Some(cause.kind()),
        }
    }

    pub fn failed(output: String, message: impl Into<String>, cause: &StepError) -> Self {
        Self {
            success: false,
            status: OperationStatus::Failed,
            output,
            message: message.into(),
            path: None,
            already_exists: false,
            error: Some(cause.kind()),
        }
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self {
            success: false,
            status: OperationStatus::AlreadyExists,
            output: String::new(),
            message: message.into(),
            path: None,
            already_exists: true,
            error: Some(ErrorKind::AlreadyExists),
        }
    }

    pub fn with_path(mut self, path: PathBuf) -> Self {
        self.path = Some(path);
        self
    }
}
