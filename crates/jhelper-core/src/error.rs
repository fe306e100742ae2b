//! Failure taxonomy for pipeline steps and orchestration guards.

use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Coarse failure class carried on an [`OperationResult`](crate::orchestration::OperationResult).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    SpawnFailure,
    NonZeroExit,
    TimedOut,
    IoFailure,
    AlreadyExists,
    NotInstalled,
    Locked,
    InvalidScript,
}

#[derive(Debug, Error)]
pub enum StepError {
    #[error("failed to start `{program}`: {reason}")]
    Spawn { program: String, reason: String },

    #[error("`{program}` exited with status {code}")]
    NonZeroExit { program: String, code: i32 },

    #[error("`{program}` did not finish within {secs}s")]
    TimedOut { program: String, secs: u64 },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("{} already exists", .0.display())]
    AlreadyExists(PathBuf),

    #[error("{} is not installed", .0.display())]
    NotInstalled(PathBuf),

    #[error("another operation holds the lock {}{}", path.display(), holder_suffix(*holder))]
    Locked { path: PathBuf, holder: Option<u32> },

    #[error("invalid script name '{0}'")]
    InvalidScript(String),
}

impl StepError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Spawn { .. } => ErrorKind::SpawnFailure,
            Self::NonZeroExit { .. } => ErrorKind::NonZeroExit,
            Self::TimedOut { .. } => ErrorKind::TimedOut,
            Self::Io { .. } => ErrorKind::IoFailure,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::NotInstalled(_) => ErrorKind::NotInstalled,
            Self::Locked { .. } => ErrorKind::Locked,
            Self::InvalidScript(_) => ErrorKind::InvalidScript,
        }
    }
}

fn holder_suffix(holder: Option<u32>) -> String {
    holder.map(|pid| format!(" (pid {pid})")).unwrap_or_default()
}
