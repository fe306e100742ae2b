//! Verbatim access to the tool's configuration file.

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigSnapshot {
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The content is never parsed.
#[derive(Debug, Clone)]
pub struct ToolConfigStore {
    path: PathBuf,
}

impl ToolConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> ConfigSnapshot {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => ConfigSnapshot {
                exists: true,
                content: Some(content),
                error: None,
            },
            Err(err) => {
                debug!(path = %self.path.display(), error = %err, "tool config not readable");
                ConfigSnapshot {
                    exists: false,
                    content: None,
                    error: (err.kind() != io::ErrorKind::NotFound).then(|| err.to_string()),
                }
            }
        }
    }

    pub fn write(&self, content: &str) -> WriteOutcome {
        match self.write_inner(content) {
            Ok(()) => WriteOutcome {
                success: true,
                error: None,
            },
            Err(err) => WriteOutcome {
                success: false,
                error: Some(err.to_string()),
            },
        }
    }

    fn write_inner(&self, content: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, content)
    }
}
