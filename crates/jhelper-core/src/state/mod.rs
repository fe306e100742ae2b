//! Filesystem-backed installation state.
//!
//! Nothing here is cached: the directory tree is the state, and every
//! install or update call re-reads it.

mod lock;

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::StepError;

pub use lock::InstallLock;

/// Where the tool, its environment and its launcher live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    root_dir: PathBuf,
    tool_name: String,
    binary_name: String,
}

impl InstallLayout {
    pub fn new(
        root_dir: impl Into<PathBuf>,
        tool_name: impl Into<String>,
        binary_name: impl Into<String>,
    ) -> Self {
        Self {
            root_dir: root_dir.into(),
            tool_name: tool_name.into(),
            binary_name: binary_name.into(),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    pub fn binary_name(&self) -> &str {
        &self.binary_name
    }

    pub fn tool_dir(&self) -> PathBuf {
        self.root_dir.join(&self.tool_name)
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.root_dir.join("bin")
    }

    pub fn venv_dir(&self) -> PathBuf {
        self.tool_dir().join("venv")
    }

    pub fn venv_bin_dir(&self) -> PathBuf {
        if cfg!(windows) {
            self.venv_dir().join("Scripts")
        } else {
            self.venv_dir().join("bin")
        }
    }

    pub fn pip_path(&self) -> PathBuf {
        self.venv_bin_dir().join("pip")
    }

    /// The tool's entry point inside the isolated environment.
    pub fn tool_binary(&self) -> PathBuf {
        let mut file_name = self.binary_name.clone();
        if cfg!(windows) {
            file_name.push_str(".exe");
        }
        self.venv_bin_dir().join(file_name)
    }

    pub fn wrapper_path(&self) -> PathBuf {
        let mut file_name = self.binary_name.clone();
        if cfg!(windows) {
            file_name.push_str(".cmd");
        }
        self.bin_dir().join(file_name)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root_dir.join(format!(".{}.lock", self.tool_name))
    }
}

/// Snapshot of the layout plus whether the tool directory exists right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallationState {
    pub root_dir: PathBuf,
    pub tool_dir: PathBuf,
    pub bin_dir: PathBuf,
    pub exists: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InstallationStateStore;

impl InstallationStateStore {
    pub fn new() -> Self {
        Self
    }

    pub fn state(&self, layout: &InstallLayout) -> InstallationState {
        let tool_dir = layout.tool_dir();
        InstallationState {
            exists: self.exists(&tool_dir),
            root_dir: layout.root_dir().to_path_buf(),
            bin_dir: layout.bin_dir(),
            tool_dir,
        }
    }

    /// Existence only; the contents are not validated.
    pub fn exists(&self, tool_dir: &Path) -> bool {
        tool_dir.exists()
    }

    /// Recursive forced delete. A missing path is not an error.
    pub fn remove(&self, tool_dir: &Path) -> Result<(), StepError> {
        let metadata = match std::fs::symlink_metadata(tool_dir) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => {
                return Err(StepError::io(
                    format!("Failed to inspect {}", tool_dir.display()),
                    err,
                ));
            }
        };

        let removed = if metadata.is_dir() {
            std::fs::remove_dir_all(tool_dir)
        } else {
            std::fs::remove_file(tool_dir)
        };
        match removed {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StepError::io(
                format!("Failed to remove existing installation {}", tool_dir.display()),
                err,
            )),
        }
    }

    pub fn ensure_dirs<P: AsRef<Path>>(&self, paths: &[P]) -> Result<(), StepError> {
        for path in paths {
            let path = path.as_ref();
            std::fs::create_dir_all(path).map_err(|err| {
                StepError::io(
                    format!("Failed to create directory {}", path.display()),
                    err,
                )
            })?;
        }
        Ok(())
    }
}
