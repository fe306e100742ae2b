//! Launcher generation for the installed tool.

use std::io;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::StepError;

/// Writes a launcher that forwards every argument to the binary inside the
/// isolated environment and exits with its status.
#[derive(Debug, Clone)]
pub struct WrapperGenerator {
    label: String,
}

impl WrapperGenerator {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }

    /// Replace whatever is at `wrapper_path` with a fresh launcher for
    /// `target_binary`.
    pub fn generate(&self, target_binary: &Path, wrapper_path: &Path) -> Result<(), StepError> {
        let script = self.render(target_binary, Utc::now());

        // Unlink first so an old symlink is replaced rather than written through.
        match std::fs::remove_file(wrapper_path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(StepError::io(
                    format!("Failed to replace {}", wrapper_path.display()),
                    err,
                ));
            }
        }

        std::fs::write(wrapper_path, script.as_bytes()).map_err(|err| {
            StepError::io(
                format!("Failed to write wrapper script {}", wrapper_path.display()),
                err,
            )
        })?;
        make_executable(wrapper_path)
    }

    pub fn render(&self, target_binary: &Path, generated_at: DateTime<Utc>) -> String {
        let stamp = generated_at.to_rfc3339_opts(SecondsFormat::Secs, true);
        let target = target_binary.to_string_lossy();
        if cfg!(windows) {
            format!(
                "@echo off\r\nrem {} launcher generated {}\r\n\"{}\" %*\r\nexit /b %ERRORLEVEL%\r\n",
                self.label,
                stamp,
                escape_batch_percent(&target)
            )
        } else {
            format!(
                "#!/bin/sh\n# {} launcher generated {}\nexec \"{}\" \"$@\"\n",
                self.label,
                stamp,
                escape_double_quoted(&target)
            )
        }
    }
}

/// Escape for a POSIX double-quoted string.
fn escape_double_quoted(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '"' | '\\' | '$' | '`') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// cmd.exe expands `%VAR%` even inside quotes; `%%` is a literal percent.
fn escape_batch_percent(raw: &str) -> String {
    raw.replace('%', "%%")
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<(), StepError> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).map_err(|err| {
        StepError::io(
            format!("Failed to mark {} executable", path.display()),
            err,
        )
    })
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<(), StepError> {
    // .cmd launchers are resolved by extension.
    Ok(())
}
