//! Availability probes for the interpreter, git and the installed tool.

use std::path::Path;
use std::process::Stdio;

use serde::Serialize;
use tokio::process::Command;
use tracing::debug;

use crate::state::InstallLayout;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterpreterProbe {
    pub available: bool,
    pub version: Option<String>,
    pub semver: Option<semver::Version>,
    pub command: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VcsProbe {
    pub available: bool,
    pub version: Option<String>,
    pub semver: Option<semver::Version>,
    pub command: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolProbe {
    pub available: bool,
    pub version: Option<String>,
    pub semver: Option<semver::Version>,
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// First interpreter in `candidates` that answers `--version`.
pub async fn check_interpreter(candidates: &[String]) -> InterpreterProbe {
    for candidate in candidates {
        if let Some(version) = version_of(candidate).await {
            return InterpreterProbe {
                available: true,
                semver: parse_version(&version),
                version: Some(version),
                command: candidate.clone(),
            };
        }
    }
    InterpreterProbe {
        available: false,
        version: None,
        semver: None,
        command: candidates.last().cloned().unwrap_or_default(),
    }
}

pub async fn check_version_control(git: &str) -> VcsProbe {
    let version = version_of(git).await;
    VcsProbe {
        available: version.is_some(),
        semver: version.as_deref().and_then(parse_version),
        version,
        command: git.to_string(),
    }
}

/// Probe `candidates` in order; the first one that runs wins.
pub async fn check_tool(binary_name: &str, candidates: &[String]) -> ToolProbe {
    for candidate in candidates {
        if let Some(version) = version_of(candidate).await {
            return ToolProbe {
                available: true,
                semver: parse_version(&version),
                version: Some(version),
                path: Some(candidate.clone()),
                error: None,
            };
        }
    }
    ToolProbe {
        available: false,
        version: None,
        semver: None,
        path: None,
        error: Some(format!("{binary_name} not found in any standard locations")),
    }
}

/// PATH lookup first, then the launcher, the tool checkout and `/usr/local/bin`.
pub fn tool_candidates(layout: &InstallLayout) -> Vec<String> {
    let binary = layout.binary_name();
    let mut candidates = vec![
        binary.to_string(),
        path_string(&layout.wrapper_path()),
        path_string(&layout.tool_dir().join(binary)),
    ];
    if cfg!(unix) {
        candidates.push(format!("/usr/local/bin/{binary}"));
    }
    candidates
}

/// Best-effort semantic version from `--version` text, e.g. `Python 3.11.4`
/// or `git version 2.43.0`. Missing components are zero-filled.
pub fn parse_version(text: &str) -> Option<semver::Version> {
    text.split(|c: char| c.is_whitespace() || c == '(' || c == ',')
        .map(|token| token.trim_start_matches('v'))
        .find(|token| token.starts_with(|c: char| c.is_ascii_digit()) && token.contains('.'))
        .and_then(|token| {
            let mut parts = token
                .split('.')
                .map(|part| {
                    part.chars()
                        .take_while(char::is_ascii_digit)
                        .collect::<String>()
                        .parse::<u64>()
                        .ok()
                })
                .take(3);
            let major = parts.next().flatten()?;
            let minor = parts.next().flatten().unwrap_or(0);
            let patch = parts.next().flatten().unwrap_or(0);
            Some(semver::Version::new(major, minor, patch))
        })
}

async fn version_of(program: &str) -> Option<String> {
    let output = Command::new(program)
        .arg("--version")
        .stdin(Stdio::null())
        .output()
        .await;
    let output = match output {
        Ok(output) => output,
        Err(err) => {
            debug!(program, error = %err, "probe could not start");
            return None;
        }
    };
    if !output.status.success() {
        debug!(program, status = ?output.status, "probe exited unsuccessfully");
        return None;
    }
    // Older interpreters print their version on stderr.
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if !stdout.is_empty() {
        return Some(stdout);
    }
    Some(String::from_utf8_lossy(&output.stderr).trim().to_string())
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
