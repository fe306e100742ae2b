//! Pipeline step descriptions.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Label attached to every progress event and transcript chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepTag {
    Clone,
    Venv,
    Install,
    Wrapper,
    Cleanup,
    Backup,
    Pull,
    Complete,
}

impl StepTag {
    pub fn as_str(self) -> &'static str {
        match self {
            StepTag::Clone => "clone",
            StepTag::Venv => "venv",
            StepTag::Install => "install",
            StepTag::Wrapper => "wrapper",
            StepTag::Cleanup => "cleanup",
            StepTag::Backup => "backup",
            StepTag::Pull => "pull",
            StepTag::Complete => "complete",
        }
    }

    /// Prefix used for this step's chunks in the operation transcript.
    pub fn transcript_prefix(self) -> String {
        format!("[{}] ", self.as_str().to_ascii_uppercase())
    }
}

impl fmt::Display for StepTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One external command of a pipeline. Built fresh for every invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub tag: StepTag,
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl Step {
    pub fn new(tag: StepTag, program: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            tag,
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy().into_owned())
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Shell-like rendering for logs and diagnostics.
    pub fn display_command(&self) -> String {
        let mut rendered = self.program.clone();
        for arg in &self.args {
            rendered.push(' ');
            if arg.contains(char::is_whitespace) {
                rendered.push_str(&format!("\"{arg}\""));
            } else {
                rendered.push_str(arg);
            }
        }
        rendered
    }
}
