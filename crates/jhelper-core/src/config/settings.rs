//! `jhelper.toml` schema.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::orchestration::Toolchain;

pub const DEFAULT_TOOL_NAME: &str = "jiracli";
pub const DEFAULT_BINARY_NAME: &str = "jcli";
pub const DEFAULT_REPOSITORY: &str = "https://github.com/apconole/jiracli.git";
pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_REQUIREMENTS: &str = "requirements.txt";
pub const DEFAULT_INSTALL_ROOT: &str = "~/.local";
pub const DEFAULT_CONFIG_FILE: &str = "~/.jira.yml";

/// Helper settings. Every field has a default, so an empty file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub tool: ToolSettings,
    pub commands: CommandSettings,
    pub execution: ExecutionSettings,
    pub sessions: SessionSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolSettings {
    pub name: String,
    pub binary: String,
    pub repository: Url,
    pub branch: String,
    pub requirements: String,
    /// May start with `~`.
    pub install_root: String,
    /// Tool configuration file edited by `config show`/`config set`. May start with `~`.
    pub config_file: String,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            name: DEFAULT_TOOL_NAME.to_string(),
            binary: DEFAULT_BINARY_NAME.to_string(),
            repository: Url::parse(DEFAULT_REPOSITORY).expect("default repository URL is valid"),
            branch: DEFAULT_BRANCH.to_string(),
            requirements: DEFAULT_REQUIREMENTS.to_string(),
            install_root: DEFAULT_INSTALL_ROOT.to_string(),
            config_file: DEFAULT_CONFIG_FILE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CommandSettings {
    pub git: String,
    /// Interpreter that creates the isolated environment.
    pub python: String,
    /// Probe order for `doctor` and script sessions.
    pub interpreters: Vec<String>,
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            git: "git".to_string(),
            python: "python3".to_string(),
            interpreters: vec!["python3".to_string(), "python".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutionSettings {
    /// Per-step deadline. Unset means steps may run forever.
    pub step_timeout_secs: Option<u64>,
}

impl ExecutionSettings {
    pub fn step_timeout(&self) -> Option<Duration> {
        self.step_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct SessionSettings {
    /// Directory holding runnable helper scripts. Defaults to the platform
    /// data directory.
    pub scripts_dir: Option<PathBuf>,
}

impl Settings {
    pub fn toolchain(&self) -> Toolchain {
        Toolchain {
            git: self.commands.git.clone(),
            python: self.commands.python.clone(),
            repository: self.tool.repository.to_string(),
            branch: self.tool.branch.clone(),
            requirements: self.tool.requirements.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.tool.name, "jiracli");
        assert_eq!(settings.commands.interpreters, vec!["python3", "python"]);
        assert_eq!(settings.execution.step_timeout(), None);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [tool]
            branch = "develop"
            repository = "https://example.com/fork/jiracli.git"

            [execution]
            step_timeout_secs = 600
            "#,
        )
        .unwrap();

        assert_eq!(settings.tool.branch, "develop");
        assert_eq!(settings.tool.binary, "jcli");
        assert_eq!(
            settings.execution.step_timeout(),
            Some(Duration::from_secs(600))
        );

        let toolchain = settings.toolchain();
        assert_eq!(toolchain.repository, "https://example.com/fork/jiracli.git");
        assert_eq!(toolchain.branch, "develop");
    }

    #[test]
    fn zero_timeout_means_no_deadline() {
        let execution = ExecutionSettings {
            step_timeout_secs: Some(0),
        };
        assert_eq!(execution.step_timeout(), None);
    }

    #[test]
    fn rejects_invalid_repository_and_unknown_keys() {
        assert!(toml::from_str::<Settings>("[tool]\nrepository = \"not a url\"").is_err());
        assert!(toml::from_str::<Settings>("[tool]\nrepo = \"x\"").is_err());
    }
}
