//! Helper settings and the tool's own configuration file.
//!
//! - `jhelper.toml` holds helper settings (where and how to install)
//! - the tool configuration file is opaque text, read and written verbatim

mod paths;
mod settings;
mod tool_config;

use std::path::{Path, PathBuf};

use anyhow::Context;

pub use paths::expand_home;
pub use settings::{
    CommandSettings, DEFAULT_BINARY_NAME, DEFAULT_BRANCH, DEFAULT_CONFIG_FILE,
    DEFAULT_INSTALL_ROOT, DEFAULT_REPOSITORY, DEFAULT_REQUIREMENTS, DEFAULT_TOOL_NAME,
    ExecutionSettings, SessionSettings, Settings, ToolSettings,
};
pub use tool_config::{ConfigSnapshot, ToolConfigStore, WriteOutcome};

const SETTINGS_FILE: &str = "jhelper.toml";

/// Loads and saves `jhelper.toml`.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Store at the platform config directory (`~/.config/jhelper/jhelper.toml` on Linux).
    pub fn from_default_location() -> anyhow::Result<Self> {
        let dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
            .join("jhelper");
        Ok(Self::from_path(dir.join(SETTINGS_FILE)))
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing file means defaults.
    pub fn load(&self) -> anyhow::Result<Settings> {
        if !self.path.exists() {
            return Ok(Settings::default());
        }
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings: {}", self.path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse settings: {}", self.path.display()))
    }

    pub fn save(&self, settings: &Settings) -> anyhow::Result<()> {
        let content =
            toml::to_string_pretty(settings).context("Failed to serialize settings to TOML")?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory: {}", parent.display())
            })?;
        }
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write settings: {}", self.path.display()))?;
        Ok(())
    }
}
