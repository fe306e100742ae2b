//! Application context for dependency injection.

use std::path::{Path, PathBuf};

use crate::config::{Settings, ToolConfigStore, expand_home};
use crate::orchestration::{InstallOrchestrator, Toolchain, UpdateOrchestrator};
use crate::probe::{self, InterpreterProbe, ToolProbe, VcsProbe};
use crate::process::ProcessExecutor;
use crate::session::SessionBridge;
use crate::state::{InstallLayout, InstallationState, InstallationStateStore};

/// Resolved settings plus the services built from them.
///
/// Frontends create this once and ask it for orchestrators; each call
/// builds a fresh service, so nothing is shared between operations.
#[derive(Debug, Clone)]
pub struct AppContext {
    home_dir: PathBuf,
    settings: Settings,
    scripts_dir: PathBuf,
}

impl AppContext {
    pub fn new(home_dir: PathBuf, settings: Settings) -> Self {
        let scripts_dir = settings.sessions.scripts_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| home_dir.join(".local").join("share"))
                .join("jhelper")
                .join("scripts")
        });
        Self {
            home_dir,
            settings,
            scripts_dir,
        }
    }

    /// Context for the current user's home directory.
    pub fn with_settings(settings: Settings) -> anyhow::Result<Self> {
        let home_dir = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
        Ok(Self::new(home_dir, settings))
    }

    pub fn home_dir(&self) -> &Path {
        &self.home_dir
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn scripts_dir(&self) -> &Path {
        &self.scripts_dir
    }

    pub fn layout(&self) -> InstallLayout {
        let tool = &self.settings.tool;
        InstallLayout::new(
            expand_home(&tool.install_root, &self.home_dir),
            &tool.name,
            &tool.binary,
        )
    }

    /// Where the tool lives and whether it is installed right now.
    pub fn installation_state(&self) -> InstallationState {
        InstallationStateStore::new().state(&self.layout())
    }

    pub fn toolchain(&self) -> Toolchain {
        self.settings.toolchain()
    }

    pub fn executor(&self) -> ProcessExecutor {
        ProcessExecutor::with_timeout(self.settings.execution.step_timeout())
    }

    pub fn install_orchestrator(&self) -> InstallOrchestrator {
        InstallOrchestrator::new(self.executor(), self.layout(), self.toolchain())
    }

    pub fn update_orchestrator(&self) -> UpdateOrchestrator {
        UpdateOrchestrator::new(self.install_orchestrator())
    }

    pub fn session_bridge(&self) -> SessionBridge {
        SessionBridge::new(
            self.settings.commands.interpreters.clone(),
            self.scripts_dir.clone(),
        )
    }

    pub fn tool_config_store(&self) -> ToolConfigStore {
        ToolConfigStore::new(expand_home(&self.settings.tool.config_file, &self.home_dir))
    }

    pub async fn check_interpreter(&self) -> InterpreterProbe {
        probe::check_interpreter(&self.settings.commands.interpreters).await
    }

    pub async fn check_version_control(&self) -> VcsProbe {
        probe::check_version_control(&self.settings.commands.git).await
    }

    pub async fn check_tool(&self) -> ToolProbe {
        let layout = self.layout();
        probe::check_tool(layout.binary_name(), &probe::tool_candidates(&layout)).await
    }
}
