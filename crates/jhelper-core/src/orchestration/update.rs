//! Incremental (`pull`) and full (`fresh`) update strategies.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::install::{InstallOrchestrator, ProvisionMode};
use super::pipeline::Pipeline;
use super::plan;
use super::result::OperationResult;
use crate::error::StepError;
use crate::process::{CommandRunner, ProcessExecutor};
use crate::progress::ProgressChannel;
use crate::state::InstallLock;
use crate::step::StepTag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMethod {
    /// Fetch and merge in place, then refresh dependencies.
    #[default]
    Pull,
    /// Remove the installation and run the full install chain again.
    Fresh,
}

impl UpdateMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            UpdateMethod::Pull => "pull",
            UpdateMethod::Fresh => "fresh",
        }
    }
}

impl fmt::Display for UpdateMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpdateMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pull" => Ok(UpdateMethod::Pull),
            "fresh" => Ok(UpdateMethod::Fresh),
            other => anyhow::bail!("Unknown update method: {other}. Use 'pull' or 'fresh'"),
        }
    }
}

#[derive(Debug)]
pub struct UpdateOrchestrator<R = ProcessExecutor> {
    install: InstallOrchestrator<R>,
}

impl<R: CommandRunner> UpdateOrchestrator<R> {
    pub fn new(install: InstallOrchestrator<R>) -> Self {
        Self { install }
    }

    pub fn installer(&self) -> &InstallOrchestrator<R> {
        &self.install
    }

    /// Update an existing installation. Fails with `NotInstalled` when the
    /// tool directory is missing. `progress` is sealed before this returns.
    pub async fn update(&self, method: UpdateMethod, progress: &ProgressChannel) -> OperationResult {
        let layout = self.install.layout();
        info!(tool = layout.tool_name(), %method, "starting update");
        let result = self.update_locked(method, progress).await;
        progress.seal();
        info!(success = result.success, status = ?result.status, "update finished");
        result
    }

    async fn update_locked(&self, method: UpdateMethod, progress: &ProgressChannel) -> OperationResult {
        let layout = self.install.layout();
        let mut pipeline = Pipeline::new(self.install.runner(), progress);

        let _lock = match InstallLock::acquire(&layout.lock_path()) {
            Ok(lock) => lock,
            Err(err) => return pipeline.fail(err.to_string(), &err),
        };

        let tool_dir = layout.tool_dir();
        if !self.install.store().exists(&tool_dir) {
            let err = StepError::NotInstalled(tool_dir);
            return pipeline.fail(
                format!("{} not found. Please install it first.", layout.tool_name()),
                &err,
            );
        }

        match method {
            UpdateMethod::Fresh => self.fresh(&mut pipeline).await,
            UpdateMethod::Pull => self.pull(&mut pipeline).await,
        }
    }

    async fn fresh(&self, pipeline: &mut Pipeline<'_, R>) -> OperationResult {
        let tool_dir = self.install.layout().tool_dir();
        pipeline.announce(
            StepTag::Cleanup,
            "Performing fresh install - removing existing installation...\n",
        );
        if let Err(err) = self.install.store().remove(&tool_dir) {
            return pipeline.fail(err.to_string(), &err);
        }
        pipeline.announce(
            StepTag::Cleanup,
            "Existing installation removed. Starting fresh installation...\n",
        );
        self.install.provision(pipeline, ProvisionMode::Fresh).await
    }

    async fn pull(&self, pipeline: &mut Pipeline<'_, R>) -> OperationResult {
        let layout = self.install.layout();
        let toolchain = self.install.toolchain();

        let status_step = plan::status_step(layout, toolchain);
        let status = pipeline.capture(&status_step).await;
        if !status.exit.success() {
            debug!(exit = ?status.exit, "status query failed; assuming a clean tree");
        }
        // Local changes are reported only; nothing is stashed or copied.
        if !status.stdout.trim().is_empty() {
            pipeline.announce(
                StepTag::Backup,
                "Local changes detected - not backed up, pulling on top of them...\n",
            );
        }

        pipeline.announce(StepTag::Pull, "Fetching latest updates from repository...\n");
        let pull = plan::pull_step(layout, toolchain);
        if let Some(err) = pipeline.run(&pull).await.error(&pull) {
            pipeline.record("\nGit pull failed - you may need to use fresh install option\n");
            return pipeline.fail(
                "Git pull failed. Try fresh install option for a clean update.",
                &err,
            );
        }

        pipeline.announce(StepTag::Install, "Updating Python dependencies...\n");
        let deps = plan::dependencies_step(layout, toolchain);
        match pipeline.run(&deps).await.error(&deps) {
            None => {
                pipeline.record("\n");
                pipeline.announce(StepTag::Complete, "Update completed successfully!\n");
                pipeline.succeed(format!("{} updated successfully!", layout.tool_name()), None)
            }
            Some(err) => pipeline.fail(
                "Update completed with some warnings - check output for details",
                &err,
            ),
        }
    }
}
