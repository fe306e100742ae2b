//! Clone → environment → dependencies → launcher.

use tracing::{info, warn};

use super::pipeline::Pipeline;
use super::plan::{self, Toolchain};
use super::result::OperationResult;
use crate::process::{CommandRunner, ProcessExecutor};
use crate::progress::ProgressChannel;
use crate::state::{InstallLayout, InstallLock, InstallationStateStore};
use crate::step::StepTag;
use crate::wrapper::WrapperGenerator;

/// Which caller the shared provisioning chain is running for; only the
/// wording of messages differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProvisionMode {
    Install,
    Fresh,
}

#[derive(Debug)]
pub struct InstallOrchestrator<R = ProcessExecutor> {
    runner: R,
    layout: InstallLayout,
    toolchain: Toolchain,
    store: InstallationStateStore,
    wrapper: WrapperGenerator,
}

impl<R: CommandRunner> InstallOrchestrator<R> {
    pub fn new(runner: R, layout: InstallLayout, toolchain: Toolchain) -> Self {
        let wrapper = WrapperGenerator::new(layout.tool_name());
        Self {
            runner,
            layout,
            toolchain,
            store: InstallationStateStore::new(),
            wrapper,
        }
    }

    pub fn layout(&self) -> &InstallLayout {
        &self.layout
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub(crate) fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    pub(crate) fn store(&self) -> &InstallationStateStore {
        &self.store
    }

    /// Install the tool. An existing tool directory stops the run before any
    /// step unless `force_reinstall` is set, in which case it is removed first.
    ///
    /// `progress` is sealed before this returns.
    pub async fn install(&self, force_reinstall: bool, progress: &ProgressChannel) -> OperationResult {
        info!(
            tool = self.layout.tool_name(),
            root = %self.layout.root_dir().display(),
            force_reinstall,
            "starting install"
        );
        let result = self.install_locked(force_reinstall, progress).await;
        progress.seal();
        info!(success = result.success, status = ?result.status, "install finished");
        result
    }

    async fn install_locked(&self, force_reinstall: bool, progress: &ProgressChannel) -> OperationResult {
        let name = self.layout.tool_name();
        let mut pipeline = Pipeline::new(&self.runner, progress);

        let _lock = match InstallLock::acquire(&self.layout.lock_path()) {
            Ok(lock) => lock,
            Err(err) => return pipeline.fail(err.to_string(), &err),
        };

        let tool_dir = self.layout.tool_dir();
        let exists = self.store.exists(&tool_dir);
        if exists && !force_reinstall {
            return OperationResult::already_exists(format!(
                "{name} directory already exists. Use reinstall option to update."
            ));
        }

        if exists {
            if let Err(err) = self.store.remove(&tool_dir) {
                return pipeline.fail(err.to_string(), &err);
            }
            pipeline.announce(
                StepTag::Cleanup,
                format!("Removing existing {name} installation...\n"),
            );
        }

        self.provision(&mut pipeline, ProvisionMode::Install).await
    }

    /// EnsureDirs → Clone → CreateEnvironment → InstallDependencies →
    /// GenerateWrapper → Complete. Stops at the first failing step, except
    /// that the launcher is still written when dependency installation fails.
    pub(crate) async fn provision(
        &self,
        pipeline: &mut Pipeline<'_, R>,
        mode: ProvisionMode,
    ) -> OperationResult {
        let layout = &self.layout;
        let name = layout.tool_name();

        if let Err(err) = self
            .store
            .ensure_dirs(&[layout.root_dir().to_path_buf(), layout.bin_dir()])
        {
            return pipeline.fail(format!("Failed to create directories: {err}"), &err);
        }

        let clone = plan::clone_step(layout, &self.toolchain);
        if let Some(err) = pipeline.run(&clone).await.error(&clone) {
            return pipeline.fail(format!("Failed to clone {name} repository"), &err);
        }

        pipeline.announce(StepTag::Venv, "Creating virtual environment...\n");
        let venv = plan::venv_step(layout, &self.toolchain);
        if let Some(err) = pipeline.run(&venv).await.error(&venv) {
            return pipeline.fail("Failed to create virtual environment", &err);
        }

        pipeline.announce(
            StepTag::Install,
            "Installing Python dependencies in virtual environment...\n",
        );
        let deps = plan::dependencies_step(layout, &self.toolchain);
        let deps_error = pipeline.run(&deps).await.error(&deps);
        if let Some(err) = &deps_error {
            warn!(error = %err, "dependency installation failed; still writing launcher");
        }

        let wrapper_path = layout.wrapper_path();
        match self.wrapper.generate(&layout.tool_binary(), &wrapper_path) {
            Ok(()) => {
                pipeline.announce(
                    StepTag::Wrapper,
                    format!("Created wrapper script: {}\n", wrapper_path.display()),
                );
                let message = match (mode, &deps_error) {
                    (ProvisionMode::Install, None) => format!(
                        "{name} installed successfully to {} with virtual environment",
                        layout.root_dir().display()
                    ),
                    (ProvisionMode::Install, Some(_)) => format!(
                        "{name} installed, but dependency installation reported errors - check output for details"
                    ),
                    (ProvisionMode::Fresh, None) => {
                        format!("Fresh {name} installation completed successfully!")
                    }
                    (ProvisionMode::Fresh, Some(_)) => format!(
                        "Fresh {name} installation completed with some warnings - check output for details"
                    ),
                };
                pipeline.announce(StepTag::Complete, format!("{message}\n"));
                match deps_error {
                    None => pipeline.succeed(message, Some(wrapper_path)),
                    Some(err) => pipeline.partial(message, Some(wrapper_path), &err),
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to write launcher");
                pipeline.announce(
                    StepTag::Wrapper,
                    format!("Failed to create wrapper script: {err}\n"),
                );
                match deps_error {
                    None => {
                        let message = match mode {
                            ProvisionMode::Install => format!(
                                "{name} installed but wrapper script failed. You may need to manually set up the environment."
                            ),
                            ProvisionMode::Fresh => format!(
                                "Fresh {name} installation completed but wrapper script failed. You may need to manually set up the environment."
                            ),
                        };
                        pipeline.partial(message, Some(wrapper_path), &err)
                    }
                    Some(deps_err) => pipeline
                        .fail(format!("Failed to install {name} dependencies"), &deps_err)
                        .with_path(wrapper_path),
                }
            }
        }
    }
}
