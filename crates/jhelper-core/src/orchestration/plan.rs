//! Commands making up the install and update pipelines.

use crate::state::InstallLayout;
use crate::step::{Step, StepTag};

/// External programs and source coordinates the pipelines run against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub git: String,
    /// Interpreter used to create the isolated environment.
    pub python: String,
    pub repository: String,
    pub branch: String,
    /// Requirements file, relative to the tool directory.
    pub requirements: String,
}

pub fn clone_step(layout: &InstallLayout, toolchain: &Toolchain) -> Step {
    Step::new(StepTag::Clone, &toolchain.git, layout.root_dir())
        .args(["clone", toolchain.repository.as_str()])
        .path_arg(&layout.tool_dir())
}

pub fn venv_step(layout: &InstallLayout, toolchain: &Toolchain) -> Step {
    Step::new(StepTag::Venv, &toolchain.python, layout.tool_dir())
        .args(["-m", "venv"])
        .path_arg(&layout.venv_dir())
}

pub fn dependencies_step(layout: &InstallLayout, toolchain: &Toolchain) -> Step {
    Step::new(
        StepTag::Install,
        layout.pip_path().to_string_lossy(),
        layout.tool_dir(),
    )
    .args(["install", "-r", toolchain.requirements.as_str(), "-e", "."])
}

pub fn status_step(layout: &InstallLayout, toolchain: &Toolchain) -> Step {
    Step::new(StepTag::Backup, &toolchain.git, layout.tool_dir()).args(["status", "--porcelain"])
}

pub fn pull_step(layout: &InstallLayout, toolchain: &Toolchain) -> Step {
    Step::new(StepTag::Pull, &toolchain.git, layout.tool_dir())
        .args(["pull", "origin", toolchain.branch.as_str()])
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn fixture() -> (InstallLayout, Toolchain) {
        (
            InstallLayout::new("/home/u/.local", "jiracli", "jcli"),
            Toolchain {
                git: "git".into(),
                python: "python3".into(),
                repository: "https://example.com/jiracli.git".into(),
                branch: "main".into(),
                requirements: "requirements.txt".into(),
            },
        )
    }

    #[test]
    fn clone_runs_from_root_into_tool_dir() {
        let (layout, toolchain) = fixture();
        let step = clone_step(&layout, &toolchain);

        assert_eq!(step.tag, StepTag::Clone);
        assert_eq!(step.cwd, PathBuf::from("/home/u/.local"));
        assert_eq!(
            step.args,
            vec!["clone", "https://example.com/jiracli.git", "/home/u/.local/jiracli"]
        );
    }

    #[test]
    fn dependencies_use_environment_pip_in_editable_mode() {
        let (layout, toolchain) = fixture();
        let step = dependencies_step(&layout, &toolchain);

        assert_eq!(step.program, layout.pip_path().to_string_lossy());
        assert_eq!(step.cwd, layout.tool_dir());
        assert_eq!(step.args, vec!["install", "-r", "requirements.txt", "-e", "."]);
    }

    #[test]
    fn pull_targets_configured_branch() {
        let (layout, mut toolchain) = fixture();
        toolchain.branch = "develop".into();

        assert_eq!(
            pull_step(&layout, &toolchain).args,
            vec!["pull", "origin", "develop"]
        );
        assert_eq!(
            status_step(&layout, &toolchain).args,
            vec!["status", "--porcelain"]
        );
    }
}
