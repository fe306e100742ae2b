//! Update strategy tests against a scripted command runner.

mod support;

use jhelper_core::error::ErrorKind;
use jhelper_core::orchestration::{
    InstallOrchestrator, OperationStatus, UpdateMethod, UpdateOrchestrator,
};
use jhelper_core::progress::ProgressChannel;
use jhelper_core::step::StepTag;
use support::{Outcome, RecordingRunner, layout, record_events, step_order, toolchain};
use tempfile::TempDir;

fn installed(temp: &TempDir, runner: RecordingRunner) -> UpdateOrchestrator<RecordingRunner> {
    let install = InstallOrchestrator::new(runner, layout(temp.path()), toolchain());
    let tool_dir = install.layout().tool_dir();
    std::fs::create_dir_all(&tool_dir).expect("Failed to create tool dir");
    std::fs::write(tool_dir.join("local-notes.txt"), "keep me").expect("Failed to write marker");
    UpdateOrchestrator::new(install)
}

#[tokio::test]
async fn update_requires_existing_install() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let orchestrator = UpdateOrchestrator::new(InstallOrchestrator::new(
        RecordingRunner::new(),
        layout(temp.path()),
        toolchain(),
    ));

    for method in [UpdateMethod::Pull, UpdateMethod::Fresh] {
        let progress = ProgressChannel::new();
        let result = orchestrator.update(method, &progress).await;

        assert!(!result.success);
        assert_eq!(result.error, Some(ErrorKind::NotInstalled));
        assert_eq!(result.message, "jiracli not found. Please install it first.");
        assert!(progress.is_sealed());
    }
    assert!(orchestrator.installer().runner().calls().is_empty());
}

// =========================================================================
// Pull Strategy
// =========================================================================

#[tokio::test]
async fn pull_updates_in_place() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let orchestrator = installed(&temp, RecordingRunner::new());
    let tool_dir = orchestrator.installer().layout().tool_dir();

    let progress = ProgressChannel::new();
    let events = record_events(&progress);
    let result = orchestrator.update(UpdateMethod::Pull, &progress).await;

    assert!(result.success, "{}", result.message);
    assert_eq!(result.status, OperationStatus::Success);
    assert_eq!(result.message, "jiracli updated successfully!");
    assert!(tool_dir.join("local-notes.txt").exists());

    let runner = orchestrator.installer().runner();
    assert_eq!(
        runner.tags(),
        vec![StepTag::Backup, StepTag::Pull, StepTag::Install]
    );
    assert_eq!(runner.calls()[1].args, vec!["pull", "origin", "main"]);
    assert_eq!(
        step_order(&events),
        vec![StepTag::Pull, StepTag::Install, StepTag::Complete]
    );
}

#[tokio::test]
async fn local_changes_are_reported_before_pulling() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let runner = RecordingRunner::new()
        .with(StepTag::Backup, Outcome::ok().with_stdout(" M jira.py\n"));
    let orchestrator = installed(&temp, runner);

    let progress = ProgressChannel::new();
    let events = record_events(&progress);
    let result = orchestrator.update(UpdateMethod::Pull, &progress).await;

    assert!(result.success, "{}", result.message);
    let events = events.lock().unwrap();
    let first = events.first().expect("expected a progress event");
    assert_eq!(first.step, StepTag::Backup);
    assert!(first.data.contains("Local changes detected"));
    assert!(events.iter().any(|event| event.step == StepTag::Pull));
    // The porcelain listing itself is not published.
    assert!(!events.iter().any(|event| event.data.contains("jira.py")));
}

#[tokio::test]
async fn failed_pull_suggests_fresh_install() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let runner = RecordingRunner::new().with(
        StepTag::Pull,
        Outcome::exit(1).with_stderr("error: Your local changes would be overwritten\n"),
    );
    let orchestrator = installed(&temp, runner);

    let result = orchestrator
        .update(UpdateMethod::Pull, &ProgressChannel::new())
        .await;

    assert!(!result.success);
    assert_eq!(
        result.message,
        "Git pull failed. Try fresh install option for a clean update."
    );
    assert!(
        result
            .output
            .contains("Git pull failed - you may need to use fresh install option")
    );
    assert!(
        !orchestrator
            .installer()
            .runner()
            .tags()
            .contains(&StepTag::Install)
    );
    assert!(orchestrator.installer().layout().tool_dir().exists());
}

#[tokio::test]
async fn dependency_refresh_failure_fails_pull() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let runner = RecordingRunner::new().with(StepTag::Install, Outcome::exit(2));
    let orchestrator = installed(&temp, runner);

    let result = orchestrator
        .update(UpdateMethod::Pull, &ProgressChannel::new())
        .await;

    assert!(!result.success);
    assert_eq!(
        result.message,
        "Update completed with some warnings - check output for details"
    );
}

// =========================================================================
// Fresh Strategy
// =========================================================================

#[tokio::test]
async fn fresh_removes_then_reprovisions() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let orchestrator = installed(&temp, RecordingRunner::new());
    let tool_dir = orchestrator.installer().layout().tool_dir();

    let progress = ProgressChannel::new();
    let events = record_events(&progress);
    let result = orchestrator.update(UpdateMethod::Fresh, &progress).await;

    assert!(result.success, "{}", result.message);
    assert_eq!(
        result.message,
        "Fresh jiracli installation completed successfully!"
    );
    assert!(tool_dir.exists());
    assert!(!tool_dir.join("local-notes.txt").exists());

    let runner = orchestrator.installer().runner();
    assert_eq!(runner.clone_targets_existed(), vec![false]);
    assert_eq!(
        step_order(&events),
        vec![
            StepTag::Cleanup,
            StepTag::Clone,
            StepTag::Venv,
            StepTag::Install,
            StepTag::Wrapper,
            StepTag::Complete
        ]
    );
}

#[tokio::test]
async fn fresh_with_dependency_failure_is_partial() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let runner = RecordingRunner::new().with(StepTag::Install, Outcome::exit(1));
    let orchestrator = installed(&temp, runner);

    let result = orchestrator
        .update(UpdateMethod::Fresh, &ProgressChannel::new())
        .await;

    assert!(result.success);
    assert_eq!(result.status, OperationStatus::PartialSuccess);
    assert!(result.message.starts_with("Fresh jiracli installation completed with some warnings"));
}
