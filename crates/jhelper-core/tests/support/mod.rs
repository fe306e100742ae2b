#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use jhelper_core::orchestration::Toolchain;
use jhelper_core::process::{CommandRunner, OutputChunk, StepExit};
use jhelper_core::progress::{ProgressChannel, ProgressEvent};
use jhelper_core::state::InstallLayout;
use jhelper_core::step::{Step, StepTag};
use tokio::sync::mpsc::UnboundedSender;

/// What a scripted step prints and how it exits.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub exit: StepExit,
    pub chunks: Vec<OutputChunk>,
}

impl Outcome {
    pub fn ok() -> Self {
        Self::exit(0)
    }

    pub fn exit(code: i32) -> Self {
        Self {
            exit: StepExit::Exited(code),
            chunks: Vec::new(),
        }
    }

    pub fn spawn_failure() -> Self {
        Self {
            exit: StepExit::SpawnFailed("No such file or directory (os error 2)".to_string()),
            chunks: Vec::new(),
        }
    }

    pub fn timed_out(secs: u64) -> Self {
        Self {
            exit: StepExit::TimedOut(std::time::Duration::from_secs(secs)),
            chunks: Vec::new(),
        }
    }

    pub fn with_stdout(mut self, text: &str) -> Self {
        self.chunks.push(OutputChunk::stdout(text));
        self
    }

    pub fn with_stderr(mut self, text: &str) -> Self {
        self.chunks.push(OutputChunk::stderr(text));
        self
    }
}

/// Scripted [`CommandRunner`]. Records every step it is asked to run and
/// simulates the filesystem side effect of a successful clone.
///
/// Unscripted steps succeed and print one line; the status query defaults
/// to a clean working tree.
#[derive(Debug)]
pub struct RecordingRunner {
    outcomes: Mutex<HashMap<StepTag, Outcome>>,
    calls: Mutex<Vec<Step>>,
    clone_targets_existed: Mutex<Vec<bool>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        let mut outcomes = HashMap::new();
        outcomes.insert(StepTag::Backup, Outcome::ok());
        Self {
            outcomes: Mutex::new(outcomes),
            calls: Mutex::new(Vec::new()),
            clone_targets_existed: Mutex::new(Vec::new()),
        }
    }

    pub fn with(self, tag: StepTag, outcome: Outcome) -> Self {
        self.outcomes.lock().unwrap().insert(tag, outcome);
        self
    }

    pub fn calls(&self) -> Vec<Step> {
        self.calls.lock().unwrap().clone()
    }

    pub fn tags(&self) -> Vec<StepTag> {
        self.calls().iter().map(|step| step.tag).collect()
    }

    /// For each clone, whether its target directory existed when it started.
    pub fn clone_targets_existed(&self) -> Vec<bool> {
        self.clone_targets_existed.lock().unwrap().clone()
    }
}

impl CommandRunner for RecordingRunner {
    async fn run(&self, step: &Step, output: UnboundedSender<OutputChunk>) -> StepExit {
        self.calls.lock().unwrap().push(step.clone());
        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .get(&step.tag)
            .cloned()
            .unwrap_or_else(|| Outcome::ok().with_stdout(&format!("{} done\n", step.tag)));

        if step.tag == StepTag::Clone
            && let Some(target) = step.args.last()
        {
            let target = Path::new(target);
            self.clone_targets_existed
                .lock()
                .unwrap()
                .push(target.exists());
            if outcome.exit.success() {
                std::fs::create_dir_all(target).unwrap();
            }
        }

        for chunk in outcome.chunks {
            let _ = output.send(chunk);
        }
        outcome.exit
    }
}

pub fn toolchain() -> Toolchain {
    Toolchain {
        git: "git".to_string(),
        python: "python3".to_string(),
        repository: "https://example.com/jiracli.git".to_string(),
        branch: "main".to_string(),
        requirements: "requirements.txt".to_string(),
    }
}

pub fn layout(base: &Path) -> InstallLayout {
    InstallLayout::new(base.join("local"), "jiracli", "jcli")
}

/// Subscribe a recorder to `progress`.
pub fn record_events(progress: &ProgressChannel) -> Arc<Mutex<Vec<ProgressEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    progress.subscribe(move |event| sink.lock().unwrap().push(event.clone()));
    events
}

/// Step tags in the order they were first seen, with consecutive repeats
/// collapsed.
pub fn step_order(events: &Mutex<Vec<ProgressEvent>>) -> Vec<StepTag> {
    let mut order: Vec<StepTag> = Vec::new();
    for event in events.lock().unwrap().iter() {
        if order.last() != Some(&event.step) {
            order.push(event.step);
        }
    }
    order
}

/// Write `/bin/sh` stand-ins for git and python into `dir`.
///
/// - `git clone` creates the target; `git status` reports a change when the
///   checkout holds a `.dirty` marker
/// - `python -m venv` lays down a `pip` that succeeds and a `jcli` that
///   prints each argument in angle brackets and exits 3
#[cfg(unix)]
pub fn write_stub_toolchain(dir: &Path) -> Toolchain {
    const GIT: &str = r#"#!/bin/sh
case "$1" in
  clone)
    echo "Cloning into '$3'..." >&2
    mkdir -p "$3" || exit 128
    printf 'jira\n' > "$3/requirements.txt"
    ;;
  status)
    if [ -f .dirty ]; then echo " M jira.py"; fi
    ;;
  pull)
    echo "Already up to date."
    ;;
  *)
    exit 1
    ;;
esac
"#;

    const PYTHON: &str = r#"#!/bin/sh
venv="$3"
mkdir -p "$venv/bin"
cat > "$venv/bin/pip" <<'EOF'
#!/bin/sh
echo "Successfully installed jiracli"
EOF
cat > "$venv/bin/jcli" <<'EOF'
#!/bin/sh
for arg in "$@"; do printf '<%s>' "$arg"; done
printf '\n'
exit 3
EOF
chmod +x "$venv/bin/pip" "$venv/bin/jcli"
"#;

    let git = write_executable(dir, "git", GIT);
    let python = write_executable(dir, "python", PYTHON);
    Toolchain {
        git,
        python,
        ..toolchain()
    }
}

#[cfg(unix)]
fn write_executable(dir: &Path, name: &str, body: &str) -> String {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, body).expect("Failed to write stub");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("Failed to mark stub executable");
    path.to_string_lossy().into_owned()
}
