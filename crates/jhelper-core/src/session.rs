//! Interactive script sessions.
//!
//! A session runs one helper script under the first available interpreter,
//! relays its output as it is produced and accepts input one line at a time.
//! Every session owns its handle; nothing is registered globally.

use std::io;
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;

use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::process::{ChildStdin, Command};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::StepError;
use crate::probe;
use crate::process::{OutputChunk, OutputStream, pump};

/// One chunk of script output, tagged by stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptOutput {
    pub stream: OutputStream,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    /// `None` when the script never started or was killed by a signal.
    pub exit_code: Option<i32>,
}

impl ScriptResult {
    fn not_started(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: reason.into(),
            exit_code: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionBridge {
    interpreters: Vec<String>,
    scripts_dir: PathBuf,
}

impl SessionBridge {
    pub fn new(interpreters: Vec<String>, scripts_dir: impl Into<PathBuf>) -> Self {
        Self {
            interpreters,
            scripts_dir: scripts_dir.into(),
        }
    }

    pub fn scripts_dir(&self) -> &Path {
        &self.scripts_dir
    }

    /// Resolve `script_name` inside the scripts directory. Absolute names and
    /// names that climb out with `..` are rejected.
    pub fn script_path(&self, script_name: &str) -> Result<PathBuf, StepError> {
        let relative = Path::new(script_name);
        let valid = !script_name.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
        if !valid {
            return Err(StepError::InvalidScript(script_name.to_string()));
        }
        Ok(self.scripts_dir.join(relative))
    }

    /// Start `script_name` with `args`. Output is handed to `on_output` as it
    /// arrives. A script that cannot be spawned still yields a handle; its
    /// [`SessionHandle::wait`] reports the failure.
    pub async fn start<F>(
        &self,
        script_name: &str,
        args: &[String],
        on_output: F,
    ) -> Result<SessionHandle, StepError>
    where
        F: Fn(&ScriptOutput) + Send + Sync + 'static,
    {
        let script = self.script_path(script_name)?;
        let Some(interpreter) = self.resolve_interpreter().await else {
            warn!(script = script_name, "no interpreter configured");
            return Ok(SessionHandle::finished(ScriptResult::not_started(
                "No interpreter configured",
            )));
        };

        info!(script = script_name, interpreter = %interpreter, "starting script session");

        let mut command = Command::new(&interpreter);
        command
            .arg(&script)
            .args(args)
            .current_dir(&self.scripts_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                warn!(script = script_name, interpreter = %interpreter, error = %err, "failed to start script");
                return Ok(SessionHandle::finished(ScriptResult::not_started(format!(
                    "Failed to start {interpreter}: {err}"
                ))));
            }
        };

        let stdin = child.stdin.take();
        let (tx, mut rx) = mpsc::unbounded_channel::<OutputChunk>();
        if let Some(pipe) = child.stdout.take() {
            tokio::spawn(pump(pipe, OutputStream::Stdout, tx.clone()));
        }
        if let Some(pipe) = child.stderr.take() {
            tokio::spawn(pump(pipe, OutputStream::Stderr, tx.clone()));
        }
        drop(tx);

        let script_label = script_name.to_string();
        let task = tokio::spawn(async move {
            let mut stdout = String::new();
            let mut stderr = String::new();
            while let Some(chunk) = rx.recv().await {
                on_output(&ScriptOutput {
                    stream: chunk.stream,
                    data: chunk.text.clone(),
                });
                match chunk.stream {
                    OutputStream::Stdout => stdout.push_str(&chunk.text),
                    OutputStream::Stderr => stderr.push_str(&chunk.text),
                }
            }

            let exit_code = match child.wait().await {
                Ok(status) => status.code(),
                Err(err) => {
                    warn!(script = %script_label, error = %err, "failed to collect script exit status");
                    None
                }
            };
            debug!(script = %script_label, ?exit_code, "script session ended");
            ScriptResult {
                success: exit_code == Some(0),
                stdout,
                stderr,
                exit_code,
            }
        });

        Ok(SessionHandle {
            stdin: Mutex::new(stdin),
            task,
        })
    }

    /// First interpreter that answers `--version`, else the first configured
    /// name so the spawn error names it.
    async fn resolve_interpreter(&self) -> Option<String> {
        let first = self.interpreters.first()?.clone();
        let probe = probe::check_interpreter(&self.interpreters).await;
        Some(if probe.available { probe.command } else { first })
    }
}

/// A running (or already finished) script.
#[derive(Debug)]
pub struct SessionHandle {
    stdin: Mutex<Option<ChildStdin>>,
    task: JoinHandle<ScriptResult>,
}

impl SessionHandle {
    fn finished(result: ScriptResult) -> Self {
        Self {
            stdin: Mutex::new(None),
            task: tokio::spawn(async move { result }),
        }
    }

    /// Write `text` followed by a newline to the script's input.
    pub async fn send_input(&self, text: &str) -> Result<(), StepError> {
        let mut guard = self.stdin.lock().await;
        let Some(stdin) = guard.as_mut() else {
            return Err(StepError::io(
                "Script input is closed",
                io::Error::from(io::ErrorKind::BrokenPipe),
            ));
        };
        let line = format!("{text}\n");
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|err| StepError::io("Failed to write to script input", err))?;
        stdin
            .flush()
            .await
            .map_err(|err| StepError::io("Failed to write to script input", err))
    }

    /// True once the script exited and its output was fully relayed.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Close the script's input so it sees end-of-file.
    pub async fn close_input(&self) {
        self.stdin.lock().await.take();
    }

    /// Wait for the script to exit. Input is closed first.
    pub async fn wait(self) -> ScriptResult {
        self.stdin.lock().await.take();
        match self.task.await {
            Ok(result) => result,
            Err(err) => ScriptResult::not_started(format!("Script session task failed: {err}")),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex as StdMutex};
    use tempfile::TempDir;

    fn bridge_with(script: &str, body: &str) -> (TempDir, SessionBridge) {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(script), body).unwrap();
        let bridge = SessionBridge::new(vec!["sh".to_string()], temp.path());
        (temp, bridge)
    }

    #[test]
    fn script_names_must_stay_inside_scripts_dir() {
        let bridge = SessionBridge::new(vec!["sh".to_string()], "/srv/scripts");

        assert_eq!(
            bridge.script_path("tools/report.py").unwrap(),
            PathBuf::from("/srv/scripts/tools/report.py")
        );
        for bad in ["", "../escape.py", "tools/../../x", "/etc/passwd"] {
            assert!(
                matches!(bridge.script_path(bad), Err(StepError::InvalidScript(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn input_lines_reach_the_script_and_output_is_relayed() {
        let (_temp, bridge) = bridge_with(
            "echo.sh",
            "read line\necho \"got $line\"\necho oops >&2\nexit 2\n",
        );
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let handle = bridge
            .start("echo.sh", &[], move |output| {
                sink.lock().unwrap().push(output.clone())
            })
            .await
            .unwrap();
        handle.send_input("hello").await.unwrap();
        let result = handle.wait().await;

        assert!(!result.success);
        assert_eq!(result.exit_code, Some(2));
        assert_eq!(result.stdout, "got hello\n");
        assert_eq!(result.stderr, "oops\n");

        let seen = seen.lock().unwrap();
        let relayed: String = seen
            .iter()
            .filter(|o| o.stream == OutputStream::Stdout)
            .map(|o| o.data.as_str())
            .collect();
        assert_eq!(relayed, "got hello\n");
    }

    #[tokio::test]
    async fn arguments_are_passed_verbatim() {
        let (_temp, bridge) = bridge_with("args.sh", "printf '%s|' \"$@\"\n");

        let args = vec!["two words".to_string(), "x".to_string()];
        let handle = bridge.start("args.sh", &args, |_| {}).await.unwrap();
        let result = handle.wait().await;

        assert!(result.success);
        assert_eq!(result.stdout, "two words|x|");
    }

    #[tokio::test]
    async fn closed_input_rejects_further_lines() {
        let (_temp, bridge) = bridge_with("cat.sh", "cat\n");

        let handle = bridge.start("cat.sh", &[], |_| {}).await.unwrap();
        handle.send_input("one").await.unwrap();
        handle.close_input().await;

        assert!(handle.send_input("two").await.is_err());
        let result = handle.wait().await;
        assert!(result.success);
        assert_eq!(result.stdout, "one\n");
    }

    #[tokio::test]
    async fn missing_interpreter_resolves_to_failed_result() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("x.py"), "print(1)\n").unwrap();
        let bridge = SessionBridge::new(vec!["no-such-python-4711".to_string()], temp.path());

        let handle = bridge.start("x.py", &[], |_| {}).await.unwrap();
        let result = handle.wait().await;

        assert!(!result.success);
        assert_eq!(result.exit_code, None);
        assert!(result.stderr.contains("no-such-python-4711"));
    }
}
