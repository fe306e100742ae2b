//! Spawns one external command and streams its output.

use std::future::Future;
use std::process::Stdio;
use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::decode::ChunkDecoder;
use crate::error::StepError;
use crate::step::Step;

/// Exit code reported for steps that never produced a real exit status.
pub const SENTINEL_EXIT_CODE: i32 = -1;

const READ_BUFFER_SIZE: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChunk {
    pub stream: OutputStream,
    pub text: String,
}

impl OutputChunk {
    pub fn stdout(text: impl Into<String>) -> Self {
        Self {
            stream: OutputStream::Stdout,
            text: text.into(),
        }
    }

    pub fn stderr(text: impl Into<String>) -> Self {
        Self {
            stream: OutputStream::Stderr,
            text: text.into(),
        }
    }
}

/// How a step's process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepExit {
    Exited(i32),
    /// Killed by a signal, or the exit status could not be collected.
    Terminated,
    SpawnFailed(String),
    TimedOut(Duration),
}

impl StepExit {
    pub fn success(&self) -> bool {
        matches!(self, StepExit::Exited(0))
    }

    pub fn code(&self) -> i32 {
        match self {
            StepExit::Exited(code) => *code,
            _ => SENTINEL_EXIT_CODE,
        }
    }

    /// `None` on success, otherwise the matching [`StepError`].
    pub fn error(&self, step: &Step) -> Option<StepError> {
        let program = step.program.clone();
        match self {
            StepExit::Exited(0) => None,
            StepExit::Exited(code) => Some(StepError::NonZeroExit {
                program,
                code: *code,
            }),
            StepExit::Terminated => Some(StepError::NonZeroExit {
                program,
                code: SENTINEL_EXIT_CODE,
            }),
            StepExit::SpawnFailed(reason) => Some(StepError::Spawn {
                program,
                reason: reason.clone(),
            }),
            StepExit::TimedOut(limit) => Some(StepError::TimedOut {
                program,
                secs: limit.as_secs(),
            }),
        }
    }
}

/// Runs pipeline steps. Output chunks go to `output` while the command runs;
/// the sender is dropped once the step has settled.
pub trait CommandRunner: Send + Sync {
    fn run(
        &self,
        step: &Step,
        output: UnboundedSender<OutputChunk>,
    ) -> impl Future<Output = StepExit> + Send;
}

/// [`CommandRunner`] backed by real child processes.
#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor {
    timeout: Option<Duration>,
}

impl ProcessExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl CommandRunner for ProcessExecutor {
    async fn run(&self, step: &Step, output: UnboundedSender<OutputChunk>) -> StepExit {
        debug!(
            step = %step.tag,
            command = %step.display_command(),
            cwd = %step.cwd.display(),
            "spawning step"
        );

        let mut command = Command::new(&step.program);
        command
            .args(&step.args)
            .current_dir(&step.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                warn!(step = %step.tag, program = %step.program, error = %err, "failed to spawn step");
                return StepExit::SpawnFailed(err.to_string());
            }
        };

        let mut readers: Vec<_> = [
            child
                .stdout
                .take()
                .map(|pipe| tokio::spawn(pump(pipe, OutputStream::Stdout, output.clone()))),
            child
                .stderr
                .take()
                .map(|pipe| tokio::spawn(pump(pipe, OutputStream::Stderr, output.clone()))),
        ]
        .into_iter()
        .flatten()
        .collect();
        drop(output);

        // One deadline covers the child and the pipes it leaves behind.
        let deadline = self.timeout.map(|limit| (limit, Instant::now() + limit));
        let mut exit = wait_for_exit(&mut child, deadline).await;
        if !matches!(exit, StepExit::TimedOut(_)) {
            let drained = async {
                for reader in readers.iter_mut() {
                    let _ = reader.await;
                }
            };
            match deadline {
                None => drained.await,
                Some((limit, at)) => {
                    if tokio::time::timeout_at(at, drained).await.is_err() {
                        warn!(step = %step.tag, "step output still open at the deadline");
                        exit = StepExit::TimedOut(limit);
                    }
                }
            }
        }
        if matches!(exit, StepExit::TimedOut(_)) {
            // Orphaned grandchildren may keep the pipes open forever.
            for reader in &readers {
                reader.abort();
            }
        }
        for reader in readers {
            let _ = reader.await;
        }

        match &exit {
            StepExit::Exited(0) => debug!(step = %step.tag, "step finished"),
            other => warn!(step = %step.tag, exit = ?other, "step failed"),
        }
        exit
    }
}

async fn wait_for_exit(child: &mut Child, deadline: Option<(Duration, Instant)>) -> StepExit {
    let status = match deadline {
        None => child.wait().await,
        Some((limit, at)) => match tokio::time::timeout_at(at, child.wait()).await {
            Ok(status) => status,
            Err(_) => {
                let _ = child.kill().await;
                return StepExit::TimedOut(limit);
            }
        },
    };

    match status {
        Ok(status) => status
            .code()
            .map(StepExit::Exited)
            .unwrap_or(StepExit::Terminated),
        Err(err) => {
            warn!(error = %err, "failed to collect exit status");
            StepExit::Terminated
        }
    }
}

pub(crate) async fn pump<R>(mut pipe: R, stream: OutputStream, output: UnboundedSender<OutputChunk>)
where
    R: AsyncRead + Unpin,
{
    let mut decoder = ChunkDecoder::default();
    let mut buf = [0u8; READ_BUFFER_SIZE];
    loop {
        match pipe.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let text = decoder.push(&buf[..n]);
                if !text.is_empty() && output.send(OutputChunk { stream, text }).is_err() {
                    return;
                }
            }
        }
    }
    let rest = decoder.finish();
    if !rest.is_empty() {
        let _ = output.send(OutputChunk { stream, text: rest });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::StepTag;

    #[test]
    fn exit_codes_map_to_errors() {
        let step = Step::new(StepTag::Clone, "git", "/tmp");

        assert!(StepExit::Exited(0).error(&step).is_none());
        assert!(matches!(
            StepExit::Exited(128).error(&step),
            Some(StepError::NonZeroExit { code: 128, .. })
        ));
        assert!(matches!(
            StepExit::SpawnFailed("No such file".into()).error(&step),
            Some(StepError::Spawn { .. })
        ));
        assert_eq!(StepExit::Terminated.code(), SENTINEL_EXIT_CODE);
        assert_eq!(
            StepExit::TimedOut(Duration::from_secs(3)).code(),
            SENTINEL_EXIT_CODE
        );
    }

    #[tokio::test]
    async fn spawn_failure_yields_no_output() {
        let dir = tempfile::TempDir::new().unwrap();
        let step = Step::new(StepTag::Clone, "definitely-not-a-real-binary-4711", dir.path());
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let exit = ProcessExecutor::new().run(&step, tx).await;

        assert!(matches!(exit, StepExit::SpawnFailed(_)));
        assert!(!exit.success());
        assert!(rx.recv().await.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn streams_both_channels_and_exit_code() {
        let dir = tempfile::TempDir::new().unwrap();
        let step = Step::new(StepTag::Install, "sh", dir.path())
            .args(["-c", "printf out; printf err >&2; exit 3"]);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let exit = ProcessExecutor::new().run(&step, tx).await;

        let mut stdout = String::new();
        let mut stderr = String::new();
        while let Some(chunk) = rx.recv().await {
            match chunk.stream {
                OutputStream::Stdout => stdout.push_str(&chunk.text),
                OutputStream::Stderr => stderr.push_str(&chunk.text),
            }
        }
        assert_eq!(exit, StepExit::Exited(3));
        assert_eq!(stdout, "out");
        assert_eq!(stderr, "err");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_kills_hung_step() {
        let dir = tempfile::TempDir::new().unwrap();
        let step = Step::new(StepTag::Pull, "sleep", dir.path()).arg("30");
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();

        let executor = ProcessExecutor::with_timeout(Some(Duration::from_millis(200)));
        let exit = executor.run(&step, tx).await;

        assert_eq!(exit, StepExit::TimedOut(Duration::from_millis(200)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_covers_pipes_held_by_background_children() {
        let dir = tempfile::TempDir::new().unwrap();
        let step = Step::new(StepTag::Install, "sh", dir.path())
            .args(["-c", "sleep 10 & echo started"]);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let started = std::time::Instant::now();
        let executor = ProcessExecutor::with_timeout(Some(Duration::from_millis(500)));
        let exit = executor.run(&step, tx).await;

        assert_eq!(exit, StepExit::TimedOut(Duration::from_millis(500)));
        assert!(started.elapsed() < Duration::from_secs(5));
        let first = rx.recv().await.unwrap();
        assert_eq!(first.text, "started\n");
    }
}
