//! Sequential step runner shared by install and update.

use std::path::PathBuf;

use tokio::sync::mpsc;

use super::result::OperationResult;
use crate::error::StepError;
use crate::process::{CapturedOutput, CommandRunner, OutputChunk, StepExit, run_captured};
use crate::progress::ProgressChannel;
use crate::step::{Step, StepTag};

/// Runs steps one at a time, forwarding their output to the progress channel
/// and accumulating the transcript that ends up in the result.
pub(crate) struct Pipeline<'a, R> {
    runner: &'a R,
    progress: &'a ProgressChannel,
    transcript: String,
}

impl<'a, R: CommandRunner> Pipeline<'a, R> {
    pub(crate) fn new(runner: &'a R, progress: &'a ProgressChannel) -> Self {
        Self {
            runner,
            progress,
            transcript: String::new(),
        }
    }

    /// Publish an informational line and keep it in the transcript.
    pub(crate) fn announce(&mut self, tag: StepTag, text: impl Into<String>) {
        let text = text.into();
        self.transcript.push_str(&text);
        self.progress.emit(tag, text);
    }

    /// Transcript-only note; nothing is published.
    pub(crate) fn record(&mut self, text: &str) {
        self.transcript.push_str(text);
    }

    /// Run `step` to completion. Returns only after the child exited and
    /// both of its pipes were drained.
    pub(crate) async fn run(&mut self, step: &Step) -> StepExit {
        let (tx, mut rx) = mpsc::unbounded_channel::<OutputChunk>();
        let runner = self.runner;
        let progress = self.progress;
        let transcript = &mut self.transcript;
        let prefix = step.tag.transcript_prefix();

        let drain = async {
            while let Some(chunk) = rx.recv().await {
                transcript.push_str(&prefix);
                transcript.push_str(&chunk.text);
                progress.emit(step.tag, chunk.text);
            }
        };
        let (exit, ()) = tokio::join!(runner.run(step, tx), drain);

        match &exit {
            StepExit::SpawnFailed(reason) => {
                self.transcript
                    .push_str(&format!("{prefix}could not start {}: {reason}\n", step.program));
            }
            StepExit::TimedOut(limit) => {
                self.transcript.push_str(&format!(
                    "{prefix}{} timed out after {}s\n",
                    step.program,
                    limit.as_secs()
                ));
            }
            _ => {}
        }
        exit
    }

    /// Run `step` without publishing its output.
    pub(crate) async fn capture(&self, step: &Step) -> CapturedOutput {
        run_captured(self.runner, step).await
    }

    pub(crate) fn fail(&mut self, message: impl Into<String>, cause: &StepError) -> OperationResult {
        OperationResult::failed(self.take_transcript(), message, cause)
    }

    pub(crate) fn succeed(
        &mut self,
        message: impl Into<String>,
        path: Option<PathBuf>,
    ) -> OperationResult {
        OperationResult::succeeded(self.take_transcript(), message, path)
    }

    pub(crate) fn partial(
        &mut self,
        message: impl Into<String>,
        path: Option<PathBuf>,
        cause: &StepError,
    ) -> OperationResult {
        OperationResult::partial(self.take_transcript(), message, path, cause)
    }

    fn take_transcript(&mut self) -> String {
        std::mem::take(&mut self.transcript)
    }
}
