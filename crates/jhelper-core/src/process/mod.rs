//! Child process execution.
//!
//! - `ProcessExecutor` spawns one command per step and streams its output
//! - `CommandRunner` is the seam orchestrators are generic over
//! - `run_captured` drains a step into strings for probes and status queries

mod decode;
mod executor;

pub(crate) use executor::pump;
pub use executor::{
    CommandRunner, OutputChunk, OutputStream, ProcessExecutor, SENTINEL_EXIT_CODE, StepExit,
};

use tokio::sync::mpsc;

use crate::step::Step;

/// Full output of a step that was run without progress reporting.
#[derive(Debug, Clone)]
pub struct CapturedOutput {
    pub exit: StepExit,
    pub stdout: String,
    pub stderr: String,
}

pub async fn run_captured<R: CommandRunner>(runner: &R, step: &Step) -> CapturedOutput {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputChunk>();
    let collect = async move {
        let mut stdout = String::new();
        let mut stderr = String::new();
        while let Some(chunk) = rx.recv().await {
            match chunk.stream {
                OutputStream::Stdout => stdout.push_str(&chunk.text),
                OutputStream::Stderr => stderr.push_str(&chunk.text),
            }
        }
        (stdout, stderr)
    };
    let (exit, (stdout, stderr)) = tokio::join!(runner.run(step, tx), collect);
    CapturedOutput {
        exit,
        stdout,
        stderr,
    }
}
