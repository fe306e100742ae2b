//! Terminal rendering for progress events and results.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use console::{Style, style};

use jhelper_core::orchestration::{OperationResult, OperationStatus};
use jhelper_core::progress::{ProgressChannel, ProgressEvent};
use jhelper_core::step::StepTag;

fn tag_style(tag: StepTag) -> Style {
    match tag {
        StepTag::Clone | StepTag::Pull => Style::new().blue(),
        StepTag::Venv => Style::new().magenta(),
        StepTag::Install => Style::new().cyan(),
        StepTag::Wrapper => Style::new().green(),
        StepTag::Cleanup | StepTag::Backup => Style::new().yellow(),
        StepTag::Complete => Style::new().green().bold(),
    }
}

/// Writes progress chunks with a tag prefix at the start of every line.
///
/// Chunks are not line-aligned, so the printer remembers whether it is in the
/// middle of a line and which step that line belongs to.
pub struct ProgressPrinter<W: Write = io::Stdout> {
    writer: W,
    open_line: Option<StepTag>,
}

impl ProgressPrinter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ProgressPrinter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            open_line: None,
        }
    }

    pub fn print(&mut self, event: &ProgressEvent) -> io::Result<()> {
        if let Some(open) = self.open_line
            && open != event.step
        {
            writeln!(self.writer)?;
            self.open_line = None;
        }

        for segment in event.data.split_inclusive('\n') {
            if self.open_line.is_none() {
                let prefix = format!("[{}]", event.step);
                write!(self.writer, "{} ", tag_style(event.step).apply_to(prefix))?;
            }
            write!(self.writer, "{segment}")?;
            self.open_line = (!segment.ends_with('\n')).then_some(event.step);
        }
        self.writer.flush()
    }

    /// Terminate a dangling partial line.
    pub fn finish(&mut self) -> io::Result<()> {
        if self.open_line.take().is_some() {
            writeln!(self.writer)?;
        }
        self.writer.flush()
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.writer
    }
}

/// Progress channel for one orchestration call, optionally printed live.
pub struct LiveProgress {
    channel: ProgressChannel,
    printer: Arc<Mutex<ProgressPrinter>>,
}

impl LiveProgress {
    pub fn new(show: bool) -> Self {
        let channel = ProgressChannel::new();
        let printer = Arc::new(Mutex::new(ProgressPrinter::stdout()));
        if show {
            let sink = Arc::clone(&printer);
            channel.subscribe(move |event| {
                let mut printer = sink.lock().unwrap_or_else(PoisonError::into_inner);
                let _ = printer.print(event);
            });
        }
        Self { channel, printer }
    }

    pub fn channel(&self) -> &ProgressChannel {
        &self.channel
    }

    pub fn finish(&self) -> io::Result<()> {
        self.printer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .finish()
    }
}

pub fn print_operation_result<W: Write>(writer: &mut W, result: &OperationResult) -> io::Result<()> {
    let marker = match result.status {
        OperationStatus::Success => style("✓").green(),
        OperationStatus::PartialSuccess => style("⚠").yellow(),
        OperationStatus::AlreadyExists => style("•").yellow(),
        OperationStatus::Failed => style("✗").red(),
    };
    writeln!(writer, "{marker} {}", result.message)?;
    if let Some(path) = &result.path {
        writeln!(writer, "  Launcher: {}", path.display())?;
    }
    Ok(())
}
