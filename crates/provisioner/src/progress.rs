//! Operator-facing progress output.

use std::io::Write;

use cluster::{StackEvent, StackId};

/// Receives the human-readable milestones of a provisioning run.
///
/// Called once per newly accepted event, as soon as it is accepted, so the
/// operator sees progress without delay.
pub trait ProgressSink: Send {
    /// The backend accepted the create request.
    fn stack_created(&mut self, stack: &StackId);

    /// A new event was accepted into the run history.
    fn stack_event(&mut self, event: &StackEvent);
}

/// Writes progress lines to any [`Write`] target, flushing after each one.
///
/// Events print as `ResourceType ResourceStatus`, followed by the reason on a
/// tab-indented line when the backend supplied one. Events missing either the
/// type or the status print nothing.
#[derive(Debug)]
pub struct LineProgress<W> {
    out: W,
}

impl<W: Write + Send> LineProgress<W> {
    /// Prints to `out`.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, line: std::fmt::Arguments<'_>) {
        // A closed stdout must not abort provisioning.
        if let Err(err) = writeln!(self.out, "{line}").and_then(|()| self.out.flush()) {
            tracing::warn!(error = %err, "failed to write progress line");
        }
    }
}

impl LineProgress<std::io::Stdout> {
    /// Progress on standard output.
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> ProgressSink for LineProgress<W> {
    fn stack_created(&mut self, stack: &StackId) {
        self.emit(format_args!("{stack}"));
    }

    fn stack_event(&mut self, event: &StackEvent) {
        let (Some(resource_type), Some(status)) = (&event.resource_type, &event.resource_status)
        else {
            return;
        };
        self.emit(format_args!("{resource_type} {status}"));
        if let Some(reason) = &event.reason {
            self.emit(format_args!("\t{reason}"));
        }
    }
}
