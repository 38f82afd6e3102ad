//! The stack event reconciliation loop.

use std::time::Duration;

use cluster::{is_terminal_status, ProvisionError, ProvisioningBackend, RunState, StackId};
use tracing::{debug, info, instrument};

use crate::history::EventHistory;
use crate::progress::ProgressSink;

/// Interval between poll cycles used by the installer.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How a watched run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchOutcome {
    /// [`RunState::Complete`] or [`RunState::Failed`].
    pub state: RunState,
    /// The terminal top-level status string, e.g. `CREATE_COMPLETE`.
    pub final_status: String,
    /// Number of distinct events accepted during the run.
    pub events_seen: usize,
}

/// Polls one stack's event feed until its top-level status is terminal.
///
/// A poll cycle always starts from the first page and follows continuation
/// tokens until the backend returns none, so the terminate/sleep decision is
/// made only after the newest page has been merged. Any backend failure ends
/// the run immediately; nothing is retried.
pub struct StackWatcher<'a> {
    backend: &'a dyn ProvisioningBackend,
    stack: StackId,
    history: EventHistory,
    poll_interval: Duration,
}

impl<'a> StackWatcher<'a> {
    /// Watches `stack` with an empty history and the default poll interval.
    pub fn new(backend: &'a dyn ProvisioningBackend, stack: StackId) -> Self {
        Self {
            backend,
            stack,
            history: EventHistory::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Sets the sleep between cycles.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Events accepted so far.
    pub fn history(&self) -> &EventHistory {
        &self.history
    }

    /// Runs one poll cycle, draining every page.
    ///
    /// Returns the number of newly accepted events.
    pub async fn poll_cycle(
        &mut self,
        progress: &mut dyn ProgressSink,
    ) -> Result<usize, ProvisionError> {
        let mut accepted = 0;
        let mut token: Option<String> = None;
        let mut pages = 0usize;
        loop {
            let page = self
                .backend
                .stack_events(&self.stack, token.as_deref())
                .await?;
            pages += 1;
            for event in page.events {
                if let Some(event) = self.history.accept(event) {
                    accepted += 1;
                    progress.stack_event(event);
                }
            }
            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        debug!(stack = %self.stack, pages, accepted, "poll cycle drained");
        Ok(accepted)
    }

    /// Polls until the top-level status ends with `_COMPLETE`.
    #[instrument(skip(self, progress), fields(stack = %self.stack))]
    pub async fn run(
        mut self,
        progress: &mut dyn ProgressSink,
    ) -> Result<WatchOutcome, ProvisionError> {
        loop {
            self.poll_cycle(progress).await?;
            if let Some(status) = self.history.stack_status() {
                if is_terminal_status(status) {
                    let outcome = WatchOutcome {
                        state: self.history.state(),
                        final_status: status.to_string(),
                        events_seen: self.history.len(),
                    };
                    info!(
                        state = ?outcome.state,
                        status = %outcome.final_status,
                        events = outcome.events_seen,
                        "stack reached a terminal status"
                    );
                    return Ok(outcome);
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
