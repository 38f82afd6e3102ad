//! Deduplicated event history for one provisioning run.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use cluster::{is_terminal_status, RunState, StackEvent, StackEventId};

/// Every distinct stack event seen during a run, in acceptance order.
///
/// The backend may redeliver an event on any later poll and lists each page
/// newest first, so one page can carry a terminal stack event ahead of the
/// older in-progress one. Membership is therefore keyed by event id, and run
/// state follows the newest top-level event by backend timestamp rather than
/// by acceptance order.
#[derive(Debug, Default)]
pub struct EventHistory {
    seen: HashSet<StackEventId>,
    events: Vec<StackEvent>,
    stack_status: Option<String>,
    stack_timestamp: Option<DateTime<Utc>>,
}

impl EventHistory {
    /// Creates an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `event` unless its id was already seen.
    ///
    /// Returns the stored event when it is new, `None` for a duplicate.
    pub fn accept(&mut self, event: StackEvent) -> Option<&StackEvent> {
        if !self.seen.insert(event.event_id.clone()) {
            return None;
        }
        if event.is_stack_event() {
            if let Some(status) = &event.resource_status {
                if self.supersedes(status, event.timestamp) {
                    self.stack_status = Some(status.clone());
                    self.stack_timestamp = event.timestamp;
                }
            }
        }
        self.events.push(event);
        self.events.last()
    }

    /// Whether a top-level `status` recorded at `at` replaces the current one.
    ///
    /// A strictly newer timestamp wins; on a tie the terminal status wins.
    /// Without timestamps on both sides, a terminal status is never replaced.
    fn supersedes(&self, status: &str, at: Option<DateTime<Utc>>) -> bool {
        let Some(current) = self.stack_status.as_deref() else {
            return true;
        };
        match (self.stack_timestamp, at) {
            (Some(current_at), Some(at)) if at != current_at => at > current_at,
            (Some(_), Some(_)) => is_terminal_status(status) || !is_terminal_status(current),
            _ => !is_terminal_status(current),
        }
    }

    /// Latest status of the top-level stack resource.
    pub fn stack_status(&self) -> Option<&str> {
        self.stack_status.as_deref()
    }

    /// Run state derived from [`stack_status`](Self::stack_status).
    pub fn state(&self) -> RunState {
        RunState::from_status(self.stack_status())
    }

    /// Accepted events, in acceptance order.
    pub fn events(&self) -> &[StackEvent] {
        &self.events
    }

    /// Number of distinct events accepted so far.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns `true` before the first event is accepted.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
