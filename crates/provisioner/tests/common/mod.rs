//! Scripted in-memory provisioning backend and progress recorder.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use cluster::{
    CreateStackRequest, EventPage, ProvisionError, ProvisioningBackend, StackEvent, StackEventId,
    StackId, STACK_RESOURCE_TYPE,
};
use provisioner::ProgressSink;

pub const STACK_ID: &str = "arn:aws:cloudformation:us-east-1:123:stack/flynn/abc";

/// Replies to `stack_events` calls with pre-recorded pages, in order.
#[derive(Default)]
pub struct ScriptedBackend {
    pages: Mutex<VecDeque<Result<EventPage, ProvisionError>>>,
    tokens: Mutex<Vec<Option<String>>>,
    created: Mutex<Vec<CreateStackRequest>>,
}

impl ScriptedBackend {
    pub fn new(pages: impl IntoIterator<Item = Result<EventPage, ProvisionError>>) -> Self {
        Self {
            pages: Mutex::new(pages.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Continuation tokens the watcher asked for, one per call.
    pub fn tokens(&self) -> Vec<Option<String>> {
        self.tokens.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.tokens.lock().unwrap().len()
    }

    pub fn created(&self) -> Vec<CreateStackRequest> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProvisioningBackend for ScriptedBackend {
    async fn create_stack(&self, req: &CreateStackRequest) -> Result<StackId, ProvisionError> {
        self.created.lock().unwrap().push(req.clone());
        Ok(StackId::new(STACK_ID).unwrap())
    }

    async fn stack_events(
        &self,
        stack: &StackId,
        next_token: Option<&str>,
    ) -> Result<EventPage, ProvisionError> {
        assert_eq!(stack.as_str(), STACK_ID);
        self.tokens
            .lock()
            .unwrap()
            .push(next_token.map(str::to_string));
        self.pages
            .lock()
            .unwrap()
            .pop_front()
            .expect("watcher polled past the end of the script")
    }
}

pub fn page(events: Vec<StackEvent>, next_token: Option<&str>) -> Result<EventPage, ProvisionError> {
    Ok(EventPage {
        events,
        next_token: next_token.map(str::to_string),
    })
}

pub fn stack(id: &str, status: &str) -> StackEvent {
    resource(id, STACK_RESOURCE_TYPE, status)
}

pub fn resource(id: &str, resource_type: &str, status: &str) -> StackEvent {
    StackEvent {
        event_id: StackEventId::new(id).unwrap(),
        resource_type: Some(resource_type.into()),
        resource_status: Some(status.into()),
        reason: None,
        timestamp: None,
    }
}

/// A top-level event recorded `second` seconds into the run.
pub fn stack_at(id: &str, status: &str, second: i64) -> StackEvent {
    StackEvent {
        timestamp: Utc.timestamp_opt(1_700_000_000 + second, 0).single(),
        ..stack(id, status)
    }
}

/// Records every progress callback.
#[derive(Debug, Default)]
pub struct Recorded {
    pub stacks: Vec<StackId>,
    pub events: Vec<String>,
}

impl ProgressSink for Recorded {
    fn stack_created(&mut self, stack: &StackId) {
        self.stacks.push(stack.clone());
    }

    fn stack_event(&mut self, event: &StackEvent) {
        self.events.push(event.event_id.to_string());
    }
}
