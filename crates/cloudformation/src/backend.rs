use async_trait::async_trait;
use chrono::{DateTime, Utc};
use aws_sdk_cloudformation::config::{BehaviorVersion, Credentials as SdkCredentials, Region as SdkRegion};
use aws_sdk_cloudformation::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_cloudformation::primitives::DateTime as SdkDateTime;
use aws_sdk_cloudformation::types;
use aws_sdk_cloudformation::{Client, Config};
use cluster::{
    CreateStackRequest, EventPage, OnFailure, ProvisionError, ProvisioningBackend, Region,
    StackEvent, StackEventId, StackId,
};
use provisioner::Credentials;
use tracing::{debug, instrument, warn};

const PROVIDER_NAME: &str = "cluster-installer";

/// [`ProvisioningBackend`] backed by CloudFormation in one region.
#[derive(Debug, Clone)]
pub struct CloudFormationBackend {
    client: Client,
}

impl CloudFormationBackend {
    /// Builds a client for `region` using static credentials.
    pub fn new(credentials: &Credentials, region: &Region) -> Self {
        let config = Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(SdkRegion::new(region.as_str().to_string()))
            .credentials_provider(sdk_credentials(credentials))
            .build();
        Self::from_client(Client::from_conf(config))
    }

    /// Wraps an already configured SDK client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

fn sdk_credentials(credentials: &Credentials) -> SdkCredentials {
    SdkCredentials::new(
        credentials.access_key_id.clone().unwrap_or_default(),
        credentials.secret_access_key.clone().unwrap_or_default(),
        credentials.session_token.clone(),
        None,
        PROVIDER_NAME,
    )
}

fn on_failure(value: OnFailure) -> types::OnFailure {
    match value {
        OnFailure::Rollback => types::OnFailure::Rollback,
        OnFailure::DoNothing => types::OnFailure::DoNothing,
    }
}

/// Converts an SDK event; events without an id cannot be deduplicated and are dropped.
fn stack_event(event: &types::StackEvent) -> Option<StackEvent> {
    let event_id: Option<&str> = event.event_id().into();
    let Some(event_id) = event_id.and_then(StackEventId::new) else {
        warn!("dropping stack event without an id");
        return None;
    };
    Some(StackEvent {
        event_id,
        resource_type: event.resource_type().map(str::to_string),
        resource_status: event.resource_status().map(|s| s.as_str().to_string()),
        reason: event.resource_status_reason().map(str::to_string),
        timestamp: event_time(event),
    })
}

fn event_time(event: &types::StackEvent) -> Option<DateTime<Utc>> {
    let at: Option<&SdkDateTime> = event.timestamp().into();
    at.and_then(|at| DateTime::from_timestamp(at.secs(), at.subsec_nanos()))
}

/// Service errors carry the backend's reason and are passed through; anything
/// else (connect, timeout, response decoding) is a transport failure.
fn classify<E, R>(operation: &str, err: SdkError<E, R>) -> ProvisionError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    if let Some(service) = err.as_service_error() {
        let code = service.code().unwrap_or("Unknown");
        let message = service.message().unwrap_or_default();
        return ProvisionError::Application {
            message: format!("{code}: {message}"),
        };
    }
    ProvisionError::transport(operation, DisplayErrorContext(&err))
}

#[async_trait]
impl ProvisioningBackend for CloudFormationBackend {
    #[instrument(skip(self, req), fields(stack_name = %req.stack_name))]
    async fn create_stack(&self, req: &CreateStackRequest) -> Result<StackId, ProvisionError> {
        let parameters = req
            .parameters
            .iter()
            .map(|p| {
                types::Parameter::builder()
                    .parameter_key(&p.key)
                    .parameter_value(&p.value)
                    .build()
            })
            .collect();
        let timeout_minutes = i32::try_from(req.timeout.as_secs().div_ceil(60)).unwrap_or(i32::MAX);
        let output = self
            .client
            .create_stack()
            .stack_name(req.stack_name.as_str())
            .template_body(&req.template_body)
            .on_failure(on_failure(req.on_failure))
            .timeout_in_minutes(timeout_minutes)
            .set_parameters(Some(parameters))
            .send()
            .await
            .map_err(|e| classify("create stack", e))?;
        let stack_id: Option<&str> = output.stack_id().into();
        stack_id
            .and_then(StackId::new)
            .ok_or_else(|| ProvisionError::transport("create stack", "response carried no stack id"))
    }

    async fn stack_events(
        &self,
        stack: &StackId,
        next_token: Option<&str>,
    ) -> Result<EventPage, ProvisionError> {
        let output = self
            .client
            .describe_stack_events()
            .stack_name(stack.as_str())
            .set_next_token(next_token.map(str::to_string))
            .send()
            .await
            .map_err(|e| classify("describe stack events", e))?;
        let events: Vec<StackEvent> = output.stack_events().iter().filter_map(stack_event).collect();
        debug!(%stack, events = events.len(), more = output.next_token().is_some(), "event page");
        Ok(EventPage {
            events,
            next_token: output.next_token().map(str::to_string),
        })
    }
}
