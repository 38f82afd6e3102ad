//! Provisioning backend and image manifest ports.
//!
//! The backend creates a stack from a template and reports progress as a
//! paginated, eventually-consistent feed of [`StackEvent`]s. The manifest
//! source lists machine images per release version.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ImageId, ProvisionError, Region, StackEventId, StackId, StackName};

/// Resource type of the top-level stack; only its events change run state.
pub const STACK_RESOURCE_TYPE: &str = "AWS::CloudFormation::Stack";

/// Top-level status of a successfully created stack.
pub const CREATED_STATUS: &str = "CREATE_COMPLETE";

// ---------------------------------------------------------------------------
// Stack creation
// ---------------------------------------------------------------------------

/// What the backend does with a stack whose creation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OnFailure {
    /// Delete the resources created so far.
    Rollback,
    /// Leave the failed resources in place.
    DoNothing,
}

/// A typed template parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackParameter {
    /// Parameter name declared in the template.
    pub key: String,
    /// Value supplied for this run.
    pub value: String,
}

impl StackParameter {
    /// Creates a parameter.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A request to create a named stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateStackRequest {
    /// Stack name.
    pub stack_name: StackName,
    /// Template document, passed through untouched.
    pub template_body: String,
    /// Template parameters.
    pub parameters: Vec<StackParameter>,
    /// Failure handling.
    pub on_failure: OnFailure,
    /// Time the backend allows for creation before failing it.
    pub timeout: Duration,
}

// ---------------------------------------------------------------------------
// Stack events
// ---------------------------------------------------------------------------

/// A provisioning-backend notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackEvent {
    /// Unique per run; may be delivered more than once.
    pub event_id: StackEventId,
    /// Resource type, e.g. `AWS::EC2::Instance`.
    pub resource_type: Option<String>,
    /// Resource status, e.g. `CREATE_IN_PROGRESS`.
    pub resource_status: Option<String>,
    /// Human-readable explanation attached by the backend.
    pub reason: Option<String>,
    /// When the backend recorded the event. Pages list events newest first,
    /// so this, not delivery order, decides which status is current.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl StackEvent {
    /// Returns `true` if the event describes the top-level stack resource.
    pub fn is_stack_event(&self) -> bool {
        self.resource_type.as_deref() == Some(STACK_RESOURCE_TYPE)
    }
}

/// One page of the event feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventPage {
    /// Events on this page, in backend order.
    pub events: Vec<StackEvent>,
    /// Continuation token for the next page, if any.
    pub next_token: Option<String>,
}

/// State of one provisioning run, derived from the latest top-level status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunState {
    /// No top-level event seen yet.
    Pending,
    /// The stack is still changing.
    InProgress,
    /// Terminal; the stack was created.
    Complete,
    /// Terminal; the stack ended in any state other than created.
    Failed,
}

impl RunState {
    /// Classifies a top-level resource status string.
    ///
    /// A status is terminal exactly when it ends with `_COMPLETE`. Only
    /// [`CREATED_STATUS`] counts as success; `ROLLBACK_COMPLETE`,
    /// `DELETE_COMPLETE` and the like are failures of a create run.
    pub fn from_status(status: Option<&str>) -> Self {
        match status {
            None | Some("") => Self::Pending,
            Some(CREATED_STATUS) => Self::Complete,
            Some(s) if is_terminal_status(s) => Self::Failed,
            Some(_) => Self::InProgress,
        }
    }

    /// Returns `true` for [`Complete`](Self::Complete) and [`Failed`](Self::Failed).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

/// The loop's termination predicate: the status ends with `_COMPLETE`.
pub fn is_terminal_status(status: &str) -> bool {
    status.ends_with("_COMPLETE")
}

/// The provisioning backend.
#[async_trait]
pub trait ProvisioningBackend: Send + Sync {
    /// Submits a create-stack request and returns the new stack's id.
    async fn create_stack(&self, req: &CreateStackRequest) -> Result<StackId, ProvisionError>;

    /// Fetches one page of events for `stack`, starting at `next_token`.
    async fn stack_events(
        &self,
        stack: &StackId,
        next_token: Option<&str>,
    ) -> Result<EventPage, ProvisionError>;
}

// ---------------------------------------------------------------------------
// Image manifest
// ---------------------------------------------------------------------------

/// An image built for one region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionImage {
    /// Region the image is registered in.
    pub region: Region,
    /// Image identifier.
    pub id: ImageId,
}

/// One released version and its images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageVersion {
    /// Release version string.
    #[serde(default)]
    pub version: Option<String>,
    /// Per-region images.
    #[serde(default)]
    pub images: Vec<RegionImage>,
}

impl ImageVersion {
    /// Returns the first image registered for `region`.
    pub fn image_for(&self, region: &Region) -> Result<ImageId, ProvisionError> {
        self.images
            .iter()
            .find(|image| &image.region == region)
            .map(|image| image.id.clone())
            .ok_or_else(|| ProvisionError::NoImage {
                region: region.clone(),
            })
    }
}

/// The release manifest document; newest version first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageManifest {
    /// Released versions.
    #[serde(default)]
    pub versions: Vec<ImageVersion>,
}

impl ImageManifest {
    /// Returns the first listed version.
    pub fn latest(&self) -> Result<&ImageVersion, ProvisionError> {
        self.versions.first().ok_or(ProvisionError::EmptyManifest)
    }
}

/// Source of the image manifest.
#[async_trait]
pub trait ManifestSource: Send + Sync {
    /// Fetches the current manifest.
    async fn fetch_manifest(&self) -> Result<ImageManifest, ProvisionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn termination_predicate_matches_complete_suffix_only() {
        assert!(is_terminal_status("CREATE_COMPLETE"));
        assert!(is_terminal_status("ROLLBACK_COMPLETE"));
        assert!(!is_terminal_status("CREATE_IN_PROGRESS"));
        assert!(!is_terminal_status("CREATE_COMPLETE_CLEANUP"));
        assert!(!is_terminal_status("ROLLBACK_FAILED"));
    }

    #[test]
    fn run_state_distinguishes_rollback() {
        assert_eq!(RunState::from_status(None), RunState::Pending);
        assert_eq!(
            RunState::from_status(Some("CREATE_IN_PROGRESS")),
            RunState::InProgress
        );
        assert_eq!(
            RunState::from_status(Some("CREATE_COMPLETE")),
            RunState::Complete
        );
        assert_eq!(
            RunState::from_status(Some("ROLLBACK_COMPLETE")),
            RunState::Failed
        );
        assert!(RunState::Failed.is_terminal());
        assert!(!RunState::InProgress.is_terminal());
    }

    #[test]
    fn stack_deleted_during_create_is_a_failure() {
        assert_eq!(
            RunState::from_status(Some("DELETE_COMPLETE")),
            RunState::Failed
        );
        assert_eq!(
            RunState::from_status(Some("UPDATE_ROLLBACK_COMPLETE")),
            RunState::Failed
        );
        assert_eq!(
            RunState::from_status(Some("DELETE_IN_PROGRESS")),
            RunState::InProgress
        );
    }

    #[test]
    fn image_selection_uses_first_version() {
        let manifest: ImageManifest = serde_json::from_str(
            r#"{"versions":[
                {"version":"v2","images":[{"region":"us-east-1","id":"ami-1"}]},
                {"version":"v1","images":[{"region":"eu-west-1","id":"ami-0"}]}
            ]}"#,
        )
        .unwrap();
        let latest = manifest.latest().unwrap();

        assert_eq!(
            latest.image_for(&Region::new("us-east-1").unwrap()).unwrap(),
            ImageId::new("ami-1").unwrap()
        );
        let err = latest
            .image_for(&Region::new("eu-west-1").unwrap())
            .unwrap_err();
        assert_eq!(err.to_string(), "no image found for region eu-west-1");
    }

    #[test]
    fn empty_manifest_has_no_latest_version() {
        assert_eq!(
            ImageManifest::default().latest().unwrap_err(),
            ProvisionError::EmptyManifest
        );
    }

    #[test]
    fn stack_events_are_recognised_by_resource_type() {
        let event = StackEvent {
            event_id: StackEventId::new("e1").unwrap(),
            resource_type: Some(STACK_RESOURCE_TYPE.into()),
            resource_status: Some("CREATE_IN_PROGRESS".into()),
            reason: None,
            timestamp: None,
        };
        assert!(event.is_stack_event());
    }
}
