//! Core domain for the cluster control plane.
//!
//! This crate contains the data model exchanged with host daemons and the
//! provisioning backend, the error taxonomy shared by every component, and the
//! port traits that infrastructure crates implement. It makes no network calls
//! itself.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`HostId`, `JobId`, `VolumeId`, `StackEventId`, etc.) |
//! | [`types`] | Host daemon data model (`ActiveJob`, `VolumeInfo`, `Event`, `PullInfo`, etc.) |
//! | [`errors`] | `HostError`, `ProvisionError`, `ErrorKind`, `RetryPolicy` |
//! | [`host`] | The [`Host`] capability trait |
//! | [`subscription`] | Cancellable stream handles |
//! | [`attach`] | The job attach byte protocol |
//! | [`provisioning`] | Stack events, run state, manifest types and backend ports |

pub mod attach;
pub mod errors;
pub mod host;
pub mod identifiers;
pub mod provisioning;
pub mod subscription;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use attach::{AttachClient, AttachIo};
pub use errors::{EmptyIdentifier, ErrorKind, HostError, ProvisionError, RetryPolicy};
pub use host::{Host, SnapshotStream, TrustDatabase, SNAPSHOT_STREAM_MEDIA_TYPE};
pub use identifiers::{
    HostId, ImageId, JobId, ProviderId, ProvisionRunId, Region, StackEventId, StackId, StackName,
    VolumeId,
};
pub use provisioning::{
    is_terminal_status, CreateStackRequest, EventPage, ImageManifest, ImageVersion,
    ManifestSource, OnFailure, ProvisioningBackend, RegionImage, RunState, StackEvent,
    StackParameter, CREATED_STATUS, STACK_RESOURCE_TYPE,
};
pub use subscription::Subscription;
pub use types::{
    ActiveJob, AttachFlags, AttachRequest, Event, EventKind, EventScope, ImagePullRequest,
    JobSpec, JobStatus, PullCoordinate, PullInfo, PullKind, PullStatus, VolumeInfo,
};
