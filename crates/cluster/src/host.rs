//! The host daemon capability set.
//!
//! [`Host`] is the port every host-facing component depends on. The HTTP
//! adapter lives in the `host-client` crate; tests and alternative transports
//! implement the same trait without touching callers.
//!
//! ## Concurrency
//!
//! Implementations hold no mutable state between calls. Every call opens its
//! own request or stream, so one client may be shared by concurrent callers.
//!
//! Volumes get no mutual exclusion here: concurrent `create_snapshot`,
//! `pull_snapshot` and `destroy_volume` on the same volume id have whatever
//! semantics the host's storage backend defines.

use std::collections::HashMap;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;

use crate::{
    ActiveJob, AttachClient, AttachRequest, Event, EventScope, HostError, HostId,
    ImagePullRequest, JobId, ProviderId, PullInfo, Subscription, VolumeId, VolumeInfo,
};

/// Media type a source host must produce for [`Host::send_snapshot`].
pub const SNAPSHOT_STREAM_MEDIA_TYPE: &str = "application/vnd.zfs.snapshot-stream";

/// Raw snapshot bytes produced by [`Host::send_snapshot`].
pub type SnapshotStream = Pin<Box<dyn Stream<Item = Result<Bytes, HostError>> + Send>>;

/// Trust database contents uploaded with [`Host::pull_images`].
pub type TrustDatabase = Box<dyn AsyncRead + Send + Sync + Unpin>;

/// A client for one host daemon.
///
/// Every fallible operation fails with exactly one [`crate::ErrorKind`]:
/// `NotFound`, `Transport`, or `Application`. No operation retries internally.
#[async_trait]
pub trait Host: Send + Sync {
    /// Returns the id of the host this client talks to.
    fn id(&self) -> &HostId;

    /// Lists the jobs on the host, keyed by job id.
    async fn list_jobs(&self) -> Result<HashMap<JobId, ActiveJob>, HostError>;

    /// Fetches one job. Unknown ids fail with [`HostError::NotFound`].
    async fn get_job(&self, id: &JobId) -> Result<ActiveJob, HostError>;

    /// Asks the host to stop a job.
    ///
    /// Stopping an already-stopped job is decided by the daemon; callers
    /// should not treat that outcome as a hard failure.
    async fn stop_job(&self, id: &JobId) -> Result<(), HostError>;

    /// Streams job lifecycle events into `sink` until cancelled or the
    /// connection fails.
    async fn stream_events(
        &self,
        scope: EventScope,
        sink: mpsc::Sender<Event>,
    ) -> Result<Subscription, HostError>;

    /// Attaches to a job's I/O.
    ///
    /// With `wait == false` a job that has not started fails with
    /// [`HostError::JobNotRunning`].
    async fn attach(&self, req: &AttachRequest, wait: bool) -> Result<AttachClient, HostError>;

    /// Allocates a volume under `provider` (use [`ProviderId::default_provider`]
    /// when in doubt).
    async fn create_volume(&self, provider: &ProviderId) -> Result<VolumeInfo, HostError>;

    /// Releases a volume. Fails if the daemon considers it in use.
    async fn destroy_volume(&self, volume: &VolumeId) -> Result<(), HostError>;

    /// Takes a snapshot of `volume`; the result's parent is `volume`.
    async fn create_snapshot(&self, volume: &VolumeId) -> Result<VolumeInfo, HostError>;

    /// Asks this (receiving) host to pull `source_snapshot` from `source_host`
    /// into `receive_volume`, returning the new snapshot.
    ///
    /// The receiving daemon calls [`send_snapshot`](Self::send_snapshot) on the
    /// source itself. A missing source snapshot surfaces as `NotFound`, any
    /// other failure of the transfer as `Transport`. No partial state is cleaned
    /// up here; that is the storage backend's responsibility.
    async fn pull_snapshot(
        &self,
        receive_volume: &VolumeId,
        source_host: &HostId,
        source_snapshot: &VolumeId,
    ) -> Result<VolumeInfo, HostError>;

    /// Streams the raw contents of `snapshot` in the
    /// [`SNAPSHOT_STREAM_MEDIA_TYPE`] format.
    ///
    /// `assume_haves` describes data the receiver already holds; it is opaque
    /// here and interpreted only by the source's storage backend.
    async fn send_snapshot(
        &self,
        snapshot: &VolumeId,
        assume_haves: &[serde_json::Value],
    ) -> Result<SnapshotStream, HostError>;

    /// Pulls images onto the host, uploading `trust_db` for verification and
    /// streaming progress into `sink`.
    async fn pull_images(
        &self,
        req: &ImagePullRequest,
        trust_db: TrustDatabase,
        sink: mpsc::Sender<PullInfo>,
    ) -> Result<Subscription, HostError>;
}
