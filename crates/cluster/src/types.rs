//! Host daemon data model.
//!
//! These are the JSON shapes exchanged with a host daemon. They are immutable
//! snapshots: a value reflects the daemon's state at the time it was fetched
//! and is never updated in place.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{HostId, JobId, ProviderId, VolumeId};

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

/// Lifecycle status of a job on a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// The container is being created.
    Starting,
    /// The job's process is running.
    Running,
    /// The job exited on its own.
    Done,
    /// The job exited with a non-zero status.
    Crashed,
    /// The job could not be started.
    Failed,
}

impl JobStatus {
    /// Returns `true` once the job can no longer produce output.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Crashed | Self::Failed)
    }
}

/// The definition a job was started from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Job identifier, unique within the host.
    pub id: JobId,

    /// Free-form key/value labels attached by whoever scheduled the job.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,

    /// Command line the job runs, when one was given.
    #[serde(default)]
    pub cmd: Vec<String>,
}

/// A unit of work running (or recently run) on a host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveJob {
    /// The job definition.
    pub job: JobSpec,

    /// Host the job was placed on.
    pub host_id: HostId,

    /// Current lifecycle status.
    pub status: JobStatus,

    /// When the job's process started.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,

    /// When the job's process ended.
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,

    /// Exit status once the job is done or crashed.
    #[serde(default)]
    pub exit_status: Option<i32>,

    /// Daemon-reported start failure.
    #[serde(default)]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Job events
// ---------------------------------------------------------------------------

/// Which jobs an event subscription covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventScope {
    /// Every job on the host.
    All,
    /// A single job.
    Job(JobId),
}

impl EventScope {
    /// Parses the conventional `"all"` selector or a single job id.
    ///
    /// Returns `None` for an empty string.
    pub fn parse(value: &str) -> Option<Self> {
        if value == "all" {
            Some(Self::All)
        } else {
            JobId::new(value).map(Self::Job)
        }
    }
}

impl std::fmt::Display for EventScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Job(id) => write!(f, "{id}"),
        }
    }
}

/// Kind of lifecycle transition an [`Event`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// The job was created on the host.
    Create,
    /// The job's process started.
    Start,
    /// The job's process stopped.
    Stop,
    /// The job failed to start or crashed.
    Error,
    /// Any transition this client does not know about.
    #[serde(other)]
    Unknown,
}

/// A job lifecycle notification.
///
/// Delivered at least once per subscriber. Ordering holds within one
/// subscription but not across subscriptions or distinct jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// The transition being reported.
    pub event: EventKind,

    /// Job the event concerns.
    pub job_id: JobId,

    /// Job state as of the event, when the daemon includes it.
    #[serde(default)]
    pub job: Option<ActiveJob>,
}

// ---------------------------------------------------------------------------
// Attach
// ---------------------------------------------------------------------------

/// Request to attach to a job's I/O.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachRequest {
    /// Job to attach to.
    pub job_id: JobId,

    /// Which streams to attach.
    pub flags: AttachFlags,

    /// Terminal height for TTY jobs.
    #[serde(default)]
    pub height: u16,

    /// Terminal width for TTY jobs.
    #[serde(default)]
    pub width: u16,
}

/// Stream selection for an [`AttachRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AttachFlags {
    /// Forward stdin frames to the job.
    pub stdin: bool,
    /// Receive stdout frames.
    pub stdout: bool,
    /// Receive stderr frames.
    pub stderr: bool,
    /// Replay output produced before the attach.
    pub logs: bool,
    /// Keep receiving output until the job exits.
    pub stream: bool,
}

impl AttachFlags {
    /// Stdout, stderr and live streaming; the usual log-tailing selection.
    pub fn output() -> Self {
        Self {
            stdout: true,
            stderr: true,
            stream: true,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Volumes and snapshots
// ---------------------------------------------------------------------------

/// A storage volume or a point-in-time snapshot of one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeInfo {
    /// Volume or snapshot identifier.
    pub id: VolumeId,

    /// Storage provider that owns the volume.
    pub provider_id: ProviderId,

    /// For snapshots: the volume or snapshot this one was taken from, on the
    /// same host or on the host it was pulled from.
    #[serde(default)]
    pub parent_id: Option<VolumeId>,

    /// Creation time reported by the daemon.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl VolumeInfo {
    /// Returns `true` if this is a snapshot (it has a parent).
    pub fn is_snapshot(&self) -> bool {
        self.parent_id.is_some()
    }
}

/// Source of a cross-host snapshot pull.
///
/// Opaque to the transport; only the receiving host interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PullCoordinate {
    /// Host that holds the snapshot.
    pub host_id: HostId,
    /// Snapshot to transfer.
    pub snapshot_id: VolumeId,
}

// ---------------------------------------------------------------------------
// Image pulls
// ---------------------------------------------------------------------------

/// Parameters of an image pull on a host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePullRequest {
    /// Image repository URL.
    pub repository: String,
    /// Storage driver that receives the layers.
    pub driver: String,
    /// Root directory of the driver's image store.
    pub root: String,
}

/// Whether a [`PullInfo`] concerns a whole image or one layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullKind {
    /// A complete image manifest.
    Image,
    /// A single filesystem layer.
    Layer,
}

/// Progress status of one pulled item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullStatus {
    /// Already present on the host; nothing transferred.
    Exists,
    /// Transfer started.
    Downloading,
    /// Transfer finished and verified against the trust database.
    Downloaded,
}

/// Progress notice for an image-layer pull. Stream-only, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullInfo {
    /// Repository being pulled from.
    pub repo: String,
    /// Image or layer.
    #[serde(rename = "type")]
    pub kind: PullKind,
    /// Image or layer identifier.
    pub id: String,
    /// Progress status.
    pub status: PullStatus,
}
