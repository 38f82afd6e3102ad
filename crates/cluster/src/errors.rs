//! Error taxonomy and retry-policy types for the cluster control plane.
//!
//! [`HostError`] covers every failure a [`crate::Host`] call can produce and
//! [`ProvisionError`] covers the provisioning run. Both classify into exactly
//! one [`ErrorKind`] so callers can decide what to do without matching on
//! individual variants.
//!
//! [`RetryPolicy`] is a cross-cutting concern: no component in this workspace
//! retries on its own, but every error states whether a caller may.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{JobId, Region};

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// ## Rules
///
/// - `Retryable` errors: network failures, truncated or undecodable responses.
/// - `NonRetryable` errors: missing resources, configuration problems, and
///   requests the daemon or backend rejected on domain grounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    Retryable {
        /// Minimum back-off before the next attempt. `None` means the caller
        /// applies its own back-off schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried without operator involvement.
    NonRetryable,
}

/// Coarse classification shared by every error type in the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing or invalid startup input.
    Configuration,
    /// The requested resource is absent.
    NotFound,
    /// Network, protocol, or decoding failure.
    Transport,
    /// The remote side rejected the request with its own reason.
    Application,
}

// ---------------------------------------------------------------------------
// Host daemon errors
// ---------------------------------------------------------------------------

/// Errors returned by [`crate::Host`] operations and their streams.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum HostError {
    /// The host does not know the requested job, volume, or snapshot.
    ///
    /// Also produced when a snapshot pull fails because the source host does
    /// not have the requested snapshot.
    #[error("not found: {resource}")]
    NotFound {
        /// Request path or identifier that could not be resolved.
        resource: String,
    },

    /// Attach was requested without waiting and the job has not started yet.
    #[error("job {job} is not running")]
    JobNotRunning {
        /// The job that could not be attached to.
        job: JobId,
    },

    /// The request could not be delivered or its response could not be read.
    #[error("transport error during {operation}: {message}")]
    Transport {
        /// Short name of the operation that failed (e.g. `"GET /host/jobs"`).
        operation: String,
        /// Underlying failure description.
        message: String,
    },

    /// The daemon rejected the request. `message` is passed through verbatim.
    #[error("host error ({status}): {message}")]
    Application {
        /// HTTP status code returned by the daemon.
        status: u16,
        /// Reason reported by the daemon.
        message: String,
    },
}

impl HostError {
    /// Builds a [`HostError::Transport`] from any displayable failure.
    pub fn transport(operation: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Transport {
            operation: operation.into(),
            message: err.to_string(),
        }
    }

    /// Returns the taxonomy kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } | Self::JobNotRunning { .. } => ErrorKind::NotFound,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Application { .. } => ErrorKind::Application,
        }
    }

    /// Returns `true` for [`ErrorKind::NotFound`] errors.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Whether the caller may retry the failed call.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self.kind() {
            ErrorKind::Transport => RetryPolicy::Retryable { after: None },
            _ => RetryPolicy::NonRetryable,
        }
    }
}

// ---------------------------------------------------------------------------
// Provisioning errors
// ---------------------------------------------------------------------------

/// Errors that end a provisioning run.
///
/// None of these are retried by the installer; a transport failure while
/// watching events is fatal because partial history may already reflect
/// destructive actions in progress.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProvisionError {
    /// Startup configuration is missing or invalid.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// The image manifest lists no versions.
    #[error("no versions in image manifest")]
    EmptyManifest,

    /// The latest manifest version has no image for the target region.
    #[error("no image found for region {region}")]
    NoImage {
        /// Region that was searched for.
        region: Region,
    },

    /// The backend or manifest feed could not be reached or decoded.
    #[error("transport error during {operation}: {message}")]
    Transport {
        /// Short name of the operation that failed.
        operation: String,
        /// Underlying failure description.
        message: String,
    },

    /// The backend rejected the request. `message` is passed through verbatim.
    #[error("provisioning backend error: {message}")]
    Application {
        /// Reason reported by the backend.
        message: String,
    },
}

impl ProvisionError {
    /// Builds a [`ProvisionError::Configuration`].
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Builds a [`ProvisionError::Transport`] from any displayable failure.
    pub fn transport(operation: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Transport {
            operation: operation.into(),
            message: err.to_string(),
        }
    }

    /// Returns the taxonomy kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::EmptyManifest | Self::NoImage { .. } => ErrorKind::NotFound,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Application { .. } => ErrorKind::Application,
        }
    }

    /// Whether a caller may retry the failed operation.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self.kind() {
            ErrorKind::Transport => RetryPolicy::Retryable { after: None },
            _ => RetryPolicy::NonRetryable,
        }
    }
}

/// Returned when parsing an identifier from an empty string.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind} must not be empty")]
pub struct EmptyIdentifier {
    /// Name of the identifier type.
    pub kind: &'static str,
}
