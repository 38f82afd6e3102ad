//! Newtype domain identifiers.
//!
//! Every domain concept that has an identity is represented as a distinct newtype
//! wrapping a primitive. This prevents accidentally interchanging, for example, a
//! [`JobId`] with a [`VolumeId`] even though both are opaque strings on the wire.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display, FromStr.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = crate::errors::EmptyIdentifier;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s).ok_or(crate::errors::EmptyIdentifier {
                    kind: stringify!($name),
                })
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Host daemon identifiers
// ---------------------------------------------------------------------------

string_id! {
    /// Identifies one host daemon within the fleet.
    ///
    /// Bound to a [`crate::Host`] client at construction and used by receiving
    /// hosts to locate the source of a snapshot pull.
    HostId
}

string_id! {
    /// Identifies a job; unique within a single host.
    JobId
}

string_id! {
    /// Identifies a volume or a snapshot of one.
    ///
    /// Volumes and snapshots share one identifier space on a host, which is
    /// what lets a snapshot's parent refer to either.
    VolumeId
}

string_id! {
    /// Names a storage provider on a host (`"default"` is always present).
    ProviderId
}

impl ProviderId {
    /// The conventional provider every host exposes.
    pub fn default_provider() -> Self {
        Self("default".to_string())
    }
}

// ---------------------------------------------------------------------------
// Provisioning identifiers
// ---------------------------------------------------------------------------

string_id! {
    /// Identifier returned by the provisioning backend for a created stack.
    StackId
}

string_id! {
    /// Human-chosen stack name submitted with a create request.
    StackName
}

string_id! {
    /// Backend-assigned identifier of one stack event.
    ///
    /// Globally unique within a provisioning run; the same event may be
    /// delivered by more than one poll.
    StackEventId
}

string_id! {
    /// Cloud region name (e.g. `"us-east-1"`).
    Region
}

string_id! {
    /// Machine image identifier resolved from the image manifest.
    ImageId
}

// ---------------------------------------------------------------------------
// Run identifiers (UUID-backed, internally generated)
// ---------------------------------------------------------------------------

/// Identifies a single provisioning run (one invocation of the installer).
///
/// Generated fresh for every run; recorded on the run span so all activity
/// from a single run can be correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProvisionRunId(Uuid);

impl ProvisionRunId {
    /// Generates a new random run identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for ProvisionRunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
