//! Provisioning run orchestration.
//!
//! Resolves a machine image from the release manifest, submits a
//! create-stack request to the provisioning backend, then watches the
//! backend's event feed until the stack reaches a terminal status.
//!
//! ## Architectural Layer
//!
//! **Orchestration.** Works only against the [`cluster::ProvisioningBackend`]
//! and [`cluster::ManifestSource`] ports; the concrete backend is wired in by
//! the binary.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`config`] | `InstallerConfig`, `Credentials` and their validation |
//! | [`domain`] | Random cluster-domain generation |
//! | [`history`] | `EventHistory`: deduplicated stack events |
//! | [`watcher`] | `StackWatcher`: the poll/drain/terminate loop |
//! | [`progress`] | `ProgressSink` and the stdout line printer |
//! | [`manifest`] | `HttpManifestSource` and image selection |
//! | [`installer`] | `Installer`: one full run |
//!
//! ## Concurrency
//!
//! A run is a single sequential task. The event history is owned by the
//! watcher and never shared, so it needs no locking.

pub mod config;
pub mod domain;
pub mod history;
pub mod installer;
pub mod manifest;
pub mod progress;
pub mod watcher;

pub use config::{Credentials, InstallerConfig};
pub use domain::generate_cluster_domain;
pub use history::EventHistory;
pub use installer::{InstallOutcome, Installer};
pub use manifest::{select_image, HttpManifestSource};
pub use progress::{LineProgress, ProgressSink};
pub use watcher::{StackWatcher, WatchOutcome, DEFAULT_POLL_INTERVAL};
