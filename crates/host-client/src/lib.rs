//! Host daemon HTTP adapter.
//!
//! Implements the [`cluster::Host`] trait over the daemon's REST-style API
//! using `reqwest`. One [`HttpHost`] is bound to one host id and one base URL
//! for its whole lifetime and keeps no state between calls.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** URL layout, content negotiation, error-body decoding
//! and stream framing all live here. The [`cluster`] crate sees only
//! [`cluster::Host`].
//!
//! ## Snapshot replication
//!
//! [`cluster::Host::pull_snapshot`] is sent to the *receiving* host, which
//! fetches the data from the source host's `send` endpoint itself. The
//! receiving daemon's storage backend owns cleanup of a half-received
//! snapshot; this client never attempts it.

mod client;
mod lines;
mod transport;

pub use client::{HttpHost, ATTACH_PROTOCOL};
pub use transport::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT};
