//! AWS CloudFormation provisioning backend.
//!
//! Implements [`cluster::ProvisioningBackend`] with the official SDK:
//! `CreateStack` for submission and `DescribeStackEvents` for the paginated
//! event feed.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** SDK types never cross this crate's boundary. Service
//! errors become [`cluster::ProvisionError::Application`] with the service's
//! code and message; connection, timeout and decoding failures become
//! [`cluster::ProvisionError::Transport`]. Nothing is retried here beyond what
//! the SDK's own retry layer does for a single call.

mod backend;

pub use backend::CloudFormationBackend;
