//! Validated installer configuration.
//!
//! Built once at startup and passed to the components that need it: the
//! credentials go to the backend adapter, the base domain to the domain
//! generator, the rest to the [`Installer`](crate::Installer).

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use cluster::{ProvisionError, Region, StackName};

use crate::watcher::DEFAULT_POLL_INTERVAL;

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_STACK_NAME: &str = "flynn";
pub const DEFAULT_TEMPLATE_PATH: &str = "stack-template.json";
pub const DEFAULT_MANIFEST_URL: &str = "https://dl.flynn.io/ec2/images.json";

/// Backend credential material.
///
/// Usable when either the key pair or the session token is present. Empty
/// strings count as absent.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// `AWS_ACCESS_KEY_ID`.
    pub access_key_id: Option<String>,
    /// `AWS_ACCESS_SECRET`.
    pub secret_access_key: Option<String>,
    /// `AWS_SECURITY_TOKEN`.
    pub session_token: Option<String>,
}

impl Credentials {
    /// Collects credential values, treating blank strings as absent.
    pub fn new(
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
        session_token: Option<String>,
    ) -> Self {
        Self {
            access_key_id: non_empty(access_key_id),
            secret_access_key: non_empty(secret_access_key),
            session_token: non_empty(session_token),
        }
    }

    /// Returns `true` if a key pair or a session token is present.
    pub fn is_usable(&self) -> bool {
        let key_pair = self.access_key_id.is_some() && self.secret_access_key.is_some();
        key_pair || self.session_token.is_some()
    }
}

// Secrets stay out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &self.secret_access_key.as_ref().map(|_| "***"))
            .field("session_token", &self.session_token.as_ref().map(|_| "***"))
            .finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Everything a provisioning run needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct InstallerConfig {
    /// Backend credentials.
    pub credentials: Credentials,
    /// Suffix appended to the random cluster-domain prefix.
    pub base_domain: String,
    /// Backend region; also selects the machine image.
    pub region: Region,
    /// Name given to the created stack.
    pub stack_name: StackName,
    /// File holding the stack template body.
    pub template_path: PathBuf,
    /// Where the release manifest is fetched from.
    pub manifest_url: String,
    /// Sleep between event poll cycles.
    pub poll_interval: Duration,
}

impl InstallerConfig {
    /// Validates the required inputs and fills in defaults for the rest.
    ///
    /// # Errors
    ///
    /// [`ProvisionError::Configuration`] when neither a key pair nor a session
    /// token is present, or when `base_domain` is blank.
    pub fn new(
        credentials: Credentials,
        base_domain: impl Into<String>,
    ) -> Result<Self, ProvisionError> {
        if !credentials.is_usable() {
            return Err(ProvisionError::configuration(
                "AWS_ACCESS_KEY_ID and AWS_ACCESS_SECRET or AWS_SECURITY_TOKEN must be set",
            ));
        }
        let base_domain = base_domain.into();
        if base_domain.trim().is_empty() {
            return Err(ProvisionError::configuration(
                "BASE_CLUSTER_DOMAIN is required",
            ));
        }
        Ok(Self {
            credentials,
            base_domain,
            region: Region::new(DEFAULT_REGION).ok_or_else(|| missing("region"))?,
            stack_name: StackName::new(DEFAULT_STACK_NAME).ok_or_else(|| missing("stack name"))?,
            template_path: PathBuf::from(DEFAULT_TEMPLATE_PATH),
            manifest_url: DEFAULT_MANIFEST_URL.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// Overrides the backend region.
    pub fn with_region(mut self, region: Region) -> Self {
        self.region = region;
        self
    }

    /// Overrides the stack name.
    pub fn with_stack_name(mut self, name: StackName) -> Self {
        self.stack_name = name;
        self
    }

    /// Overrides the path of the stack template file.
    pub fn with_template_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.template_path = path.into();
        self
    }

    /// Overrides the image manifest URL.
    pub fn with_manifest_url(mut self, url: impl Into<String>) -> Self {
        self.manifest_url = url.into();
        self
    }

    /// Overrides the sleep between event poll cycles.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

fn missing(what: &str) -> ProvisionError {
    ProvisionError::configuration(format!("{what} must not be empty"))
}
