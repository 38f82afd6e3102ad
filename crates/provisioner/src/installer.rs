//! One complete provisioning run.

use std::sync::Arc;
use std::time::Duration;

use cluster::{
    CreateStackRequest, ImageId, ManifestSource, OnFailure, ProvisionError, ProvisionRunId,
    ProvisioningBackend, StackId, StackParameter,
};
use tracing::{info, instrument, Span};

use crate::config::InstallerConfig;
use crate::domain::generate_cluster_domain;
use crate::manifest::select_image;
use crate::progress::ProgressSink;
use crate::watcher::{StackWatcher, WatchOutcome};

/// Time the backend is given to create the stack.
pub const STACK_CREATE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Template parameter carrying the machine image.
pub const IMAGE_ID_PARAMETER: &str = "ImageId";

/// Template parameter carrying the generated cluster domain.
pub const CLUSTER_DOMAIN_PARAMETER: &str = "ClusterDomain";

/// Result of a run that reached a terminal stack status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    /// Correlation id recorded on the run's span.
    pub run_id: ProvisionRunId,
    /// Stack id returned by the backend.
    pub stack_id: StackId,
    /// Machine image the stack was created from.
    pub image_id: ImageId,
    /// Generated domain passed to the template.
    pub cluster_domain: String,
    /// How the event loop ended.
    pub watch: WatchOutcome,
}

/// Resolves an image, creates the stack and watches it to a terminal status.
pub struct Installer {
    config: InstallerConfig,
    backend: Arc<dyn ProvisioningBackend>,
    manifest: Arc<dyn ManifestSource>,
}

impl Installer {
    /// Creates an installer over the given backend and manifest source.
    pub fn new(
        config: InstallerConfig,
        backend: Arc<dyn ProvisioningBackend>,
        manifest: Arc<dyn ManifestSource>,
    ) -> Self {
        Self {
            config,
            backend,
            manifest,
        }
    }

    /// Validated configuration for this installer.
    pub fn config(&self) -> &InstallerConfig {
        &self.config
    }

    /// Builds the create request for `image` and `cluster_domain`.
    ///
    /// # Errors
    ///
    /// [`ProvisionError::Configuration`] when the template file cannot be read.
    pub async fn create_request(
        &self,
        image: &ImageId,
        cluster_domain: &str,
    ) -> Result<CreateStackRequest, ProvisionError> {
        let path = &self.config.template_path;
        let template_body = tokio::fs::read_to_string(path).await.map_err(|e| {
            ProvisionError::configuration(format!(
                "read stack template {}: {e}",
                path.display()
            ))
        })?;
        Ok(CreateStackRequest {
            stack_name: self.config.stack_name.clone(),
            template_body,
            parameters: vec![
                StackParameter::new(IMAGE_ID_PARAMETER, image.as_str()),
                StackParameter::new(CLUSTER_DOMAIN_PARAMETER, cluster_domain),
            ],
            on_failure: OnFailure::Rollback,
            timeout: STACK_CREATE_TIMEOUT,
        })
    }

    /// Runs the whole installation.
    ///
    /// The stack id is reported to `progress` as soon as the backend returns
    /// it, followed by one call per new stack event. A stack that rolled back
    /// is returned as `Ok` with [`cluster::RunState::Failed`].
    #[instrument(
        skip(self, progress),
        fields(
            run_id = tracing::field::Empty,
            region = %self.config.region,
            stack_name = %self.config.stack_name,
        )
    )]
    pub async fn run(
        &self,
        progress: &mut dyn ProgressSink,
    ) -> Result<InstallOutcome, ProvisionError> {
        let run_id = ProvisionRunId::new_random();
        Span::current().record("run_id", tracing::field::display(run_id));

        let image_id = select_image(self.manifest.as_ref(), &self.config.region).await?;
        let cluster_domain = generate_cluster_domain(&self.config.base_domain);
        let request = self.create_request(&image_id, &cluster_domain).await?;

        let stack_id = self.backend.create_stack(&request).await?;
        info!(%stack_id, %image_id, %cluster_domain, "stack creation started");
        progress.stack_created(&stack_id);

        let watch = StackWatcher::new(self.backend.as_ref(), stack_id.clone())
            .with_poll_interval(self.config.poll_interval)
            .run(progress)
            .await?;

        Ok(InstallOutcome {
            run_id,
            stack_id,
            image_id,
            cluster_domain,
            watch,
        })
    }
}
