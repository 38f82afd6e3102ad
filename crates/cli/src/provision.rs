use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use cloudformation::CloudFormationBackend;
use cluster::{Region, RunState, StackName};
use provisioner::{Credentials, HttpManifestSource, InstallerConfig, Installer, LineProgress};
use tracing::{error, info};

use crate::args::ProvisionArgs;

const MANIFEST_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const MANIFEST_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub async fn run(args: ProvisionArgs) -> anyhow::Result<ExitCode> {
    let credentials = Credentials::new(
        args.access_key_id,
        args.secret_access_key,
        args.session_token,
    );
    let config = InstallerConfig::new(credentials, args.base_domain.unwrap_or_default())?
        .with_region(Region::new(args.region).context("--region must not be empty")?)
        .with_stack_name(StackName::new(args.stack_name).context("--stack-name must not be empty")?)
        .with_template_path(args.template)
        .with_manifest_url(args.manifest_url)
        .with_poll_interval(Duration::from_millis(args.poll_interval_ms));

    let http = reqwest::Client::builder()
        .connect_timeout(MANIFEST_CONNECT_TIMEOUT)
        .timeout(MANIFEST_REQUEST_TIMEOUT)
        .build()
        .context("build http client")?;
    let manifest = Arc::new(HttpManifestSource::new(config.manifest_url.clone(), http));
    let backend = Arc::new(CloudFormationBackend::new(
        &config.credentials,
        &config.region,
    ));
    let installer = Installer::new(config, backend, manifest);

    let outcome = installer.run(&mut LineProgress::stdout()).await?;
    match outcome.watch.state {
        RunState::Complete => {
            info!(
                run_id = %outcome.run_id,
                stack_id = %outcome.stack_id,
                cluster_domain = %outcome.cluster_domain,
                "cluster stack created"
            );
            Ok(ExitCode::SUCCESS)
        }
        state => {
            error!(
                run_id = %outcome.run_id,
                stack_id = %outcome.stack_id,
                ?state,
                status = %outcome.watch.final_status,
                "cluster stack was not created"
            );
            Ok(ExitCode::FAILURE)
        }
    }
}
