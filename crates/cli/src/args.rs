use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use cluster::{HostId, JobId, ProviderId, VolumeId};
use provisioner::config::{
    DEFAULT_MANIFEST_URL, DEFAULT_REGION, DEFAULT_STACK_NAME, DEFAULT_TEMPLATE_PATH,
};

#[derive(Parser, Debug)]
#[command(
    name = "cluster-installer",
    version,
    about = "Provision cluster infrastructure and operate host daemons"
)]
pub struct Cli {
    /// Log output format on stderr. Filtering follows RUST_LOG (default `info`).
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the cluster stack and follow it to a terminal status.
    Provision(ProvisionArgs),
    /// Run one operation against a host daemon.
    Host(HostArgs),
}

#[derive(Args, Debug)]
pub struct ProvisionArgs {
    #[arg(long, env = "AWS_ACCESS_KEY_ID", hide_env_values = true)]
    pub access_key_id: Option<String>,

    #[arg(long, env = "AWS_ACCESS_SECRET", hide_env_values = true)]
    pub secret_access_key: Option<String>,

    #[arg(long, env = "AWS_SECURITY_TOKEN", hide_env_values = true)]
    pub session_token: Option<String>,

    /// Appended to a random prefix to form the cluster domain.
    #[arg(long, env = "BASE_CLUSTER_DOMAIN")]
    pub base_domain: Option<String>,

    #[arg(long, default_value = DEFAULT_REGION)]
    pub region: String,

    #[arg(long, default_value = DEFAULT_STACK_NAME)]
    pub stack_name: String,

    /// Stack template file.
    #[arg(long, default_value = DEFAULT_TEMPLATE_PATH)]
    pub template: PathBuf,

    /// Release image manifest.
    #[arg(long, default_value = DEFAULT_MANIFEST_URL)]
    pub manifest_url: String,

    /// Sleep between stack event polls.
    #[arg(long, default_value_t = 1000)]
    pub poll_interval_ms: u64,
}

#[derive(Args, Debug)]
pub struct HostArgs {
    /// Host id the daemon is known by.
    #[arg(long, env = "HOST_ID")]
    pub id: HostId,

    /// Daemon base URL, e.g. `http://10.0.0.5:1113`.
    #[arg(long, env = "HOST_ADDR")]
    pub addr: String,

    /// Per-request timeout for unary calls; 0 disables it.
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    #[command(subcommand)]
    pub command: HostCommand,
}

#[derive(Subcommand, Debug)]
pub enum HostCommand {
    /// List jobs on the host.
    Jobs,
    /// Show one job.
    Job { id: JobId },
    /// Stop a job.
    Stop { id: JobId },
    /// Follow job events; `all` follows every job.
    Events {
        #[arg(default_value = "all")]
        scope: String,
    },
    /// Attach to a job's output and exit with its status.
    Attach {
        job: JobId,
        /// Wait for a job that has not started yet.
        #[arg(long)]
        wait: bool,
    },
    /// Create a volume.
    CreateVolume {
        #[arg(long, default_value = "default")]
        provider: ProviderId,
    },
    /// Destroy a volume.
    DestroyVolume { volume: VolumeId },
    /// Snapshot a volume.
    Snapshot { volume: VolumeId },
    /// Make this host pull a snapshot from another host into a volume.
    PullSnapshot {
        receive_volume: VolumeId,
        source_host: HostId,
        snapshot: VolumeId,
    },
    /// Save a snapshot stream from this host to a file.
    SendSnapshot {
        snapshot: VolumeId,
        #[arg(long)]
        output: PathBuf,
        /// JSON descriptor of data the receiver already has; repeatable.
        #[arg(long = "have")]
        haves: Vec<String>,
    },
    /// Pull images onto the host, uploading a trust database.
    PullImages {
        #[arg(long)]
        repository: String,
        #[arg(long)]
        driver: String,
        #[arg(long)]
        root: String,
        #[arg(long)]
        trust_db: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn provision_defaults() {
        let cli = Cli::try_parse_from(["cluster-installer", "provision"]).unwrap();
        let Command::Provision(args) = cli.command else {
            panic!("expected provision");
        };
        assert_eq!(args.stack_name, "flynn");
        assert_eq!(args.template, PathBuf::from("stack-template.json"));
        assert_eq!(args.poll_interval_ms, 1000);
    }

    #[test]
    fn host_identifiers_must_not_be_empty() {
        let parsed = Cli::try_parse_from([
            "cluster-installer",
            "host",
            "--id",
            "host-a",
            "--addr",
            "http://127.0.0.1:1113",
            "job",
            "",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn pull_snapshot_takes_three_coordinates() {
        let cli = Cli::try_parse_from([
            "cluster-installer",
            "host",
            "--id",
            "host-b",
            "--addr",
            "http://10.0.0.6:1113",
            "pull-snapshot",
            "recv-1",
            "host-a",
            "snap-x",
        ])
        .unwrap();
        let Command::Host(args) = cli.command else {
            panic!("expected host");
        };
        assert!(matches!(
            args.command,
            HostCommand::PullSnapshot { ref source_host, .. } if source_host.as_str() == "host-a"
        ));
    }
}
