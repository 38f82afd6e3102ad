//! `cluster-installer` entry point.
//!
//! This binary is the composition root. Responsibilities:
//!
//! 1. **Parse configuration**: flags, with credentials and the base cluster
//!    domain defaulting from the environment.
//! 2. **Wire observability**: `tracing-subscriber` to stderr plus an optional
//!    OpenTelemetry OTLP exporter.
//! 3. **Construct infrastructure**: `CloudFormationBackend` and
//!    `HttpManifestSource` for `provision`, `HttpHost` for `host`.
//! 4. **Report**: operator output on stdout, errors on stderr, non-zero exit
//!    on any failure or on a stack that rolled back.

use std::process::ExitCode;

use clap::Parser;

mod args;
mod host;
mod provision;
mod telemetry;

use args::{Cli, Command};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let telemetry = match telemetry::init(cli.log_format) {
        Ok(telemetry) => telemetry,
        Err(err) => {
            eprintln!("error: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Command::Provision(args) => provision::run(args).await,
        Command::Host(args) => host::run(args).await,
    };
    telemetry.shutdown();

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
