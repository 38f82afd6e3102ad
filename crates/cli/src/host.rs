use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use cluster::{AttachFlags, AttachRequest, EventScope, Host, ImagePullRequest, Subscription};
use futures::TryStreamExt;
use host_client::HttpHost;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::info;

use crate::args::{HostArgs, HostCommand};

const STREAM_BUFFER: usize = 64;

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Prints every item as one JSON line until the stream ends or Ctrl-C.
async fn follow<T: Serialize>(
    subscription: Subscription,
    mut items: mpsc::Receiver<T>,
) -> anyhow::Result<()> {
    loop {
        tokio::select! {
            item = items.recv() => match item {
                Some(item) => println!("{}", serde_json::to_string(&item)?),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                subscription.cancel();
                break;
            }
        }
    }
    subscription.finish().await?;
    Ok(())
}

pub async fn run(args: HostArgs) -> anyhow::Result<ExitCode> {
    let mut host = HttpHost::new(args.id, args.addr, None)?;
    if let Some(secs) = args.timeout_secs {
        let timeout = (secs > 0).then(|| Duration::from_secs(secs));
        host = host.with_request_timeout(timeout);
    }

    match args.command {
        HostCommand::Jobs => print_json(&host.list_jobs().await?)?,
        HostCommand::Job { id } => print_json(&host.get_job(&id).await?)?,
        HostCommand::Stop { id } => {
            host.stop_job(&id).await?;
            info!(job = %id, "job stopped");
        }
        HostCommand::Events { scope } => {
            let scope = EventScope::parse(&scope).context("event scope must not be empty")?;
            let (tx, rx) = mpsc::channel(STREAM_BUFFER);
            let subscription = host.stream_events(scope, tx).await?;
            follow(subscription, rx).await?;
        }
        HostCommand::Attach { job, wait } => {
            let req = AttachRequest {
                job_id: job,
                flags: AttachFlags::output(),
                height: 0,
                width: 0,
            };
            let mut client = host.attach(&req, wait).await?;
            let mut stdout = tokio::io::stdout();
            let mut stderr = tokio::io::stderr();
            let status = client.receive(&mut stdout, &mut stderr).await?;
            stdout.flush().await?;
            stderr.flush().await?;
            info!(job = %req.job_id, status, "job exited");
            return Ok(ExitCode::from(u8::try_from(status).unwrap_or(1)));
        }
        HostCommand::CreateVolume { provider } => {
            print_json(&host.create_volume(&provider).await?)?
        }
        HostCommand::DestroyVolume { volume } => {
            host.destroy_volume(&volume).await?;
            info!(%volume, "volume destroyed");
        }
        HostCommand::Snapshot { volume } => print_json(&host.create_snapshot(&volume).await?)?,
        HostCommand::PullSnapshot {
            receive_volume,
            source_host,
            snapshot,
        } => print_json(
            &host
                .pull_snapshot(&receive_volume, &source_host, &snapshot)
                .await?,
        )?,
        HostCommand::SendSnapshot {
            snapshot,
            output,
            haves,
        } => {
            let haves = haves
                .iter()
                .map(|h| serde_json::from_str(h).with_context(|| format!("--have {h:?} is not JSON")))
                .collect::<anyhow::Result<Vec<serde_json::Value>>>()?;
            let mut stream = host.send_snapshot(&snapshot, &haves).await?;
            let mut file = tokio::fs::File::create(&output)
                .await
                .with_context(|| format!("create {}", output.display()))?;
            let mut written = 0u64;
            while let Some(chunk) = stream.try_next().await? {
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.flush().await?;
            info!(%snapshot, bytes = written, path = %output.display(), "snapshot saved");
        }
        HostCommand::PullImages {
            repository,
            driver,
            root,
            trust_db,
        } => {
            let file = tokio::fs::File::open(&trust_db)
                .await
                .with_context(|| format!("open trust database {}", trust_db.display()))?;
            let req = ImagePullRequest {
                repository,
                driver,
                root,
            };
            let (tx, rx) = mpsc::channel(STREAM_BUFFER);
            let subscription = host.pull_images(&req, Box::new(file), tx).await?;
            follow(subscription, rx).await?;
        }
    }
    Ok(ExitCode::SUCCESS)
}
