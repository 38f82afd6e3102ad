//! Installer runs against a scripted backend and a mocked manifest feed.

mod common;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cluster::{
    ErrorKind, ImageManifest, ManifestSource, OnFailure, ProvisionError, Region, RunState,
    StackParameter,
};
use common::{page, stack, Recorded, ScriptedBackend, STACK_ID};
use httpmock::prelude::*;
use provisioner::{
    select_image, Credentials, HttpManifestSource, InstallerConfig, Installer,
};
use serde_json::json;

struct StaticManifest(ImageManifest);

#[async_trait]
impl ManifestSource for StaticManifest {
    async fn fetch_manifest(&self) -> Result<ImageManifest, ProvisionError> {
        Ok(self.0.clone())
    }
}

fn manifest() -> Arc<StaticManifest> {
    let manifest = serde_json::from_value(json!({
        "versions": [
            {"version": "v20240101", "images": [
                {"region": "eu-west-1", "id": "ami-eu"},
                {"region": "us-east-1", "id": "ami-1"}
            ]},
            {"version": "v20231201", "images": [
                {"region": "ap-south-1", "id": "ami-old"}
            ]}
        ]
    }))
    .unwrap();
    Arc::new(StaticManifest(manifest))
}

async fn template_file(body: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("stack-template-{}.json", uuid::Uuid::new_v4()));
    tokio::fs::write(&path, body).await.unwrap();
    path
}

fn config(template: PathBuf) -> InstallerConfig {
    InstallerConfig::new(
        Credentials::new(None, None, Some("session-token".into())),
        ".cluster.example.com",
    )
    .unwrap()
    .with_template_path(template)
    .with_poll_interval(Duration::ZERO)
}

#[tokio::test]
async fn run_creates_stack_and_watches_it() {
    let template = template_file(r#"{"Resources":{}}"#).await;
    let backend = Arc::new(ScriptedBackend::new([
        page(vec![stack("e1", "CREATE_IN_PROGRESS")], None),
        page(vec![stack("e2", "CREATE_COMPLETE")], None),
    ]));
    let installer = Installer::new(config(template.clone()), backend.clone(), manifest());
    let mut progress = Recorded::default();

    let outcome = installer.run(&mut progress).await.unwrap();

    assert_eq!(outcome.stack_id.as_str(), STACK_ID);
    assert_eq!(outcome.image_id.as_str(), "ami-1");
    assert_eq!(outcome.watch.state, RunState::Complete);
    assert_eq!(progress.stacks, [outcome.stack_id.clone()]);
    assert_eq!(progress.events, ["e1", "e2"]);

    let created = backend.created();
    assert_eq!(created.len(), 1);
    let request = &created[0];
    assert_eq!(request.stack_name.as_str(), "flynn");
    assert_eq!(request.template_body, r#"{"Resources":{}}"#);
    assert_eq!(request.on_failure, OnFailure::Rollback);
    assert_eq!(request.timeout, Duration::from_secs(600));
    assert_eq!(
        request.parameters,
        [
            StackParameter::new("ImageId", "ami-1"),
            StackParameter::new("ClusterDomain", outcome.cluster_domain.clone()),
        ]
    );
    let prefix = outcome
        .cluster_domain
        .strip_suffix(".cluster.example.com")
        .unwrap();
    assert_eq!(prefix.len(), 32);

    tokio::fs::remove_file(template).await.unwrap();
}

#[tokio::test]
async fn rolled_back_stack_is_a_failed_outcome() {
    let template = template_file("{}").await;
    let backend = Arc::new(ScriptedBackend::new([page(
        vec![stack("e1", "ROLLBACK_COMPLETE")],
        None,
    )]));
    let installer = Installer::new(config(template.clone()), backend, manifest());

    let outcome = installer.run(&mut Recorded::default()).await.unwrap();

    assert_eq!(outcome.watch.state, RunState::Failed);
    tokio::fs::remove_file(template).await.unwrap();
}

#[tokio::test]
async fn missing_template_stops_before_create() {
    let backend = Arc::new(ScriptedBackend::default());
    let installer = Installer::new(
        config(PathBuf::from("/nonexistent/stack-template.json")),
        backend.clone(),
        manifest(),
    );

    let err = installer.run(&mut Recorded::default()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(backend.created().is_empty());
}

#[tokio::test]
async fn region_without_image_stops_before_create() {
    let template = template_file("{}").await;
    let backend = Arc::new(ScriptedBackend::default());
    let installer = Installer::new(
        config(template.clone()).with_region(Region::new("sa-east-1").unwrap()),
        backend.clone(),
        manifest(),
    );

    let err = installer.run(&mut Recorded::default()).await.unwrap_err();

    assert_eq!(err.to_string(), "no image found for region sa-east-1");
    assert!(backend.created().is_empty());
    tokio::fs::remove_file(template).await.unwrap();
}

#[tokio::test]
async fn manifest_is_fetched_over_http() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/ec2/images.json");
            then.status(200).json_body(json!({
                "versions": [{"images": [{"region": "us-east-1", "id": "ami-1"}]}]
            }));
        })
        .await;
    let source = HttpManifestSource::new(server.url("/ec2/images.json"), reqwest::Client::new());

    let image = select_image(&source, &Region::new("us-east-1").unwrap())
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(image.as_str(), "ami-1");
}

#[tokio::test]
async fn manifest_error_status_is_reported() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/ec2/images.json");
            then.status(503);
        })
        .await;
    let source = HttpManifestSource::new(server.url("/ec2/images.json"), reqwest::Client::new());

    let err = source.fetch_manifest().await.unwrap_err();

    assert_eq!(
        err,
        ProvisionError::Application {
            message: "failed to fetch list of images: 503 Service Unavailable".into()
        }
    );
}

#[tokio::test]
async fn manifest_without_versions_is_rejected() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/ec2/images.json");
            then.status(200).json_body(json!({"versions": []}));
        })
        .await;
    let source = HttpManifestSource::new(server.url("/ec2/images.json"), reqwest::Client::new());

    let err = select_image(&source, &Region::new("us-east-1").unwrap())
        .await
        .unwrap_err();

    assert_eq!(err, ProvisionError::EmptyManifest);
}

#[tokio::test]
async fn undecodable_manifest_is_a_transport_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/ec2/images.json");
            then.status(200).body("<html>");
        })
        .await;
    let source = HttpManifestSource::new(server.url("/ec2/images.json"), reqwest::Client::new());

    let err = source.fetch_manifest().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transport);
}
