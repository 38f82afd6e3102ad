use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use cluster::{
    ActiveJob, AttachClient, AttachRequest, Event, EventScope, Host, HostError, HostId,
    ImagePullRequest, JobId, ProviderId, PullCoordinate, PullInfo, SnapshotStream, Subscription,
    TrustDatabase, VolumeId, VolumeInfo, SNAPSHOT_STREAM_MEDIA_TYPE,
};
use futures::TryStreamExt;
use reqwest::header::{HeaderValue, ACCEPT, CONNECTION, CONTENT_TYPE, UPGRADE};
use reqwest::{Method, StatusCode};
use tokio::sync::mpsc;
use tokio_util::io::ReaderStream;
use tracing::{debug, instrument};

use crate::transport::{Transport, DEFAULT_CONNECT_TIMEOUT};

/// Protocol named in the `Upgrade` header of attach requests.
pub const ATTACH_PROTOCOL: &str = "flynn-attach/0";

/// [`Host`] implementation speaking the daemon's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpHost {
    id: HostId,
    transport: Transport,
}

impl HttpHost {
    /// Creates a client for the daemon `id` listening at `addr`
    /// (e.g. `http://10.0.0.5:1113`).
    ///
    /// When `http` is `None` a client with [`DEFAULT_CONNECT_TIMEOUT`] is built.
    pub fn new(
        id: HostId,
        addr: impl Into<String>,
        http: Option<reqwest::Client>,
    ) -> Result<Self, HostError> {
        let http = match http {
            Some(http) => http,
            None => reqwest::Client::builder()
                .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
                .build()
                .map_err(|e| HostError::transport("build http client", e))?,
        };
        Ok(Self {
            id,
            transport: Transport::new(addr, http),
        })
    }

    /// Overrides the whole-request timeout of unary calls; `None` disables it.
    ///
    /// Snapshot transfers and streams never use this timeout.
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.transport.set_request_timeout(timeout);
        self
    }

    /// Returns the daemon base URL.
    pub fn addr(&self) -> &str {
        self.transport.base()
    }
}

fn job_path(id: &JobId) -> String {
    format!("/host/jobs/{id}")
}

#[async_trait]
impl Host for HttpHost {
    fn id(&self) -> &HostId {
        &self.id
    }

    async fn list_jobs(&self) -> Result<HashMap<JobId, ActiveJob>, HostError> {
        self.transport
            .json::<(), _>(Method::GET, "/host/jobs", None)
            .await
    }

    async fn get_job(&self, id: &JobId) -> Result<ActiveJob, HostError> {
        self.transport
            .json::<(), _>(Method::GET, &job_path(id), None)
            .await
    }

    #[instrument(skip(self), fields(host = %self.id))]
    async fn stop_job(&self, id: &JobId) -> Result<(), HostError> {
        self.transport.call(Method::DELETE, &job_path(id)).await
    }

    #[instrument(skip(self, sink), fields(host = %self.id))]
    async fn stream_events(
        &self,
        scope: EventScope,
        sink: mpsc::Sender<Event>,
    ) -> Result<Subscription, HostError> {
        let path = match &scope {
            EventScope::All => "/host/jobs".to_string(),
            EventScope::Job(id) => job_path(id),
        };
        let req = self.transport.request(Method::GET, &path);
        self.transport
            .stream(format!("GET {path}"), req, sink)
            .await
    }

    #[instrument(skip(self, req), fields(host = %self.id, job = %req.job_id))]
    async fn attach(&self, req: &AttachRequest, wait: bool) -> Result<AttachClient, HostError> {
        let operation = "POST /attach";
        let http_req = self
            .transport
            .request(Method::POST, "/attach")
            .header(UPGRADE, HeaderValue::from_static(ATTACH_PROTOCOL))
            .header(CONNECTION, HeaderValue::from_static("Upgrade"))
            .json(req);
        let resp = self.transport.send(operation, http_req).await?;
        if resp.status() != StatusCode::SWITCHING_PROTOCOLS {
            return Err(HostError::transport(
                operation,
                format!("expected protocol upgrade, got {}", resp.status()),
            ));
        }
        let upgraded = resp
            .upgrade()
            .await
            .map_err(|e| HostError::transport(operation, e))?;
        AttachClient::handshake(req.job_id.clone(), Box::new(upgraded), wait).await
    }

    #[instrument(skip(self), fields(host = %self.id))]
    async fn create_volume(&self, provider: &ProviderId) -> Result<VolumeInfo, HostError> {
        self.transport
            .json::<(), _>(
                Method::POST,
                &format!("/storage/providers/{provider}/volumes"),
                None,
            )
            .await
    }

    #[instrument(skip(self), fields(host = %self.id))]
    async fn destroy_volume(&self, volume: &VolumeId) -> Result<(), HostError> {
        self.transport
            .call(Method::POST, &format!("/storage/volumes/{volume}/destroy"))
            .await
    }

    #[instrument(skip(self), fields(host = %self.id))]
    async fn create_snapshot(&self, volume: &VolumeId) -> Result<VolumeInfo, HostError> {
        self.transport
            .json::<(), _>(
                Method::PUT,
                &format!("/storage/volumes/{volume}/snapshot"),
                None,
            )
            .await
    }

    #[instrument(skip(self), fields(host = %self.id))]
    async fn pull_snapshot(
        &self,
        receive_volume: &VolumeId,
        source_host: &HostId,
        source_snapshot: &VolumeId,
    ) -> Result<VolumeInfo, HostError> {
        let coordinate = PullCoordinate {
            host_id: source_host.clone(),
            snapshot_id: source_snapshot.clone(),
        };
        // The transfer runs inside this request, so it gets no request timeout.
        let path = format!("/storage/volumes/{receive_volume}/pull_snapshot");
        let operation = format!("POST {path}");
        let req = self
            .transport
            .request(Method::POST, &path)
            .header(ACCEPT, "application/json")
            .json(&coordinate);
        let resp = self.transport.send(&operation, req).await?;
        let info: VolumeInfo = resp
            .json()
            .await
            .map_err(|e| HostError::transport(&operation, format!("decode: {e}")))?;
        debug!(snapshot = %info.id, parent = ?info.parent_id, "snapshot pulled");
        Ok(info)
    }

    #[instrument(skip(self, assume_haves), fields(host = %self.id, haves = assume_haves.len()))]
    async fn send_snapshot(
        &self,
        snapshot: &VolumeId,
        assume_haves: &[serde_json::Value],
    ) -> Result<SnapshotStream, HostError> {
        let path = format!("/storage/volumes/{snapshot}/send");
        let operation = format!("GET {path}");
        let req = self
            .transport
            .request(Method::GET, &path)
            .header(ACCEPT, HeaderValue::from_static(SNAPSHOT_STREAM_MEDIA_TYPE))
            .json(assume_haves);
        let resp = self.transport.send(&operation, req).await?;

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !content_type.starts_with(SNAPSHOT_STREAM_MEDIA_TYPE) {
            return Err(HostError::transport(
                &operation,
                format!("incompatible media type {content_type:?}"),
            ));
        }
        let body = resp
            .bytes_stream()
            .map_err(move |e| HostError::transport(&operation, e));
        Ok(Box::pin(body))
    }

    #[instrument(skip(self, trust_db, sink), fields(host = %self.id, repository = %req.repository))]
    async fn pull_images(
        &self,
        req: &ImagePullRequest,
        trust_db: TrustDatabase,
        sink: mpsc::Sender<PullInfo>,
    ) -> Result<Subscription, HostError> {
        let path = "/host/pull-images";
        let http_req = self
            .transport
            .request(Method::POST, path)
            .query(&[
                ("repository", req.repository.as_str()),
                ("driver", req.driver.as_str()),
                ("root", req.root.as_str()),
            ])
            .header(CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"))
            .body(reqwest::Body::wrap_stream(ReaderStream::new(trust_db)));
        self.transport
            .stream(format!("POST {path}"), http_req, sink)
            .await
    }
}
