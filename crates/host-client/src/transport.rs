//! Typed request/response and streaming primitives over one daemon address.
//!
//! Every response is classified before it reaches the caller:
//!
//! | Response | Error |
//! |----------|-------|
//! | 2xx / 101 | none |
//! | 404, or an error body with `"code": "not_found"` | [`HostError::NotFound`] |
//! | 406, 415, 502, 503, 504 | [`HostError::Transport`] |
//! | any other status | [`HostError::Application`] with the daemon's message |
//! | connect / read / decode failure | [`HostError::Transport`] |

use std::time::Duration;

use cluster::{HostError, Subscription};
use reqwest::header::{HeaderValue, ACCEPT};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::lines::decode_lines;

/// Media type for unary JSON calls.
pub(crate) const JSON: &str = "application/json";

/// Media type requested for event and progress streams.
pub(crate) const EVENT_STREAM: &str = "text/event-stream";

/// Default connect timeout of the client built by [`crate::HttpHost::new`].
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default whole-request timeout for unary calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Error body written by the host daemon.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct Transport {
    base: String,
    http: reqwest::Client,
    request_timeout: Option<Duration>,
}

impl Transport {
    pub(crate) fn new(base: impl Into<String>, http: reqwest::Client) -> Self {
        let base = base.into().trim_end_matches('/').to_string();
        Self {
            base,
            http,
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
        }
    }

    pub(crate) fn set_request_timeout(&mut self, timeout: Option<Duration>) {
        self.request_timeout = timeout;
    }

    pub(crate) fn base(&self) -> &str {
        &self.base
    }

    /// Starts a request to `path` on the daemon.
    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, format!("{}{}", self.base, path))
    }

    /// Starts a unary request: JSON accept header and the request timeout.
    fn unary(&self, method: Method, path: &str) -> RequestBuilder {
        let req = self.request(method, path).header(ACCEPT, JSON);
        match self.request_timeout {
            Some(timeout) => req.timeout(timeout),
            None => req,
        }
    }

    /// Sends a unary request and decodes a JSON response.
    pub(crate) async fn json<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, HostError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let operation = format!("{method} {path}");
        let mut req = self.unary(method, path);
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = self.send(&operation, req).await?;
        resp.json::<T>()
            .await
            .map_err(|e| HostError::transport(&operation, format!("decode: {e}")))
    }

    /// Sends a unary request whose response body is ignored.
    pub(crate) async fn call(&self, method: Method, path: &str) -> Result<(), HostError> {
        let operation = format!("{method} {path}");
        let req = self.unary(method, path);
        self.send(&operation, req).await.map(drop)
    }

    /// Sends `req` and classifies the response.
    pub(crate) async fn send(
        &self,
        operation: &str,
        req: RequestBuilder,
    ) -> Result<Response, HostError> {
        debug!(base = %self.base, operation, "sending request");
        let resp = req.send().await.map_err(|e| {
            warn!(base = %self.base, operation, error = %e, "request failed");
            HostError::transport(operation, e)
        })?;
        classify(operation, resp).await
    }

    /// Sends `req` and forwards the line-delimited response into `sink`.
    pub(crate) async fn stream<T>(
        &self,
        operation: String,
        req: RequestBuilder,
        sink: mpsc::Sender<T>,
    ) -> Result<Subscription, HostError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let req = req.header(ACCEPT, HeaderValue::from_static(EVENT_STREAM));
        let resp = self.send(&operation, req).await?;
        let items = decode_lines::<T, _, _>(Box::pin(resp.bytes_stream()), operation);
        Ok(Subscription::spawn(move |cancel| {
            cluster::subscription::forward(items, sink, cancel)
        }))
    }
}

/// Maps a daemon response onto the error taxonomy.
async fn classify(operation: &str, resp: Response) -> Result<Response, HostError> {
    let status = resp.status();
    if status.is_success() || status == StatusCode::SWITCHING_PROTOCOLS {
        return Ok(resp);
    }
    let text = resp.text().await.unwrap_or_default();
    let body = serde_json::from_str::<ErrorBody>(&text).ok();
    let message = body
        .as_ref()
        .and_then(|b| b.message.clone())
        .filter(|m| !m.is_empty())
        .or_else(|| Some(text.trim().to_string()).filter(|t| !t.is_empty()))
        .unwrap_or_else(|| status.to_string());
    let not_found_code = body
        .as_ref()
        .and_then(|b| b.code.as_deref())
        .is_some_and(|code| code == "not_found");

    let err = if status == StatusCode::NOT_FOUND || not_found_code {
        HostError::NotFound {
            resource: operation.to_string(),
        }
    } else if matches!(
        status,
        StatusCode::NOT_ACCEPTABLE
            | StatusCode::UNSUPPORTED_MEDIA_TYPE
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    ) {
        HostError::transport(operation, format!("{status}: {message}"))
    } else {
        HostError::Application {
            status: status.as_u16(),
            message,
        }
    };
    debug!(operation, %status, error = %err, "daemon returned an error");
    Err(err)
}
