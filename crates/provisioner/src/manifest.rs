//! Image manifest over HTTP.

use async_trait::async_trait;
use cluster::{ImageId, ImageManifest, ManifestSource, ProvisionError, Region};
use reqwest::StatusCode;
use tracing::{debug, instrument};

/// Fetches the release manifest with a plain `GET`.
#[derive(Debug, Clone)]
pub struct HttpManifestSource {
    url: String,
    http: reqwest::Client,
}

impl HttpManifestSource {
    /// Fetches from `url` with the given client.
    pub fn new(url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            http,
        }
    }

    /// Manifest location.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ManifestSource for HttpManifestSource {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn fetch_manifest(&self) -> Result<ImageManifest, ProvisionError> {
        let operation = "fetch image manifest";
        let resp = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| ProvisionError::transport(operation, e))?;
        let status = resp.status();
        if status != StatusCode::OK {
            return Err(ProvisionError::Application {
                message: format!("failed to fetch list of images: {status}"),
            });
        }
        let manifest: ImageManifest = resp
            .json()
            .await
            .map_err(|e| ProvisionError::transport(operation, format!("decode: {e}")))?;
        debug!(versions = manifest.versions.len(), "image manifest fetched");
        Ok(manifest)
    }
}

/// Resolves the image for `region` from the newest manifest version.
///
/// # Errors
///
/// [`ProvisionError::EmptyManifest`] when no version is listed and
/// [`ProvisionError::NoImage`] when the newest version has no image for
/// `region`, besides any error from `source`.
pub async fn select_image(
    source: &dyn ManifestSource,
    region: &Region,
) -> Result<ImageId, ProvisionError> {
    let manifest = source.fetch_manifest().await?;
    let latest = manifest.latest()?;
    let image = latest.image_for(region)?;
    debug!(%region, %image, version = ?latest.version, "image selected");
    Ok(image)
}
