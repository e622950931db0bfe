//! Source video providers.
//!
//! Each provider is a [`Strategy`] that writes `<download_dir>/<videoId>.mp4`
//! on success. The acquisition manager tries them in order.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use clipmerge_media::{
    fs_utils, CredentialProvider, MediaError, Strategy, YtDlpDownloader, MIN_MEDIA_FILE_SIZE,
};
use clipmerge_models::VideoId;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};

/// What a provider should fetch and where it should put it.
#[derive(Debug, Clone)]
pub struct AcquisitionTarget {
    pub video_id: VideoId,
    pub path: PathBuf,
}

/// Why a single provider could not deliver a source.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("metadata API key not configured")]
    MissingApiKey,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("metadata response could not be parsed: {0}")]
    InvalidResponse(String),

    #[error("no playable URL in metadata response")]
    NoPlayableUrl,

    #[error("payload too small ({0} bytes)")]
    PayloadTooSmall(usize),

    #[error(transparent)]
    Media(#[from] MediaError),
}

/// Dynamic provider list entry.
pub type SourceProvider = Box<dyn Strategy<AcquisitionTarget, (), ProviderError>>;

/// One entry of `formats` / `adaptiveFormats`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatEntry {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub quality_label: Option<String>,
}

/// Metadata API response; only the format lists matter.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataResponse {
    #[serde(default)]
    pub formats: Vec<FormatEntry>,
    #[serde(default)]
    pub adaptive_formats: Vec<FormatEntry>,
}

impl MetadataResponse {
    /// First entry with a URL, muxed formats before adaptive ones.
    pub fn select_format(&self) -> Option<&FormatEntry> {
        self.formats
            .iter()
            .chain(self.adaptive_formats.iter())
            .find(|f| f.url.as_deref().is_some_and(|u| !u.is_empty()))
    }
}

/// Provider A: keyed metadata API that returns direct media URLs.
pub struct MetadataApiProvider {
    client: reqwest::Client,
    api_key: Option<String>,
    host: String,
    base_url: String,
    metadata_timeout: Duration,
    payload_timeout: Duration,
}

impl MetadataApiProvider {
    pub fn from_config(config: &PipelineConfig) -> PipelineResult<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| PipelineError::config_error(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_key: config.rapidapi_key.clone(),
            host: config.rapidapi_host.clone(),
            base_url: config.rapidapi_base_url.trim_end_matches('/').to_string(),
            metadata_timeout: config.metadata_timeout,
            payload_timeout: config.payload_timeout,
        })
    }

    async fn fetch_metadata(
        &self,
        api_key: &str,
        video_id: &VideoId,
    ) -> Result<MetadataResponse, ProviderError> {
        let body = self
            .client
            .get(format!("{}/dl", self.base_url))
            .query(&[("id", video_id.as_str())])
            .header("X-RapidAPI-Key", api_key)
            .header("X-RapidAPI-Host", &self.host)
            .timeout(self.metadata_timeout)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        serde_json::from_str(&body).map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl Strategy<AcquisitionTarget, (), ProviderError> for MetadataApiProvider {
    fn name(&self) -> &'static str {
        "metadata_api"
    }

    async fn attempt(&self, target: &AcquisitionTarget) -> Result<(), ProviderError> {
        let api_key = self.api_key.as_deref().ok_or(ProviderError::MissingApiKey)?;

        let metadata = self.fetch_metadata(api_key, &target.video_id).await?;
        let format = metadata.select_format().ok_or(ProviderError::NoPlayableUrl)?;
        let url = format.url.as_deref().ok_or(ProviderError::NoPlayableUrl)?;
        debug!(
            video_id = %target.video_id,
            quality = format.quality_label.as_deref().unwrap_or("unknown"),
            "Fetching media payload"
        );

        let payload = self
            .client
            .get(url)
            .timeout(self.payload_timeout)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        // Same bar as the post-download size check: strictly above the minimum.
        if (payload.len() as u64) <= MIN_MEDIA_FILE_SIZE {
            return Err(ProviderError::PayloadTooSmall(payload.len()));
        }

        fs_utils::write_atomic(&target.path, &payload).await?;
        info!(
            video_id = %target.video_id,
            bytes = payload.len(),
            "Downloaded source via metadata API"
        );
        Ok(())
    }
}

/// Provider B: yt-dlp with optional cookie credentials.
pub struct YtDlpProvider {
    downloader: YtDlpDownloader,
    credentials: Arc<dyn CredentialProvider>,
}

impl YtDlpProvider {
    pub fn new(downloader: YtDlpDownloader, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            downloader,
            credentials,
        }
    }
}

#[async_trait]
impl Strategy<AcquisitionTarget, (), ProviderError> for YtDlpProvider {
    fn name(&self) -> &'static str {
        "yt_dlp"
    }

    async fn attempt(&self, target: &AcquisitionTarget) -> Result<(), ProviderError> {
        let cookies = self.credentials.cookie_file().await;
        debug!(
            video_id = %target.video_id,
            credentials = self.credentials.name(),
            has_cookies = cookies.is_some(),
            "Resolved yt-dlp credentials"
        );
        self.downloader
            .download(&target.video_id, &target.path, cookies.as_deref())
            .await?;
        Ok(())
    }
}
