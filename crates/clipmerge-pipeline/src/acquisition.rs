//! Source acquisition: resolve a video id to a validated local file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use clipmerge_media::{
    first_success, fs_utils, BrowserCookieHarvester, CookieFileCredentials, CredentialProvider,
    MediaValidator, YtDlpDownloader, YtDlpOptions, MIN_MEDIA_FILE_SIZE,
};
use clipmerge_models::{SourceState, VideoId};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::metrics;
use crate::providers::{AcquisitionTarget, MetadataApiProvider, SourceProvider, YtDlpProvider};

#[derive(Debug, Clone)]
struct SourceRecord {
    path: PathBuf,
    state: SourceState,
}

/// Per-run view of source videos.
///
/// A source validated once is served to every later clip of the same run.
#[derive(Debug, Default)]
pub struct SourceRegistry {
    sources: HashMap<VideoId, SourceRecord>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, video_id: &VideoId) -> SourceState {
        self.sources
            .get(video_id)
            .map(|r| r.state)
            .unwrap_or_default()
    }

    /// Path of a source already validated in this run.
    pub fn validated_path(&self, video_id: &VideoId) -> Option<&Path> {
        self.sources
            .get(video_id)
            .filter(|r| r.state == SourceState::Validated)
            .map(|r| r.path.as_path())
    }

    fn transition(&mut self, video_id: &VideoId, path: &Path, next: SourceState) {
        let current = self.state(video_id);
        debug_assert!(
            current.can_transition_to(next),
            "illegal source transition {} -> {}",
            current,
            next
        );
        debug!(video_id = %video_id, from = %current, to = %next, "Source state change");
        self.sources.insert(
            video_id.clone(),
            SourceRecord {
                path: path.to_path_buf(),
                state: next,
            },
        );
    }
}

/// Produces validated source files through local reuse and a provider list.
pub struct SourceAcquisitionManager {
    download_dir: PathBuf,
    providers: Vec<SourceProvider>,
    validator: Arc<dyn MediaValidator>,
}

impl SourceAcquisitionManager {
    pub fn new(
        download_dir: impl Into<PathBuf>,
        providers: Vec<SourceProvider>,
        validator: Arc<dyn MediaValidator>,
    ) -> Self {
        Self {
            download_dir: download_dir.into(),
            providers,
            validator,
        }
    }

    /// Metadata API first, then yt-dlp with persisted or harvested cookies.
    pub fn default_providers(
        config: &PipelineConfig,
        ytdlp: impl Into<PathBuf>,
    ) -> PipelineResult<Vec<SourceProvider>> {
        let ytdlp = ytdlp.into();

        let harvester = BrowserCookieHarvester::new(
            ytdlp.clone(),
            config.harvested_cookies_file(),
            config.browser_paths_file.clone(),
            config.cookie_extract_timeout,
        );
        let credentials: Arc<dyn CredentialProvider> = Arc::new(
            CookieFileCredentials::new(config.cookies_file.clone())
                .with_fallback(Arc::new(harvester)),
        );
        let downloader = YtDlpDownloader::new(YtDlpOptions {
            binary: ytdlp,
            ..Default::default()
        });

        let providers: Vec<SourceProvider> = vec![
            Box::new(MetadataApiProvider::from_config(config)?),
            Box::new(YtDlpProvider::new(downloader, credentials)),
        ];
        Ok(providers)
    }

    /// Local path a source video is stored at.
    pub fn source_path(&self, video_id: &VideoId) -> PathBuf {
        self.download_dir.join(video_id.file_name())
    }

    /// Return a validated local copy of `video_id`.
    ///
    /// An existing file above the size threshold is reused when it probes
    /// clean. Otherwise providers are tried in order; the winner's output is
    /// size-checked and probed, and a probe failure deletes it without
    /// trying further providers.
    pub async fn acquire(
        &self,
        registry: &mut SourceRegistry,
        video_id: &VideoId,
    ) -> PipelineResult<PathBuf> {
        if let Some(path) = registry.validated_path(video_id) {
            debug!(video_id = %video_id, "Source already validated in this run");
            return Ok(path.to_path_buf());
        }

        let path = self.source_path(video_id);
        if registry.state(video_id) == SourceState::Invalid {
            registry.transition(video_id, &path, SourceState::Missing);
        }
        registry.transition(video_id, &path, SourceState::Acquiring);

        if self.try_reuse(video_id, &path).await {
            registry.transition(video_id, &path, SourceState::Validated);
            return Ok(path);
        }

        let started = Instant::now();
        let target = AcquisitionTarget {
            video_id: video_id.clone(),
            path: path.clone(),
        };

        match first_success(&self.providers, &target).await {
            Ok(success) => {
                for failure in &success.failures {
                    metrics::record_provider(failure.strategy, false);
                }
                metrics::record_provider(success.strategy, true);
                info!(
                    video_id = %video_id,
                    provider = success.strategy,
                    fallbacks = success.failures.len(),
                    "Acquired source video"
                );
            }
            Err(failures) => {
                for failure in &failures.failures {
                    metrics::record_provider(failure.strategy, false);
                }
                registry.transition(video_id, &path, SourceState::Invalid);
                return Err(PipelineError::acquisition(
                    video_id.as_str(),
                    format!("all providers failed ({})", failures),
                ));
            }
        }
        metrics::record_stage("acquire", started.elapsed().as_secs_f64());

        if let Err(e) = fs_utils::require_min_size(&path, MIN_MEDIA_FILE_SIZE).await {
            fs_utils::discard(&path).await;
            registry.transition(video_id, &path, SourceState::Invalid);
            return Err(PipelineError::acquisition(video_id.as_str(), e.to_string()));
        }

        if let Err(e) = self.validator.probe(&path).await {
            fs_utils::discard(&path).await;
            registry.transition(video_id, &path, SourceState::Invalid);
            return Err(PipelineError::acquisition(
                video_id.as_str(),
                format!("downloaded file failed validation: {}", e),
            ));
        }

        registry.transition(video_id, &path, SourceState::Validated);
        Ok(path)
    }

    /// Reuse an existing local copy if it is large enough and probes clean.
    ///
    /// Unusable copies are deleted.
    async fn try_reuse(&self, video_id: &VideoId, path: &Path) -> bool {
        match fs_utils::file_size(path).await {
            None => false,
            Some(size) if size <= MIN_MEDIA_FILE_SIZE => {
                warn!(
                    video_id = %video_id,
                    size,
                    "Existing source below size threshold, deleting"
                );
                fs_utils::discard(path).await;
                false
            }
            Some(size) => match self.validator.probe(path).await {
                Ok(()) => {
                    metrics::record_source_reused();
                    info!(video_id = %video_id, size, "Reusing existing source video");
                    true
                }
                Err(e) => {
                    warn!(
                        video_id = %video_id,
                        "Existing source failed validation, deleting: {}", e
                    );
                    fs_utils::discard(path).await;
                    false
                }
            },
        }
    }
}
