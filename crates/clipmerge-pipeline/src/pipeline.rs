//! Merge pipeline orchestrator.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

use clipmerge_media::{
    locate_ffmpeg, locate_ytdlp, segment_file_name, ExtractionJob, FfmpegConcatenator,
    FfmpegExtractor, FfmpegRunner, FfmpegValidator, MediaValidator, SegmentConcatenator,
    SegmentExtractor,
};
use clipmerge_models::{validate_clips, MergeRequest, MergeResponse, RunId, VideoId};
use clipmerge_storage::{ArtifactPublisher, PublishedArtifact};

use crate::acquisition::{SourceAcquisitionManager, SourceRegistry};
use crate::cleanup::{CleanupCoordinator, CleanupReport, RunArtifacts};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::RunLogger;
use crate::metrics;

/// Sequences acquisition, extraction, merge, publish and cleanup for one
/// request at a time per call; calls may run concurrently.
pub struct MergePipeline {
    tmp_dir: PathBuf,
    acquisition: SourceAcquisitionManager,
    extractor: Arc<dyn SegmentExtractor>,
    concatenator: Arc<dyn SegmentConcatenator>,
    publisher: Arc<dyn ArtifactPublisher>,
    cleanup: CleanupCoordinator,
    ffmpeg_available: bool,
}

impl MergePipeline {
    pub fn new(
        config: &PipelineConfig,
        acquisition: SourceAcquisitionManager,
        extractor: Arc<dyn SegmentExtractor>,
        concatenator: Arc<dyn SegmentConcatenator>,
        publisher: Arc<dyn ArtifactPublisher>,
    ) -> Self {
        Self {
            tmp_dir: config.tmp_dir.clone(),
            acquisition,
            extractor,
            concatenator,
            publisher,
            cleanup: CleanupCoordinator::new(config.download_dir.clone()),
            ffmpeg_available: true,
        }
    }

    /// Wire the ffmpeg/yt-dlp backed components.
    ///
    /// A missing ffmpeg does not fail construction; merge requests are
    /// refused with `ToolUnavailable` instead.
    pub fn from_config(
        config: &PipelineConfig,
        publisher: Arc<dyn ArtifactPublisher>,
    ) -> PipelineResult<Self> {
        let ffmpeg = locate_ffmpeg(config.ffmpeg_path.as_deref());
        let ffmpeg_available = ffmpeg.is_ok();
        let ffmpeg = match ffmpeg {
            Ok(path) => {
                tracing::info!(path = %path.display(), "Found ffmpeg");
                path
            }
            Err(e) => {
                tracing::warn!("{}; merge requests will be refused", e);
                PathBuf::from("ffmpeg")
            }
        };
        let ytdlp = match locate_ytdlp(config.ytdlp_path.as_deref()) {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!("{}; the yt-dlp provider will fail", e);
                PathBuf::from("yt-dlp")
            }
        };

        let runner = FfmpegRunner::new(ffmpeg);
        let validator: Arc<dyn MediaValidator> = Arc::new(FfmpegValidator::new(runner.clone()));
        let acquisition = SourceAcquisitionManager::new(
            config.download_dir.clone(),
            SourceAcquisitionManager::default_providers(config, ytdlp)?,
            validator,
        );
        let extractor = Arc::new(FfmpegExtractor::new(runner.clone(), config.encoding.clone()));
        let concatenator = Arc::new(FfmpegConcatenator::new(runner, config.encoding.clone()));

        let mut pipeline = Self::new(config, acquisition, extractor, concatenator, publisher);
        pipeline.ffmpeg_available = ffmpeg_available;
        Ok(pipeline)
    }

    pub fn ffmpeg_available(&self) -> bool {
        self.ffmpeg_available
    }

    /// Run one merge request to completion.
    ///
    /// Input is validated before any tool or provider runs. Cleanup always
    /// completes before this returns; nothing is published unless every
    /// clip succeeded.
    pub async fn run(&self, request: &MergeRequest) -> PipelineResult<MergeResponse> {
        self.run_with_report(request).await.0
    }

    /// Like [`run`](Self::run), also returning what cleanup did.
    pub async fn run_with_report(
        &self,
        request: &MergeRequest,
    ) -> (PipelineResult<MergeResponse>, CleanupReport) {
        let run_id = RunId::new();
        let logger = RunLogger::new(&run_id, "merge_clips");
        let started = Instant::now();

        if let Err(e) = validate_clips(&request.clips) {
            let error = PipelineError::from(e);
            logger.log_error(error.kind(), &error.to_string());
            metrics::record_run(error.kind(), started.elapsed().as_secs_f64());
            return (Err(error), CleanupReport::default());
        }

        if !self.ffmpeg_available {
            let error = PipelineError::tool_unavailable("ffmpeg not found");
            logger.log_error(error.kind(), &error.to_string());
            metrics::record_run(error.kind(), started.elapsed().as_secs_f64());
            return (Err(error), CleanupReport::default());
        }

        let span = logger.create_span();
        async move {
            logger.log_start(&format!("{} clips", request.clips.len()));

            let mut artifacts = RunArtifacts::new(run_id.clone(), &self.tmp_dir);
            let result = self.execute(&run_id, request, &mut artifacts, &logger).await;

            let referenced = referenced_sources(request);
            let report = self
                .cleanup
                .finish(
                    &mut artifacts,
                    result.is_ok(),
                    request.cleanup_policy(),
                    &referenced,
                )
                .await;
            if !report.is_clean() {
                logger.log_warning(&format!("{} files could not be removed", report.failed.len()));
            }

            let elapsed = started.elapsed().as_secs_f64();
            let result = match result {
                Ok(artifact) => {
                    metrics::record_run("success", elapsed);
                    logger.log_completion(&artifact.key);
                    Ok(MergeResponse::new(
                        artifact.url,
                        artifact.object_name,
                        request.clips.clone(),
                    ))
                }
                Err(error) => {
                    metrics::record_run(error.kind(), elapsed);
                    logger.log_error(error.kind(), &error.to_string());
                    Err(error)
                }
            };
            (result, report)
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        run_id: &RunId,
        request: &MergeRequest,
        artifacts: &mut RunArtifacts,
        logger: &RunLogger,
    ) -> PipelineResult<PublishedArtifact> {
        let mut registry = SourceRegistry::new();

        for (index, clip) in request.clips.iter().enumerate() {
            let video_id = clip.video_id();
            let source = self.acquisition.acquire(&mut registry, &video_id).await?;

            let output = self.tmp_dir.join(segment_file_name(run_id, index, clip));
            artifacts.add_segment(output.clone());

            let started = Instant::now();
            let job = ExtractionJob::new(source, output, clip);
            self.extractor
                .extract(&job)
                .await
                .map_err(|e| PipelineError::extraction(index, e.to_string()))?;
            metrics::record_stage("extract", started.elapsed().as_secs_f64());

            logger.log_progress(&format!(
                "clip {}/{} extracted ({} {:.3}-{:.3})",
                index + 1,
                request.clips.len(),
                video_id,
                clip.start_time,
                clip.end_time
            ));
        }

        let started = Instant::now();
        let merged = self
            .concatenator
            .concatenate(artifacts.segments(), run_id, &self.tmp_dir)
            .await
            .map_err(|e| PipelineError::concatenation(e.to_string()))?;
        metrics::record_stage("concatenate", started.elapsed().as_secs_f64());

        let started = Instant::now();
        let artifact = self.publisher.publish(&merged).await?;
        metrics::record_stage("publish", started.elapsed().as_secs_f64());

        Ok(artifact)
    }
}

/// Distinct video ids of the request, in first-use order.
fn referenced_sources(request: &MergeRequest) -> Vec<VideoId> {
    let mut ids: Vec<VideoId> = Vec::new();
    for clip in &request.clips {
        let id = clip.video_id();
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}
