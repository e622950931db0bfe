//! Clip extraction with ordered fallback strategies.
//!
//! Every strategy re-encodes, so all segments share one codec set no matter
//! which strategy produced them:
//!
//! 1. accurate trim: output-side `-ss`/`-to` with aggressive error detection
//! 2. fast seek: input-side `-ss` with an output duration
//! 3. trim filter: `trim`/`atrim` filter graph over the decoded streams

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use clipmerge_models::{ClipRequest, EncodingConfig, RunId};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils;
use crate::strategy::{first_success, Strategy};
use crate::MIN_MEDIA_FILE_SIZE;

/// One clip to cut out of one validated source file.
#[derive(Debug, Clone)]
pub struct ExtractionJob {
    pub source: PathBuf,
    pub output: PathBuf,
    pub video_id: String,
    pub start: f64,
    pub end: f64,
}

impl ExtractionJob {
    pub fn new(source: impl Into<PathBuf>, output: impl Into<PathBuf>, clip: &ClipRequest) -> Self {
        Self {
            source: source.into(),
            output: output.into(),
            video_id: clip.video_id.clone(),
            start: clip.start_time,
            end: clip.end_time,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Segment filename for clip `index` of a run.
///
/// `clip_<run>_<index>_<videoId>_<start>_<end>[_<label>].mp4` with whole
/// seconds for the range.
pub fn segment_file_name(run_id: &RunId, index: usize, clip: &ClipRequest) -> String {
    let mut name = format!(
        "clip_{}_{}_{}_{}_{}",
        run_id,
        index,
        clip.video_id,
        clip.start_time as i64,
        clip.end_time as i64
    );
    if let Some(label) = clip.label_suffix() {
        name.push('_');
        name.push_str(&label);
    }
    name.push_str(".mp4");
    name
}

/// Produces a playable segment for an [`ExtractionJob`].
#[async_trait]
pub trait SegmentExtractor: Send + Sync {
    /// Extract the job's range, returning the segment path.
    async fn extract(&self, job: &ExtractionJob) -> MediaResult<PathBuf>;
}

/// Run `cmd`, then require the job's output to be non-empty.
///
/// A failed attempt never leaves a partial output behind for the next one.
async fn run_to_output(runner: &FfmpegRunner, cmd: FfmpegCommand, output: &Path) -> MediaResult<()> {
    fs_utils::discard(output).await;

    let result = match runner.run(&cmd).await {
        Ok(_) => fs_utils::require_non_empty(output).await.map(|_| ()),
        Err(e) => Err(e),
    };

    if result.is_err() {
        fs_utils::discard(output).await;
    }
    result
}

struct AccurateTrim {
    runner: FfmpegRunner,
    encoding: EncodingConfig,
}

#[async_trait]
impl Strategy<ExtractionJob, (), MediaError> for AccurateTrim {
    fn name(&self) -> &'static str {
        "accurate_trim"
    }

    async fn attempt(&self, job: &ExtractionJob) -> MediaResult<()> {
        let cmd = FfmpegCommand::new(&job.source, &job.output)
            .tolerate_decode_errors()
            .trim_start(job.start)
            .trim_end(job.end)
            .encoding(&self.encoding);
        run_to_output(&self.runner, cmd, &job.output).await
    }
}

struct FastSeek {
    runner: FfmpegRunner,
    encoding: EncodingConfig,
}

#[async_trait]
impl Strategy<ExtractionJob, (), MediaError> for FastSeek {
    fn name(&self) -> &'static str {
        "fast_seek"
    }

    async fn attempt(&self, job: &ExtractionJob) -> MediaResult<()> {
        let cmd = FfmpegCommand::new(&job.source, &job.output)
            .seek(job.start)
            .duration(job.duration())
            .encoding(&self.encoding);
        run_to_output(&self.runner, cmd, &job.output).await
    }
}

struct TrimFilter {
    runner: FfmpegRunner,
    encoding: EncodingConfig,
}

impl TrimFilter {
    fn filters(job: &ExtractionJob) -> (String, String) {
        (
            format!(
                "trim=start={:.3}:end={:.3},setpts=PTS-STARTPTS",
                job.start, job.end
            ),
            format!(
                "atrim=start={:.3}:end={:.3},asetpts=PTS-STARTPTS",
                job.start, job.end
            ),
        )
    }
}

#[async_trait]
impl Strategy<ExtractionJob, (), MediaError> for TrimFilter {
    fn name(&self) -> &'static str {
        "trim_filter"
    }

    async fn attempt(&self, job: &ExtractionJob) -> MediaResult<()> {
        let (video, audio) = Self::filters(job);
        let cmd = FfmpegCommand::new(&job.source, &job.output)
            .video_filter(video)
            .audio_filter(audio)
            .video_codec(&self.encoding.codec)
            .audio_codec(&self.encoding.audio_codec);
        run_to_output(&self.runner, cmd, &job.output).await
    }
}

/// FFmpeg-backed extractor trying accurate trim, fast seek, then trim filter.
pub struct FfmpegExtractor {
    strategies: Vec<Box<dyn Strategy<ExtractionJob, (), MediaError>>>,
}

impl FfmpegExtractor {
    pub fn new(runner: FfmpegRunner, encoding: EncodingConfig) -> Self {
        let strategies: Vec<Box<dyn Strategy<ExtractionJob, (), MediaError>>> = vec![
            Box::new(AccurateTrim {
                runner: runner.clone(),
                encoding: encoding.clone(),
            }),
            Box::new(FastSeek {
                runner: runner.clone(),
                encoding: encoding.clone(),
            }),
            Box::new(TrimFilter { runner, encoding }),
        ];
        Self { strategies }
    }

    /// Names of the configured strategies in evaluation order.
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }
}

#[async_trait]
impl SegmentExtractor for FfmpegExtractor {
    async fn extract(&self, job: &ExtractionJob) -> MediaResult<PathBuf> {
        fs_utils::require_min_size(&job.source, MIN_MEDIA_FILE_SIZE).await?;

        debug!(
            video_id = %job.video_id,
            start = job.start,
            end = job.end,
            output = %job.output.display(),
            "Extracting segment"
        );

        match first_success(&self.strategies, job).await {
            Ok(success) => {
                let strategy = success.strategy;
                metrics::counter!("clipmerge_extraction_total", "strategy" => strategy)
                    .increment(1);
                info!(
                    video_id = %job.video_id,
                    strategy,
                    "Extracted segment {}",
                    job.output.display()
                );
                Ok(job.output.clone())
            }
            Err(failures) => {
                metrics::counter!("clipmerge_extraction_total", "strategy" => "exhausted")
                    .increment(1);
                Err(MediaError::ExtractionFailed {
                    video_id: job.video_id.clone(),
                    start: job.start,
                    end: job.end,
                    details: failures.to_string(),
                })
            }
        }
    }
}
