//! Fakes for the pipeline seams.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use clipmerge_media::{
    ExtractionJob, MediaError, MediaResult, MediaValidator, SegmentConcatenator,
    SegmentExtractor, Strategy,
};
use clipmerge_models::RunId;
use clipmerge_storage::{ArtifactPublisher, PublishedArtifact, StorageError, StorageResult};

use crate::providers::{AcquisitionTarget, ProviderError};

/// Validator whose verdicts are scripted.
pub struct FakeValidator {
    fail_first: usize,
    reject_all: bool,
    probes: AtomicUsize,
}

impl FakeValidator {
    pub fn accept_all() -> Self {
        Self {
            fail_first: 0,
            reject_all: false,
            probes: AtomicUsize::new(0),
        }
    }

    pub fn reject_all() -> Self {
        Self {
            reject_all: true,
            ..Self::accept_all()
        }
    }

    /// Reject the first `n` probes, accept the rest.
    pub fn failing_first(n: usize) -> Self {
        Self {
            fail_first: n,
            ..Self::accept_all()
        }
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaValidator for FakeValidator {
    async fn probe(&self, path: &Path) -> MediaResult<()> {
        let n = self.probes.fetch_add(1, Ordering::SeqCst);
        if !path.exists() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }
        if self.reject_all || n < self.fail_first {
            return Err(MediaError::corrupt(path, "moov atom not found"));
        }
        Ok(())
    }
}

/// Provider that writes `size` bytes to the target.
pub struct WritingProvider {
    name: &'static str,
    size: usize,
    calls: Arc<AtomicUsize>,
}

impl WritingProvider {
    pub fn new(name: &'static str, size: usize) -> Self {
        Self {
            name,
            size,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl Strategy<AcquisitionTarget, (), ProviderError> for WritingProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn attempt(&self, target: &AcquisitionTarget) -> Result<(), ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::fs::write(&target.path, vec![0u8; self.size])
            .await
            .map_err(MediaError::from)?;
        Ok(())
    }
}

/// Provider that always fails.
pub struct FailingProvider {
    name: &'static str,
    calls: Arc<AtomicUsize>,
}

impl FailingProvider {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl Strategy<AcquisitionTarget, (), ProviderError> for FailingProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn attempt(&self, _target: &AcquisitionTarget) -> Result<(), ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ProviderError::NoPlayableUrl)
    }
}

/// Extractor that writes the job's video id into the segment.
#[derive(Default)]
pub struct FakeExtractor {
    /// Clip index (by call order) at which to fail
    pub fail_at: Option<usize>,
    jobs: Mutex<Vec<ExtractionJob>>,
}

impl FakeExtractor {
    pub fn failing_at(index: usize) -> Self {
        Self {
            fail_at: Some(index),
            ..Default::default()
        }
    }

    pub fn jobs(&self) -> Vec<ExtractionJob> {
        self.jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl SegmentExtractor for FakeExtractor {
    async fn extract(&self, job: &ExtractionJob) -> MediaResult<PathBuf> {
        let call = {
            let mut jobs = self.jobs.lock().unwrap();
            jobs.push(job.clone());
            jobs.len() - 1
        };
        if self.fail_at == Some(call) {
            return Err(MediaError::ExtractionFailed {
                video_id: job.video_id.clone(),
                start: job.start,
                end: job.end,
                details: "all strategies failed".to_string(),
            });
        }
        tokio::fs::write(&job.output, job.video_id.as_bytes()).await?;
        Ok(job.output.clone())
    }
}

/// Concatenator that joins segment contents with `|`.
#[derive(Default)]
pub struct FakeConcatenator {
    pub fail: bool,
    calls: Mutex<Vec<Vec<PathBuf>>>,
}

impl FakeConcatenator {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<Vec<PathBuf>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SegmentConcatenator for FakeConcatenator {
    async fn concatenate(
        &self,
        segments: &[PathBuf],
        run_id: &RunId,
        out_dir: &Path,
    ) -> MediaResult<PathBuf> {
        self.calls.lock().unwrap().push(segments.to_vec());
        if self.fail {
            return Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                Some("Invalid data found when processing input".to_string()),
                Some(1),
            ));
        }
        let mut parts = Vec::new();
        for segment in segments {
            parts.push(tokio::fs::read_to_string(segment).await?);
        }
        let output = out_dir.join(run_id.merged_file_name());
        tokio::fs::write(&output, parts.join("|")).await?;
        Ok(output)
    }
}

/// Publisher that records the merged file contents it was given.
#[derive(Default)]
pub struct FakePublisher {
    pub missing_credentials: bool,
    published: Mutex<Vec<String>>,
}

impl FakePublisher {
    pub fn without_credentials() -> Self {
        Self {
            missing_credentials: true,
            ..Default::default()
        }
    }

    pub fn published(&self) -> Vec<String> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArtifactPublisher for FakePublisher {
    async fn publish(&self, path: &Path) -> StorageResult<PublishedArtifact> {
        if self.missing_credentials {
            return Err(StorageError::MissingCredentials);
        }
        let contents = tokio::fs::read_to_string(path).await?;
        self.published.lock().unwrap().push(contents);
        let object_name = "merged_test_1700000000.mp4".to_string();
        Ok(PublishedArtifact {
            url: format!("https://bucket.example/{}?X-Amz-Expires=604800", object_name),
            key: object_name.clone(),
            object_name,
        })
    }
}
