//! Removal of everything a run leaves on disk.
//!
//! [`RunArtifacts`] tracks a run's transient paths from the moment they are
//! named. [`CleanupCoordinator::finish`] removes them once the run body has
//! returned; if the run future is dropped first, `RunArtifacts` removes them
//! synchronously on drop.

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use clipmerge_media::fs_utils;
use clipmerge_models::{CleanupPolicy, RunId, SourceCleanup, VideoId};

use crate::metrics;

/// Transient files owned by one run.
#[derive(Debug)]
pub struct RunArtifacts {
    run_id: RunId,
    list_file: PathBuf,
    merged_file: PathBuf,
    segments: Vec<PathBuf>,
    cleaned: bool,
}

impl RunArtifacts {
    pub fn new(run_id: RunId, tmp_dir: &Path) -> Self {
        Self {
            list_file: tmp_dir.join(run_id.list_file_name()),
            merged_file: tmp_dir.join(run_id.merged_file_name()),
            run_id,
            segments: Vec::new(),
            cleaned: false,
        }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn merged_file(&self) -> &Path {
        &self.merged_file
    }

    /// Register a segment path before anything is written to it.
    pub fn add_segment(&mut self, path: PathBuf) {
        self.segments.push(path);
    }

    pub fn segments(&self) -> &[PathBuf] {
        &self.segments
    }

    /// Every transient path, whether or not it exists yet.
    pub fn transient_paths(&self) -> Vec<PathBuf> {
        let mut paths = Vec::with_capacity(self.segments.len() + 2);
        paths.push(self.list_file.clone());
        paths.extend(self.segments.iter().cloned());
        paths.push(self.merged_file.clone());
        paths
    }

    fn mark_cleaned(&mut self) {
        self.cleaned = true;
    }
}

impl Drop for RunArtifacts {
    fn drop(&mut self) {
        if self.cleaned {
            return;
        }
        warn!(run_id = %self.run_id, "Run dropped before cleanup, removing transient files");
        for path in self.transient_paths() {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "Removed file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), "Failed to remove file: {}", e),
            }
        }
    }
}

/// What cleanup removed and what it could not.
#[derive(Debug, Default, Clone)]
pub struct CleanupReport {
    pub removed: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    async fn remove(&mut self, path: &Path) {
        match fs_utils::remove_if_exists(path).await {
            Ok(true) => {
                debug!(path = %path.display(), "Removed file");
                self.removed.push(path.to_path_buf());
            }
            Ok(false) => {}
            Err(e) => {
                warn!(path = %path.display(), "Failed to remove file: {}", e);
                self.failed.push((path.to_path_buf(), e.to_string()));
            }
        }
    }
}

/// Runs after every pipeline body, successful or not.
#[derive(Debug, Clone)]
pub struct CleanupCoordinator {
    download_dir: PathBuf,
}

impl CleanupCoordinator {
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
        }
    }

    /// Remove the run's transient files and, after a successful run, the
    /// source videos selected by `policy`.
    ///
    /// Deletion failures are recorded in the report and never returned.
    pub async fn finish(
        &self,
        artifacts: &mut RunArtifacts,
        succeeded: bool,
        policy: CleanupPolicy,
        referenced: &[VideoId],
    ) -> CleanupReport {
        let mut report = CleanupReport::default();

        for path in artifacts.transient_paths() {
            report.remove(&path).await;
        }
        artifacts.mark_cleaned();

        if succeeded {
            match policy.sources {
                SourceCleanup::Keep => {}
                SourceCleanup::Targeted => {
                    for video_id in referenced {
                        report.remove(&self.download_dir.join(video_id.file_name())).await;
                    }
                }
                SourceCleanup::Aggressive => {
                    warn!(
                        run_id = %artifacts.run_id(),
                        dir = %self.download_dir.display(),
                        "Removing every source video; concurrent runs may lose their sources"
                    );
                    self.remove_all_sources(&mut report).await;
                }
            }
        }

        metrics::record_cleanup(report.removed.len(), report.failed.len());
        info!(
            run_id = %artifacts.run_id(),
            removed = report.removed.len(),
            failed = report.failed.len(),
            "Cleanup finished"
        );
        report
    }

    async fn remove_all_sources(&self, report: &mut CleanupReport) {
        let mut entries = match tokio::fs::read_dir(&self.download_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %self.download_dir.display(), "Failed to list sources: {}", e);
                report
                    .failed
                    .push((self.download_dir.clone(), e.to_string()));
                return;
            }
        };

        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    let path = entry.path();
                    if path.extension().is_some_and(|ext| ext == "mp4") {
                        report.remove(&path).await;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(dir = %self.download_dir.display(), "Failed to list sources: {}", e);
                    report
                        .failed
                        .push((self.download_dir.clone(), e.to_string()));
                    break;
                }
            }
        }
    }
}
