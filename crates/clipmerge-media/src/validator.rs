//! Structural integrity probe for local media files.

use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, warn};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Checks that a media file can be demuxed and decoded.
#[async_trait]
pub trait MediaValidator: Send + Sync {
    /// Probe `path`.
    ///
    /// Returns [`MediaError::FileNotFound`] for a missing file and
    /// [`MediaError::CorruptMedia`] when the file cannot be decoded.
    async fn probe(&self, path: &Path) -> MediaResult<()>;
}

/// Decodes the first second of a file into the null muxer.
///
/// Cost is bounded by the one-second window, not the file size.
#[derive(Debug, Clone, Default)]
pub struct FfmpegValidator {
    runner: FfmpegRunner,
}

impl FfmpegValidator {
    pub fn new(runner: FfmpegRunner) -> Self {
        Self { runner }
    }

    fn probe_command(path: &Path) -> FfmpegCommand {
        FfmpegCommand::new(path, "-")
            .duration(1.0)
            .output_format("null")
    }
}

#[async_trait]
impl MediaValidator for FfmpegValidator {
    async fn probe(&self, path: &Path) -> MediaResult<()> {
        if !path.exists() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }

        match self.runner.run(&Self::probe_command(path)).await {
            Ok(_) => {
                debug!(path = %path.display(), "Media probe passed");
                Ok(())
            }
            Err(MediaError::FfmpegNotFound) => Err(MediaError::FfmpegNotFound),
            Err(e) => {
                let reason = e
                    .stderr_tail()
                    .map(str::to_string)
                    .unwrap_or_else(|| e.to_string());
                warn!(path = %path.display(), reason = %reason, "Media probe failed");
                Err(MediaError::corrupt(path, reason))
            }
        }
    }
}
