//! Concat-demuxer merge of extracted segments.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use clipmerge_models::{EncodingConfig, RunId};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils;

/// Merges ordered segments into a single artifact.
#[async_trait]
pub trait SegmentConcatenator: Send + Sync {
    /// Concatenate `segments` in order into `<out_dir>/merged_clips_<run>.mp4`.
    async fn concatenate(
        &self,
        segments: &[PathBuf],
        run_id: &RunId,
        out_dir: &Path,
    ) -> MediaResult<PathBuf>;
}

/// Quote a path for a concat demuxer `file` directive.
fn quote_path(path: &Path) -> String {
    let raw = path.to_string_lossy();
    format!("'{}'", raw.replace('\'', r"'\''"))
}

/// Contents of the concat list file, one `file '<path>'` line per segment.
pub fn concat_list_contents(segments: &[PathBuf]) -> String {
    let mut contents = String::new();
    for segment in segments {
        contents.push_str("file ");
        contents.push_str(&quote_path(segment));
        contents.push('\n');
    }
    contents
}

/// FFmpeg concat demuxer with re-encoding.
#[derive(Debug, Clone, Default)]
pub struct FfmpegConcatenator {
    runner: FfmpegRunner,
    encoding: EncodingConfig,
}

impl FfmpegConcatenator {
    pub fn new(runner: FfmpegRunner, encoding: EncodingConfig) -> Self {
        Self { runner, encoding }
    }

    fn merge_command(&self, list: &Path, output: &Path) -> FfmpegCommand {
        FfmpegCommand::new(list, output)
            .input_format("concat")
            .input_args(["-safe", "0"])
            .video_codec(&self.encoding.codec)
            .audio_codec(&self.encoding.audio_codec)
    }
}

#[async_trait]
impl SegmentConcatenator for FfmpegConcatenator {
    async fn concatenate(
        &self,
        segments: &[PathBuf],
        run_id: &RunId,
        out_dir: &Path,
    ) -> MediaResult<PathBuf> {
        if segments.is_empty() {
            return Err(MediaError::NoSegments);
        }

        let list_path = out_dir.join(run_id.list_file_name());
        let output = out_dir.join(run_id.merged_file_name());

        tokio::fs::write(&list_path, concat_list_contents(segments)).await?;

        // Removed on every exit path from here on, including an early `?`.
        let _list_guard = scopeguard::guard(list_path.clone(), |path| {
            if let Err(e) = std::fs::remove_file(&path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), "Failed to remove concat list: {}", e);
                }
            }
        });

        debug!(
            run_id = %run_id,
            segments = segments.len(),
            list = %list_path.display(),
            "Concatenating segments"
        );

        let cmd = self.merge_command(&list_path, &output);
        if let Err(e) = self.runner.run(&cmd).await {
            fs_utils::discard(&output).await;
            return Err(e);
        }
        if let Err(e) = fs_utils::require_non_empty(&output).await {
            fs_utils::discard(&output).await;
            return Err(e);
        }

        info!(run_id = %run_id, "Merged {} segments into {}", segments.len(), output.display());
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_list_preserves_order_and_escapes_quotes() {
        let segments = vec![
            PathBuf::from("/tmp/clip_b.mp4"),
            PathBuf::from("/tmp/it's here.mp4"),
            PathBuf::from("/tmp/clip_a.mp4"),
        ];
        let contents = concat_list_contents(&segments);
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(
            lines,
            vec![
                "file '/tmp/clip_b.mp4'",
                r"file '/tmp/it'\''s here.mp4'",
                "file '/tmp/clip_a.mp4'",
            ]
        );
    }

    #[test]
    fn test_merge_command_uses_concat_demuxer() {
        let concat = FfmpegConcatenator::default();
        let args = concat
            .merge_command(Path::new("/tmp/filelist_r.txt"), Path::new("/tmp/merged.mp4"))
            .build_args();
        let input_idx = args.iter().position(|a| a == "-i").unwrap();
        let concat_idx = args.iter().position(|a| a == "concat").unwrap();
        let safe_idx = args.iter().position(|a| a == "-safe").unwrap();
        assert!(concat_idx < input_idx && safe_idx < input_idx);
        assert_eq!(args[safe_idx + 1], "0");
        assert!(args.contains(&"-y".to_string()));
        assert!(args.contains(&"libx264".to_string()));
        assert!(args.contains(&"aac".to_string()));
    }

    #[tokio::test]
    async fn test_empty_segment_list_is_rejected() {
        let dir = TempDir::new().unwrap();
        let result = FfmpegConcatenator::default()
            .concatenate(&[], &RunId::new(), dir.path())
            .await;
        assert!(matches!(result, Err(MediaError::NoSegments)));
    }

    #[tokio::test]
    async fn test_list_file_removed_when_ffmpeg_fails() {
        let dir = TempDir::new().unwrap();
        let run = RunId::from_string("1700000000_feedface");
        let concat = FfmpegConcatenator::new(
            FfmpegRunner::new("/nonexistent/ffmpeg"),
            EncodingConfig::default(),
        );

        let result = concat
            .concatenate(&[dir.path().join("seg.mp4")], &run, dir.path())
            .await;

        assert!(result.is_err());
        assert!(!dir.path().join(run.list_file_name()).exists());
        assert!(!dir.path().join(run.merged_file_name()).exists());
    }
}
