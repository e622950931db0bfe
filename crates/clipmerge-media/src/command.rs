//! FFmpeg command builder and runner.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, trace};

use clipmerge_models::EncodingConfig;

use crate::error::{MediaError, MediaResult};

/// Number of diagnostic stderr lines kept for error reporting.
const STDERR_TAIL_LINES: usize = 20;

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input file path
    input: PathBuf,
    /// Output file path (`-` for muxers that write nowhere)
    output: PathBuf,
    /// Input arguments (before -i)
    input_args: Vec<String>,
    /// Output arguments (after -i)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Add input arguments (before -i).
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    /// Add multiple input arguments.
    pub fn input_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.input_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Input-side seek (fast, keyframe based).
    pub fn seek(self, seconds: f64) -> Self {
        self.input_arg("-ss").input_arg(format_secs(seconds))
    }

    /// Output-side trim start (decodes from the beginning, frame accurate).
    pub fn trim_start(self, seconds: f64) -> Self {
        self.output_arg("-ss").output_arg(format_secs(seconds))
    }

    /// Output-side trim end position.
    pub fn trim_end(self, seconds: f64) -> Self {
        self.output_arg("-to").output_arg(format_secs(seconds))
    }

    /// Output duration.
    pub fn duration(self, seconds: f64) -> Self {
        self.output_arg("-t").output_arg(format_secs(seconds))
    }

    /// Read the input through a named demuxer (e.g. `concat`).
    pub fn input_format(self, format: impl Into<String>) -> Self {
        self.input_arg("-f").input_arg(format)
    }

    /// Force the output muxer (e.g. `null`).
    pub fn output_format(self, format: impl Into<String>) -> Self {
        self.output_arg("-f").output_arg(format)
    }

    /// Set video filter.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Set audio filter.
    pub fn audio_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-af").output_arg(filter)
    }

    /// Set video codec.
    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    /// Set audio codec.
    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    /// Set preset.
    pub fn preset(self, preset: impl Into<String>) -> Self {
        self.output_arg("-preset").output_arg(preset)
    }

    /// Set output pixel format.
    pub fn pixel_format(self, pix_fmt: impl Into<String>) -> Self {
        self.output_arg("-pix_fmt").output_arg(pix_fmt)
    }

    /// Keep decoding through damaged frames instead of aborting.
    pub fn tolerate_decode_errors(self) -> Self {
        self.input_arg("-err_detect").input_arg("aggressive")
    }

    /// Apply the full segment encoder set.
    pub fn encoding(self, encoding: &EncodingConfig) -> Self {
        let cmd = self
            .video_codec(&encoding.codec)
            .audio_codec(&encoding.audio_codec)
            .pixel_format(&encoding.pixel_format)
            .preset(&encoding.preset);
        if encoding.faststart {
            cmd.output_arg("-movflags").output_arg("+faststart")
        } else {
            cmd
        }
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-v".to_string());
        args.push(self.log_level.clone());

        // Progress output to stderr
        args.push("-progress".to_string());
        args.push("pipe:2".to_string());

        args.extend(self.input_args.clone());

        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());

        args.extend(self.output_args.clone());

        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

fn format_secs(seconds: f64) -> String {
    format!("{:.3}", seconds)
}

/// Progress snapshot parsed from `-progress pipe:2`.
#[derive(Debug, Clone, Default)]
pub struct FfmpegProgress {
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Frames written
    pub frame: u64,
    /// Encoding speed relative to realtime
    pub speed: f64,
    /// Whether ffmpeg reported `progress=end`
    pub is_complete: bool,
}

/// Runner for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    binary: PathBuf,
}

impl Default for FfmpegRunner {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FfmpegRunner {
    /// Create a runner for the given ffmpeg binary.
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Run an FFmpeg command to completion.
    ///
    /// Diagnostic stderr lines (anything that is not a progress key) are
    /// kept and attached to the error on a non-zero exit.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<FfmpegProgress> {
        let args = cmd.build_args();
        debug!("Running FFmpeg: {} {}", self.binary.display(), args.join(" "));
        let started = Instant::now();

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => MediaError::FfmpegNotFound,
                _ => MediaError::Io(e),
            })?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("ffmpeg stderr not captured"))?;
        let mut reader = BufReader::new(stderr).lines();

        let mut progress = FfmpegProgress::default();
        let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);

        while let Some(line) = reader.next_line().await? {
            if parse_progress_line(&line, &mut progress).is_some() {
                trace!(
                    out_time_ms = progress.out_time_ms,
                    frame = progress.frame,
                    speed = progress.speed,
                    "ffmpeg progress"
                );
                continue;
            }
            if is_progress_line(&line) || line.trim().is_empty() {
                continue;
            }
            if tail.len() == STDERR_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line);
        }

        let status = child.wait().await?;

        metrics::histogram!("clipmerge_ffmpeg_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        if status.success() {
            debug!(
                frames = progress.frame,
                speed = progress.speed,
                complete = progress.is_complete,
                elapsed_secs = started.elapsed().as_secs_f64(),
                "FFmpeg finished"
            );
            Ok(progress)
        } else {
            let stderr = Vec::from(tail).join("\n");
            Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                (!stderr.is_empty()).then_some(stderr),
                status.code(),
            ))
        }
    }
}

/// Whether a stderr line is a `key=value` progress entry.
fn is_progress_line(line: &str) -> bool {
    match line.trim().split_once('=') {
        Some((key, _)) => {
            !key.is_empty()
                && key
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        }
        None => false,
    }
}

/// Parse a progress line, returning a snapshot at each `progress=` marker.
fn parse_progress_line(line: &str, current: &mut FfmpegProgress) -> Option<FfmpegProgress> {
    let line = line.trim();

    if let Some((key, value)) = line.split_once('=') {
        match key {
            "out_time_ms" | "out_time_us" => {
                if let Ok(us) = value.parse::<i64>() {
                    // Both keys carry microseconds in current ffmpeg builds
                    current.out_time_ms = us / 1000;
                }
            }
            "frame" => {
                if let Ok(frame) = value.parse() {
                    current.frame = frame;
                }
            }
            "speed" => {
                if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                    current.speed = speed;
                }
            }
            "progress" => {
                if value == "end" {
                    current.is_complete = true;
                }
                return Some(current.clone());
            }
            _ => {}
        }
    }

    None
}

/// Locate the ffmpeg executable.
///
/// Order: explicit path, `PATH`, then the platform's common install locations.
pub fn locate_ffmpeg(explicit: Option<&Path>) -> MediaResult<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        debug!("Configured ffmpeg path {} does not exist", path.display());
    }

    if let Ok(path) = which::which("ffmpeg") {
        return Ok(path);
    }

    common_ffmpeg_paths()
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .ok_or(MediaError::FfmpegNotFound)
}

#[cfg(windows)]
fn common_ffmpeg_paths() -> &'static [&'static str] {
    &[
        r"C:\Program Files\ffmpeg\bin\ffmpeg.exe",
        r"C:\ffmpeg\bin\ffmpeg.exe",
        r".\ffmpeg\bin\ffmpeg.exe",
    ]
}

#[cfg(target_os = "linux")]
fn common_ffmpeg_paths() -> &'static [&'static str] {
    &["/usr/bin/ffmpeg", "/usr/local/bin/ffmpeg", "/bin/ffmpeg", "./ffmpeg"]
}

#[cfg(not(any(windows, target_os = "linux")))]
fn common_ffmpeg_paths() -> &'static [&'static str] {
    &["/usr/local/bin/ffmpeg", "/opt/homebrew/bin/ffmpeg"]
}

/// Locate the yt-dlp executable (explicit path, then `PATH`).
pub fn locate_ytdlp(explicit: Option<&Path>) -> MediaResult<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
    }
    which::which("yt-dlp").map_err(|_| MediaError::YtDlpNotFound)
}
