//! FFmpeg and yt-dlp CLI wrappers for the clip merge pipeline.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and execution
//! - A generic "first success wins" strategy combinator
//! - Media integrity probing
//! - Clip extraction with ordered fallback strategies
//! - Concat-demuxer merging
//! - yt-dlp downloads and credential providers

pub mod clip;
pub mod command;
pub mod concat;
pub mod credentials;
pub mod download;
pub mod error;
pub mod fs_utils;
pub mod strategy;
pub mod validator;

pub use clip::{segment_file_name, ExtractionJob, FfmpegExtractor, SegmentExtractor};
pub use command::{locate_ffmpeg, locate_ytdlp, FfmpegCommand, FfmpegRunner};
pub use concat::{concat_list_contents, FfmpegConcatenator, SegmentConcatenator};
pub use credentials::{
    Browser, BrowserCookieHarvester, CookieFileCredentials, CredentialProvider, NoCredentials,
};
pub use download::{YtDlpDownloader, YtDlpOptions};
pub use error::{MediaError, MediaResult};
pub use strategy::{
    first_success, Strategy, StrategyFailure, StrategyFailures, StrategySuccess,
};
pub use validator::{FfmpegValidator, MediaValidator};

/// Minimum size (bytes) for a media file to be considered non-corrupt.
pub const MIN_MEDIA_FILE_SIZE: u64 = 1024;
