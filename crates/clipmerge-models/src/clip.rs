//! Clip request model and validation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::VideoId;

/// Number of label characters kept for the segment filename suffix.
pub const LABEL_SUFFIX_CHARS: usize = 30;

/// A requested sub-range of one source video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipRequest {
    /// Source video identifier
    #[serde(default)]
    pub video_id: String,

    /// Free text attached to the clip, only used to name the segment file
    #[serde(default, alias = "transcriptText", skip_serializing_if = "Option::is_none")]
    pub label_text: Option<String>,

    /// Start of the range in seconds
    #[serde(default)]
    pub start_time: f64,

    /// End of the range in seconds
    #[serde(default)]
    pub end_time: f64,
}

impl ClipRequest {
    pub fn new(video_id: impl Into<String>, start_time: f64, end_time: f64) -> Self {
        Self {
            video_id: video_id.into(),
            label_text: None,
            start_time,
            end_time,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label_text = Some(label.into());
        self
    }

    /// Typed video identifier.
    pub fn video_id(&self) -> VideoId {
        VideoId::from(self.video_id.as_str())
    }

    /// Length of the range in seconds.
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Validate the request at position `index` of the clip list.
    pub fn validate(&self, index: usize) -> Result<(), ClipValidationError> {
        if self.video_id.trim().is_empty() {
            return Err(ClipValidationError::MissingVideoId { index });
        }

        if !self.video_id().is_valid() {
            return Err(ClipValidationError::InvalidVideoId {
                index,
                video_id: self.video_id.clone(),
            });
        }

        if !self.start_time.is_finite() || !self.end_time.is_finite() {
            return Err(ClipValidationError::NonFiniteTime { index });
        }

        if self.start_time < 0.0 {
            return Err(ClipValidationError::NegativeStart {
                index,
                start: self.start_time,
            });
        }

        if self.end_time <= self.start_time {
            return Err(ClipValidationError::InvalidTimeRange {
                index,
                start: self.start_time,
                end: self.end_time,
            });
        }

        Ok(())
    }

    /// Human-readable segment filename suffix derived from the label.
    pub fn label_suffix(&self) -> Option<String> {
        self.label_text.as_deref().and_then(sanitize_label)
    }
}

/// Reduce label text to a filename-friendly suffix.
///
/// Keeps the first 30 characters, drops anything that is not alphanumeric or
/// whitespace, trims, and joins the remaining words with `_`.
pub fn sanitize_label(text: &str) -> Option<String> {
    let kept: String = text
        .chars()
        .take(LABEL_SUFFIX_CHARS)
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    let suffix = kept.split_whitespace().collect::<Vec<_>>().join("_");
    if suffix.is_empty() {
        None
    } else {
        Some(suffix)
    }
}

/// Clip validation error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClipValidationError {
    #[error("No clips provided")]
    NoClips,

    #[error("Missing videoId in clip {index}")]
    MissingVideoId { index: usize },

    #[error("Invalid videoId '{video_id}' in clip {index}")]
    InvalidVideoId { index: usize, video_id: String },

    #[error("Clip {index} has a non-finite start or end time")]
    NonFiniteTime { index: usize },

    #[error("Clip {index} has a negative start time ({start})")]
    NegativeStart { index: usize, start: f64 },

    #[error("Invalid time range in clip {index}: start_time ({start}) must be less than end_time ({end})")]
    InvalidTimeRange { index: usize, start: f64, end: f64 },
}

/// Validate a full clip list, stopping at the first invalid clip.
pub fn validate_clips(clips: &[ClipRequest]) -> Result<(), ClipValidationError> {
    if clips.is_empty() {
        return Err(ClipValidationError::NoClips);
    }
    clips
        .iter()
        .enumerate()
        .try_for_each(|(index, clip)| clip.validate(index))
}
