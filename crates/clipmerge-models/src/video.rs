//! Source video identifiers and lifecycle.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum accepted length of a video identifier.
const MAX_VIDEO_ID_LEN: usize = 64;

/// Identifier of a source video at the upstream platform.
///
/// The identifier doubles as the local file stem (`<id>.mp4`), so only
/// characters that are safe in a filename are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    /// Create from an existing string without validation.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check that the identifier is non-empty and filename-safe.
    ///
    /// Valid format: ASCII alphanumerics, hyphens and underscores, 1-64 chars.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
            && self.0.len() <= MAX_VIDEO_ID_LEN
            && self
                .0
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }

    /// Local file name of the acquired source.
    pub fn file_name(&self) -> String {
        format!("{}.mp4", self.0)
    }

    /// Canonical watch-page URL.
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }

    /// Embed URL, which sometimes bypasses restrictions the watch page enforces.
    pub fn embed_url(&self) -> String {
        format!("https://www.youtube.com/embed/{}", self.0)
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VideoId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VideoId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lifecycle state of a source video within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceState {
    /// No usable local copy
    #[default]
    Missing,
    /// A provider is currently fetching the file
    Acquiring,
    /// The local copy passed the probe
    Validated,
    /// The probe failed; the file has been deleted
    Invalid,
}

impl SourceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceState::Missing => "missing",
            SourceState::Acquiring => "acquiring",
            SourceState::Validated => "validated",
            SourceState::Invalid => "invalid",
        }
    }

    /// Whether the state may move to `next`.
    ///
    /// `Invalid` reverts toward `Missing` so another provider may retry.
    pub fn can_transition_to(&self, next: SourceState) -> bool {
        matches!(
            (self, next),
            (SourceState::Missing, SourceState::Acquiring)
                | (SourceState::Missing, SourceState::Validated)
                | (SourceState::Acquiring, SourceState::Validated)
                | (SourceState::Acquiring, SourceState::Invalid)
                | (SourceState::Acquiring, SourceState::Missing)
                | (SourceState::Invalid, SourceState::Missing)
        )
    }
}

impl fmt::Display for SourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_id_validation() {
        assert!(VideoId::from("dQw4w9WgXcQ").is_valid());
        assert!(VideoId::from("v1").is_valid());
        assert!(VideoId::from("a_b-c").is_valid());

        assert!(!VideoId::from("").is_valid());
        assert!(!VideoId::from("../etc/passwd").is_valid());
        assert!(!VideoId::from("has space").is_valid());
        assert!(!VideoId::from("x".repeat(65)).is_valid());
    }

    #[test]
    fn test_canonical_urls() {
        let id = VideoId::from("dQw4w9WgXcQ");
        assert_eq!(id.watch_url(), "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
        assert_eq!(id.embed_url(), "https://www.youtube.com/embed/dQw4w9WgXcQ");
        assert_eq!(id.file_name(), "dQw4w9WgXcQ.mp4");
    }

    #[test]
    fn test_source_state_transitions() {
        assert!(SourceState::Missing.can_transition_to(SourceState::Acquiring));
        assert!(SourceState::Acquiring.can_transition_to(SourceState::Invalid));
        assert!(SourceState::Invalid.can_transition_to(SourceState::Missing));
        assert!(!SourceState::Invalid.can_transition_to(SourceState::Validated));
        assert!(!SourceState::Validated.can_transition_to(SourceState::Acquiring));
    }
}
