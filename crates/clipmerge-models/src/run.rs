//! Per-run filename namespace.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier of one pipeline run.
///
/// Format: `<unix-seconds>_<8 hex chars>`. The timestamp keeps transient
/// files sortable; the random part separates runs started in the same second.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Generate a new run ID.
    pub fn new() -> Self {
        let random = Uuid::new_v4().simple().to_string();
        Self(format!("{}_{}", Utc::now().timestamp(), &random[..8]))
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the concat demuxer list file for this run.
    pub fn list_file_name(&self) -> String {
        format!("filelist_{}.txt", self.0)
    }

    /// Name of the merged artifact for this run.
    pub fn merged_file_name(&self) -> String {
        format!("merged_clips_{}.mp4", self.0)
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
