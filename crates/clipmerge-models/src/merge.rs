//! Merge request and response models.

use serde::{Deserialize, Serialize};

use crate::ClipRequest;

/// Inbound merge request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequest {
    /// Clips in playback order
    #[serde(default)]
    pub clips: Vec<ClipRequest>,

    /// Remove the source videos referenced by this request after success
    #[serde(default = "default_true")]
    pub cleanup_downloads: bool,

    /// Remove every source video in the download directory after success
    #[serde(default)]
    pub cleanup_all_downloads: bool,
}

fn default_true() -> bool {
    true
}

impl MergeRequest {
    pub fn new(clips: Vec<ClipRequest>) -> Self {
        Self {
            clips,
            cleanup_downloads: true,
            cleanup_all_downloads: false,
        }
    }

    /// Cleanup policy derived from the two request flags.
    pub fn cleanup_policy(&self) -> CleanupPolicy {
        CleanupPolicy::from_flags(self.cleanup_downloads, self.cleanup_all_downloads)
    }
}

/// How source videos are treated once a run has succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceCleanup {
    /// Leave source videos in place
    Keep,
    /// Remove only the sources referenced by the request
    #[default]
    Targeted,
    /// Remove every `.mp4` in the download directory.
    ///
    /// Not safe while other runs are in flight: it deletes sources those
    /// runs may be about to extract from.
    Aggressive,
}

/// Cleanup policy for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CleanupPolicy {
    pub sources: SourceCleanup,
}

impl CleanupPolicy {
    pub fn from_flags(cleanup_downloads: bool, cleanup_all_downloads: bool) -> Self {
        let sources = match (cleanup_downloads, cleanup_all_downloads) {
            (false, _) => SourceCleanup::Keep,
            (true, false) => SourceCleanup::Targeted,
            (true, true) => SourceCleanup::Aggressive,
        };
        Self { sources }
    }

    pub fn keep_sources() -> Self {
        Self {
            sources: SourceCleanup::Keep,
        }
    }
}

/// Successful merge response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeResponse {
    pub message: String,
    /// Presigned retrieval URL of the merged artifact
    pub s3_url: String,
    /// The clip requests echoed back in playback order
    pub clips_info: Vec<ClipRequest>,
    /// Generated object name in the bucket
    #[serde(rename = "fileNames3")]
    pub object_name: String,
    pub success: bool,
    pub status: bool,
}

impl MergeResponse {
    pub fn new(s3_url: String, object_name: String, clips_info: Vec<ClipRequest>) -> Self {
        Self {
            message: "Clips merged successfully".to_string(),
            s3_url,
            clips_info,
            object_name,
            success: true,
            status: true,
        }
    }
}

/// Failed merge response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeFailure {
    pub error: String,
    pub status: bool,
}

impl MergeFailure {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            status: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request: MergeRequest =
            serde_json::from_str(r#"{"clips":[{"videoId":"v1","startTime":5,"endTime":10}]}"#)
                .unwrap();
        assert!(request.cleanup_downloads);
        assert!(!request.cleanup_all_downloads);
        assert_eq!(request.cleanup_policy().sources, SourceCleanup::Targeted);
    }

    #[test]
    fn test_cleanup_policy_flags() {
        assert_eq!(CleanupPolicy::from_flags(false, true).sources, SourceCleanup::Keep);
        assert_eq!(CleanupPolicy::from_flags(true, false).sources, SourceCleanup::Targeted);
        assert_eq!(CleanupPolicy::from_flags(true, true).sources, SourceCleanup::Aggressive);
    }

    #[test]
    fn test_response_wire_names() {
        let response = MergeResponse::new(
            "https://example.com/x".to_string(),
            "merged_x.mp4".to_string(),
            vec![ClipRequest::new("v1", 1.0, 2.0)],
        );
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["s3Url"], "https://example.com/x");
        assert_eq!(json["fileNames3"], "merged_x.mp4");
        assert_eq!(json["clipsInfo"][0]["videoId"], "v1");
        assert_eq!(json["status"], true);

        let failure = serde_json::to_value(MergeFailure::new("boom")).unwrap();
        assert_eq!(failure["status"], false);
        assert_eq!(failure["error"], "boom");
    }
}
