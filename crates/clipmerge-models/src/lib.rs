//! Shared data models for the clip merge pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Clip requests and their validation rules
//! - Source video identifiers and lifecycle state
//! - Merge requests, cleanup policy and responses
//! - Segment encoding defaults
//! - Per-run filename namespacing

pub mod clip;
pub mod encoding;
pub mod merge;
pub mod run;
pub mod video;

// Re-export common types
pub use clip::{sanitize_label, validate_clips, ClipRequest, ClipValidationError};
pub use encoding::EncodingConfig;
pub use merge::{CleanupPolicy, MergeFailure, MergeRequest, MergeResponse, SourceCleanup};
pub use run::RunId;
pub use video::{SourceState, VideoId};
