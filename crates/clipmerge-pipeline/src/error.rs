//! Pipeline error types.

use thiserror::Error;

use clipmerge_models::ClipValidationError;
use clipmerge_storage::StorageError;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid input: {0}")]
    InputValidation(#[from] ClipValidationError),

    #[error("Failed to acquire video {video_id}: {message}")]
    Acquisition { video_id: String, message: String },

    #[error("Failed to extract clip {index}: {message}")]
    Extraction { index: usize, message: String },

    #[error("Failed to merge clips: {0}")]
    Concatenation(String),

    #[error("Failed to publish merged video: {0}")]
    Publish(#[from] StorageError),

    #[error("Required tool unavailable: {0}")]
    ToolUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn acquisition(video_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Acquisition {
            video_id: video_id.into(),
            message: message.into(),
        }
    }

    pub fn extraction(index: usize, message: impl Into<String>) -> Self {
        Self::Extraction {
            index,
            message: message.into(),
        }
    }

    pub fn concatenation(msg: impl Into<String>) -> Self {
        Self::Concatenation(msg.into())
    }

    pub fn tool_unavailable(msg: impl Into<String>) -> Self {
        Self::ToolUnavailable(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Stable kind label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::InputValidation(_) => "input_validation",
            PipelineError::Acquisition { .. } => "acquisition",
            PipelineError::Extraction { .. } => "extraction",
            PipelineError::Concatenation(_) => "concatenation",
            PipelineError::Publish(_) => "publish",
            PipelineError::ToolUnavailable(_) => "tool_unavailable",
            PipelineError::Config(_) => "config",
            PipelineError::Io(_) => "io",
        }
    }

    /// Whether the caller sent a bad request.
    pub fn is_client_error(&self) -> bool {
        matches!(self, PipelineError::InputValidation(_))
    }
}
