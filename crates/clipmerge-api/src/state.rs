//! Application state.

use std::sync::Arc;

use clipmerge_pipeline::MergePipeline;

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub pipeline: Arc<MergePipeline>,
}

impl AppState {
    pub fn new(config: ApiConfig, pipeline: MergePipeline) -> Self {
        Self {
            config,
            pipeline: Arc::new(pipeline),
        }
    }
}
