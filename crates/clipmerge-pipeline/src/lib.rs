//! Clip merge pipeline.
//!
//! This crate provides:
//! - Pipeline configuration from the environment
//! - Source acquisition through local reuse and ordered providers
//! - The merge orchestrator (extract, concatenate, publish)
//! - Cleanup of every transient file on every exit path
//! - Structured run logging and pipeline metrics

pub mod acquisition;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod providers;

#[cfg(test)]
mod testing;

pub use acquisition::{SourceAcquisitionManager, SourceRegistry};
pub use cleanup::{CleanupCoordinator, CleanupReport, RunArtifacts};
pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use logging::RunLogger;
pub use pipeline::MergePipeline;
pub use providers::{
    AcquisitionTarget, MetadataApiProvider, ProviderError, SourceProvider, YtDlpProvider,
};
