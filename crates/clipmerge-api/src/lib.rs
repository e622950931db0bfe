//! Axum HTTP shell for the clip merge pipeline.
//!
//! This crate provides:
//! - `POST /merge-clips`, which runs one merge to completion
//! - Health and service banner routes
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
