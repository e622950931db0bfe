//! S3-compatible object storage for merged artifacts.
//!
//! This crate provides:
//! - Storage configuration from the environment
//! - An S3 client for uploads and presigned GET URLs
//! - The publisher that names, uploads, and signs merged artifacts

pub mod client;
pub mod config;
pub mod error;
pub mod publisher;

pub use client::{ObjectStore, S3Client};
pub use config::StorageConfig;
pub use error::{StorageError, StorageResult};
pub use publisher::{generate_object_name, ArtifactPublisher, PublishedArtifact, S3Publisher};
