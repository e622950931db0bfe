//! Publishing of merged artifacts.

use async_trait::async_trait;
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

use crate::client::{ObjectStore, S3Client};
use crate::config::StorageConfig;
use crate::error::{StorageError, StorageResult};

/// Content type of every published artifact.
pub const VIDEO_CONTENT_TYPE: &str = "video/mp4";

/// Result of a successful publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedArtifact {
    /// Presigned retrieval URL
    pub url: String,
    /// Generated object name (without prefix)
    pub object_name: String,
    /// Full key in the bucket
    pub key: String,
}

/// Uploads a merged artifact and returns where it can be fetched.
#[async_trait]
pub trait ArtifactPublisher: Send + Sync {
    async fn publish(&self, path: &Path) -> StorageResult<PublishedArtifact>;
}

/// `merged_<uuid-v4>_<unix-seconds>.mp4`
pub fn generate_object_name() -> String {
    format!("merged_{}_{}.mp4", Uuid::new_v4(), Utc::now().timestamp())
}

/// Publisher backed by an [`ObjectStore`].
///
/// Built without a store when credentials are absent so the service can
/// still start; every publish then fails with `MissingCredentials`.
pub struct S3Publisher {
    store: Option<Arc<dyn ObjectStore>>,
    config: StorageConfig,
}

impl S3Publisher {
    pub fn from_config(config: StorageConfig) -> Self {
        let store = match S3Client::new(&config) {
            Ok(client) => Some(Arc::new(client) as Arc<dyn ObjectStore>),
            Err(e) => {
                warn!("Object storage unavailable: {}", e);
                None
            }
        };
        Self { store, config }
    }

    pub fn with_store(store: Arc<dyn ObjectStore>, config: StorageConfig) -> Self {
        Self {
            store: Some(store),
            config,
        }
    }

    pub fn expiry(&self) -> Duration {
        self.config.presign_expiry
    }
}

#[async_trait]
impl ArtifactPublisher for S3Publisher {
    async fn publish(&self, path: &Path) -> StorageResult<PublishedArtifact> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(StorageError::FileNotFound(path.to_path_buf()));
        }

        let store = self.store.as_ref().ok_or(StorageError::MissingCredentials)?;

        let object_name = generate_object_name();
        let key = self.config.object_key(&object_name);

        let started = Instant::now();
        store.upload_file(path, &key, VIDEO_CONTENT_TYPE).await?;
        metrics::histogram!("clipmerge_upload_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        let url = store.presign_get(&key, self.config.presign_expiry).await?;

        info!(key = %key, "Published merged artifact");
        Ok(PublishedArtifact {
            url,
            object_name,
            key,
        })
    }
}
