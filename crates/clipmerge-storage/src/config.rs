//! Object storage configuration.

use std::time::Duration;

use crate::error::{StorageError, StorageResult};

/// Seven days, the longest expiry S3 SigV4 presigning allows.
pub const DEFAULT_PRESIGN_EXPIRY_SECS: u64 = 7 * 24 * 60 * 60;

/// Configuration for the S3 client and publisher.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// AWS region
    pub region: String,
    /// Access key ID
    pub access_key_id: Option<String>,
    /// Secret access key
    pub secret_access_key: Option<String>,
    /// Bucket name
    pub bucket_name: String,
    /// Custom endpoint for S3-compatible services
    pub endpoint_url: Option<String>,
    /// Optional key prefix for published objects
    pub key_prefix: Option<String>,
    /// Lifetime of presigned retrieval URLs
    pub presign_expiry: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            access_key_id: None,
            secret_access_key: None,
            bucket_name: "clipsmart".to_string(),
            endpoint_url: None,
            key_prefix: None,
            presign_expiry: Duration::from_secs(DEFAULT_PRESIGN_EXPIRY_SECS),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl StorageConfig {
    /// Create config from environment variables.
    ///
    /// Missing credentials are not an error here; publishing fails later
    /// with [`StorageError::MissingCredentials`].
    pub fn from_env() -> Self {
        Self {
            region: non_empty_var("AWS_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            access_key_id: non_empty_var("AWS_ACCESS_KEY_ID"),
            secret_access_key: non_empty_var("AWS_SECRET_ACCESS_KEY"),
            bucket_name: non_empty_var("AWS_S3_BUCKET").unwrap_or_else(|| "clipsmart".to_string()),
            endpoint_url: non_empty_var("S3_ENDPOINT_URL"),
            key_prefix: non_empty_var("S3_KEY_PREFIX"),
            presign_expiry: Duration::from_secs(
                std::env::var("PRESIGN_EXPIRY_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_PRESIGN_EXPIRY_SECS),
            ),
        }
    }

    /// Whether both halves of the key pair are present.
    pub fn has_credentials(&self) -> bool {
        self.access_key_id.is_some() && self.secret_access_key.is_some()
    }

    /// The configured key pair.
    pub fn credentials(&self) -> StorageResult<(&str, &str)> {
        match (&self.access_key_id, &self.secret_access_key) {
            (Some(id), Some(secret)) => Ok((id, secret)),
            _ => Err(StorageError::MissingCredentials),
        }
    }

    /// Full object key for `object_name`, with the prefix applied.
    pub fn object_key(&self, object_name: &str) -> String {
        match self.key_prefix.as_deref().map(|p| p.trim_matches('/')) {
            Some(prefix) if !prefix.is_empty() => format!("{}/{}", prefix, object_name),
            _ => object_name.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StorageConfig::default();
        assert_eq!(config.region, "us-east-1");
        assert_eq!(config.bucket_name, "clipsmart");
        assert_eq!(config.presign_expiry, Duration::from_secs(604_800));
        assert!(!config.has_credentials());
        assert!(matches!(
            config.credentials(),
            Err(StorageError::MissingCredentials)
        ));
    }

    #[test]
    fn test_object_key_prefix() {
        let mut config = StorageConfig::default();
        assert_eq!(config.object_key("merged_a.mp4"), "merged_a.mp4");

        config.key_prefix = Some("/merged/".to_string());
        assert_eq!(config.object_key("merged_a.mp4"), "merged/merged_a.mp4");
    }
}
