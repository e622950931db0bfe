//! Filesystem helpers shared by acquisition, extraction and cleanup.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Size of a regular file, or `None` if it does not exist.
pub async fn file_size(path: impl AsRef<Path>) -> Option<u64> {
    match fs::metadata(path.as_ref()).await {
        Ok(meta) if meta.is_file() => Some(meta.len()),
        _ => None,
    }
}

/// Whether `path` exists and is strictly larger than `min_bytes`.
pub async fn exceeds(path: impl AsRef<Path>, min_bytes: u64) -> bool {
    file_size(path).await.is_some_and(|size| size > min_bytes)
}

/// Fail unless `path` exists and is strictly larger than `min_bytes`.
pub async fn require_min_size(path: impl AsRef<Path>, min_bytes: u64) -> MediaResult<u64> {
    let path = path.as_ref();
    match file_size(path).await {
        None => Err(MediaError::FileNotFound(path.to_path_buf())),
        Some(size) if size <= min_bytes => Err(MediaError::FileTooSmall {
            path: path.to_path_buf(),
            size,
        }),
        Some(size) => Ok(size),
    }
}

/// Fail unless `path` exists and is non-empty.
pub async fn require_non_empty(path: impl AsRef<Path>) -> MediaResult<u64> {
    let path = path.as_ref();
    match file_size(path).await {
        Some(size) if size > 0 => Ok(size),
        _ => Err(MediaError::EmptyOutput(path.to_path_buf())),
    }
}

/// Remove a file, treating "already gone" as success.
///
/// Returns whether a file was actually deleted.
pub async fn remove_if_exists(path: impl AsRef<Path>) -> std::io::Result<bool> {
    match fs::remove_file(path.as_ref()).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Best-effort removal that only logs on failure.
pub async fn discard(path: impl AsRef<Path>) {
    let path = path.as_ref();
    match remove_if_exists(path).await {
        Ok(true) => debug!(path = %path.display(), "Removed file"),
        Ok(false) => {}
        Err(e) => warn!(path = %path.display(), "Failed to remove file: {}", e),
    }
}

/// Sibling temp path used for atomic writes.
fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));
    path.with_file_name(name)
}

/// Write `bytes` to `path` via a temp file in the same directory and a rename.
///
/// Readers never observe a partially written file at `path`.
pub async fn write_atomic(path: impl AsRef<Path>, bytes: &[u8]) -> MediaResult<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    let tmp = temp_sibling(path);
    if let Err(e) = fs::write(&tmp, bytes).await {
        discard(&tmp).await;
        return Err(e.into());
    }

    if let Err(e) = fs::rename(&tmp, path).await {
        discard(&tmp).await;
        return Err(e.into());
    }

    Ok(())
}
