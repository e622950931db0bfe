//! Pipeline configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use clipmerge_models::EncodingConfig;

/// Default metadata API host.
pub const DEFAULT_RAPIDAPI_HOST: &str = "ytstream-download-youtube-videos.p.rapidapi.com";

/// Pipeline configuration, threaded explicitly through every component.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root for all relative defaults
    pub base_dir: PathBuf,
    /// Where source videos live (`<videoId>.mp4`)
    pub download_dir: PathBuf,
    /// Where segments, concat lists and merged artifacts are written
    pub tmp_dir: PathBuf,
    /// Persisted Netscape cookie file (read-only for runs)
    pub cookies_file: PathBuf,
    /// `{"<browser>": "<profile path>"}` overrides for cookie harvesting
    pub browser_paths_file: PathBuf,
    /// Metadata API key; Provider A is skipped when absent
    pub rapidapi_key: Option<String>,
    /// Metadata API host header
    pub rapidapi_host: String,
    /// Metadata API base URL
    pub rapidapi_base_url: String,
    /// Metadata request timeout
    pub metadata_timeout: Duration,
    /// Payload fetch timeout
    pub payload_timeout: Duration,
    /// Per-browser cookie extraction timeout
    pub cookie_extract_timeout: Duration,
    /// Explicit ffmpeg binary
    pub ffmpeg_path: Option<PathBuf>,
    /// Explicit yt-dlp binary
    pub ytdlp_path: Option<PathBuf>,
    /// Segment and merge encoder settings
    pub encoding: EncodingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::with_base_dir(default_base_dir())
    }
}

/// `/app` when it exists (container layout), otherwise the working directory.
fn default_base_dir() -> PathBuf {
    let app = Path::new("/app");
    if app.is_dir() {
        return app.to_path_buf();
    }
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}

fn env_secs(name: &str, default: u64) -> Duration {
    Duration::from_secs(
        std::env::var(name)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(default),
    )
}

impl PipelineConfig {
    /// Defaults rooted at `base_dir`.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        Self {
            download_dir: base_dir.join("Download"),
            tmp_dir: base_dir.join("tmp"),
            cookies_file: base_dir.join("youtube_cookies.txt"),
            browser_paths_file: base_dir.join("browser_paths.json"),
            base_dir,
            rapidapi_key: None,
            rapidapi_host: DEFAULT_RAPIDAPI_HOST.to_string(),
            rapidapi_base_url: format!("https://{}", DEFAULT_RAPIDAPI_HOST),
            metadata_timeout: Duration::from_secs(30),
            payload_timeout: Duration::from_secs(90),
            cookie_extract_timeout: Duration::from_secs(20),
            ffmpeg_path: None,
            ytdlp_path: None,
            encoding: EncodingConfig::default(),
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let base_dir = env_path("BASE_DIR").unwrap_or_else(default_base_dir);
        let defaults = Self::with_base_dir(&base_dir);

        let rapidapi_host = std::env::var("RAPIDAPI_HOST")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.rapidapi_host);
        let rapidapi_base_url = std::env::var("RAPIDAPI_BASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| format!("https://{}", rapidapi_host));

        Self {
            download_dir: env_path("DOWNLOAD_DIR").unwrap_or(defaults.download_dir),
            tmp_dir: env_path("TMP_DIR").unwrap_or(defaults.tmp_dir),
            cookies_file: env_path("COOKIES_FILE").unwrap_or(defaults.cookies_file),
            browser_paths_file: env_path("BROWSER_PATHS_FILE")
                .unwrap_or(defaults.browser_paths_file),
            base_dir,
            rapidapi_key: std::env::var("RAPIDAPI_KEY")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            rapidapi_host,
            rapidapi_base_url,
            metadata_timeout: env_secs("METADATA_TIMEOUT_SECS", 30),
            payload_timeout: env_secs("PAYLOAD_TIMEOUT_SECS", 90),
            cookie_extract_timeout: env_secs("COOKIE_EXTRACT_TIMEOUT_SECS", 20),
            ffmpeg_path: env_path("FFMPEG_PATH"),
            ytdlp_path: env_path("YTDLP_PATH"),
            encoding: EncodingConfig::default(),
        }
    }

    /// Where harvested browser cookies are written.
    ///
    /// Kept apart from `cookies_file`, which runs never write.
    pub fn harvested_cookies_file(&self) -> PathBuf {
        self.tmp_dir.join("browser_cookies.txt")
    }

    /// Create the working directories and check they are writable.
    ///
    /// Failures are logged, not returned: the service still starts and the
    /// affected runs fail with their own errors.
    pub async fn prepare_dirs(&self) -> Vec<PathBuf> {
        let mut unwritable = Vec::new();
        for dir in [&self.download_dir, &self.tmp_dir] {
            if let Err(e) = tokio::fs::create_dir_all(dir).await {
                warn!(dir = %dir.display(), "Failed to create directory: {}", e);
                unwritable.push(dir.clone());
                continue;
            }
            if let Err(e) = check_writable(dir).await {
                warn!(dir = %dir.display(), "Directory is not writable: {}", e);
                unwritable.push(dir.clone());
                continue;
            }
            info!(dir = %dir.display(), "Directory ready");
        }
        unwritable
    }
}

async fn check_writable(dir: &Path) -> std::io::Result<()> {
    let probe = dir.join(format!(".write_test_{}", uuid::Uuid::new_v4().simple()));
    tokio::fs::write(&probe, b"ok").await?;
    tokio::fs::remove_file(&probe).await
}
