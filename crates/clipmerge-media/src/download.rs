//! Video download using yt-dlp.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

use clipmerge_models::VideoId;

use crate::error::{MediaError, MediaResult};
use crate::fs_utils;
use crate::MIN_MEDIA_FILE_SIZE;

/// Format selector capped at 720p to avoid throttled high-bitrate streams.
pub const DEFAULT_FORMAT: &str =
    "bestvideo[ext=mp4][height<=720]+bestaudio[ext=m4a]/mp4/best[height<=720]";

/// Header set sent in place of cookies so requests look like a browser.
const BROWSER_HEADERS: &[&str] = &[
    "Accept:text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
    "Accept-Language:en-US,en;q=0.5",
    "DNT:1",
    "Connection:keep-alive",
    "Upgrade-Insecure-Requests:1",
];

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// yt-dlp invocation settings.
#[derive(Debug, Clone)]
pub struct YtDlpOptions {
    pub binary: PathBuf,
    pub format: String,
    pub retries: u32,
    pub fragment_retries: u32,
    pub extractor_retries: u32,
    pub file_access_retries: u32,
}

impl Default for YtDlpOptions {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("yt-dlp"),
            format: DEFAULT_FORMAT.to_string(),
            retries: 10,
            fragment_retries: 10,
            extractor_retries: 5,
            file_access_retries: 5,
        }
    }
}

/// Downloads whole source videos with yt-dlp.
#[derive(Debug, Clone, Default)]
pub struct YtDlpDownloader {
    options: YtDlpOptions,
}

impl YtDlpDownloader {
    pub fn new(options: YtDlpOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &YtDlpOptions {
        &self.options
    }

    /// Arguments for one attempt against `url`.
    pub fn build_args(&self, url: &str, target: &Path, cookies: Option<&Path>) -> Vec<String> {
        let o = &self.options;
        let mut args: Vec<String> = vec![
            "-f".into(),
            o.format.clone(),
            "--merge-output-format".into(),
            "mp4".into(),
            "-o".into(),
            target.to_string_lossy().to_string(),
            "--retries".into(),
            o.retries.to_string(),
            "--fragment-retries".into(),
            o.fragment_retries.to_string(),
            "--extractor-retries".into(),
            o.extractor_retries.to_string(),
            "--file-access-retries".into(),
            o.file_access_retries.to_string(),
            "--skip-unavailable-fragments".into(),
            "--no-playlist".into(),
            "--no-check-certificate".into(),
            "--hls-prefer-native".into(),
            "--hls-use-mpegts".into(),
        ];

        match cookies {
            Some(cookies) => {
                args.push("--cookies".into());
                args.push(cookies.to_string_lossy().to_string());
            }
            None => {
                args.push("--user-agent".into());
                args.push(BROWSER_USER_AGENT.into());
                for header in BROWSER_HEADERS {
                    args.push("--add-header".into());
                    args.push((*header).into());
                }
            }
        }

        args.push(url.to_string());
        args
    }

    /// Download `video_id` to `target`, trying the watch URL then the embed URL.
    ///
    /// An attempt counts as successful only if `target` ends up larger than
    /// the minimum media size; yt-dlp's exit status is logged but not trusted.
    /// On final failure, partial output is removed.
    pub async fn download(
        &self,
        video_id: &VideoId,
        target: &Path,
        cookies: Option<&Path>,
    ) -> MediaResult<()> {
        let urls = [video_id.watch_url(), video_id.embed_url()];
        let mut last_error = String::from("no attempts made");

        for url in &urls {
            info!(video_id = %video_id, url = %url, cookies = cookies.is_some(), "Downloading with yt-dlp");

            match self.attempt(url, target, cookies).await {
                Ok(()) => return Ok(()),
                Err(MediaError::YtDlpNotFound) => {
                    remove_partials(target).await;
                    return Err(MediaError::YtDlpNotFound);
                }
                Err(e) => {
                    warn!(video_id = %video_id, url = %url, "yt-dlp attempt failed: {}", e);
                    last_error = e.to_string();
                }
            }
        }

        remove_partials(target).await;
        Err(MediaError::download_failed(format!(
            "yt-dlp could not fetch {}: {}",
            video_id, last_error
        )))
    }

    async fn attempt(&self, url: &str, target: &Path, cookies: Option<&Path>) -> MediaResult<()> {
        let args = self.build_args(url, target, cookies);
        debug!("Running yt-dlp: {}", args.join(" "));

        let output = Command::new(&self.options.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => MediaError::YtDlpNotFound,
                _ => MediaError::Io(e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!(exit_code = ?output.status.code(), "yt-dlp stderr: {}", stderr);
        }

        match fs_utils::file_size(target).await {
            Some(size) if size > MIN_MEDIA_FILE_SIZE => {
                info!(path = %target.display(), size, "Downloaded video");
                Ok(())
            }
            Some(size) => Err(MediaError::FileTooSmall {
                path: target.to_path_buf(),
                size,
            }),
            None => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let reason = stderr
                    .lines()
                    .rev()
                    .find(|l| !l.trim().is_empty())
                    .unwrap_or("output file not created");
                Err(MediaError::download_failed(reason.to_string()))
            }
        }
    }
}

/// `<target>.part`, the in-progress name yt-dlp writes to.
fn part_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

/// Remove an undersized target and any `.part` leftover.
async fn remove_partials(target: &Path) {
    if let Some(size) = fs_utils::file_size(target).await {
        if size <= MIN_MEDIA_FILE_SIZE {
            fs_utils::discard(target).await;
        }
    }
    fs_utils::discard(part_path(target)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn has_pair(args: &[String], flag: &str, value: &str) -> bool {
        args.windows(2).any(|w| w[0] == flag && w[1] == value)
    }

    #[test]
    fn test_args_with_cookies() {
        let downloader = YtDlpDownloader::default();
        let args = downloader.build_args(
            "https://www.youtube.com/watch?v=v1",
            Path::new("/app/Download/v1.mp4"),
            Some(Path::new("/app/youtube_cookies.txt")),
        );

        assert!(has_pair(&args, "-f", DEFAULT_FORMAT));
        assert!(has_pair(&args, "-o", "/app/Download/v1.mp4"));
        assert!(has_pair(&args, "--retries", "10"));
        assert!(has_pair(&args, "--fragment-retries", "10"));
        assert!(has_pair(&args, "--extractor-retries", "5"));
        assert!(has_pair(&args, "--file-access-retries", "5"));
        assert!(has_pair(&args, "--cookies", "/app/youtube_cookies.txt"));
        for flag in [
            "--skip-unavailable-fragments",
            "--no-playlist",
            "--no-check-certificate",
            "--hls-prefer-native",
            "--hls-use-mpegts",
        ] {
            assert!(args.iter().any(|a| a == flag), "missing {flag}");
        }
        assert!(!args.iter().any(|a| a == "--user-agent"));
        assert_eq!(args.last().unwrap(), "https://www.youtube.com/watch?v=v1");
    }

    #[test]
    fn test_args_without_cookies_send_browser_headers() {
        let args = YtDlpDownloader::default().build_args(
            "https://www.youtube.com/embed/v1",
            Path::new("v1.mp4"),
            None,
        );
        assert!(has_pair(&args, "--user-agent", BROWSER_USER_AGENT));
        assert_eq!(
            args.iter().filter(|a| *a == "--add-header").count(),
            BROWSER_HEADERS.len()
        );
        assert!(!args.iter().any(|a| a == "--cookies"));
    }

    #[test]
    fn test_part_path() {
        assert_eq!(
            part_path(Path::new("/d/v1.mp4")),
            PathBuf::from("/d/v1.mp4.part")
        );
    }

    #[tokio::test]
    async fn test_partials_removed_on_failure() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("v1.mp4");
        tokio::fs::write(&target, vec![0u8; 100]).await.unwrap();
        tokio::fs::write(part_path(&target), b"partial").await.unwrap();

        remove_partials(&target).await;

        assert!(!target.exists());
        assert!(!part_path(&target).exists());
    }

    /// Write an executable stand-in for yt-dlp that appends each URL it is
    /// given to `calls.log` and then runs `body` with `$out` set to the `-o`
    /// target and `$url` to the last argument.
    #[cfg(unix)]
    fn fake_ytdlp(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let log = dir.join("calls.log");
        let script = format!(
            r#"#!/bin/sh
out=""
prev=""
url=""
for arg in "$@"; do
  if [ "$prev" = "-o" ]; then out="$arg"; fi
  prev="$arg"
  url="$arg"
done
echo "$url" >> "{log}"
{body}
"#,
            log = log.display(),
            body = body
        );
        let path = dir.join("yt-dlp");
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    fn logged_urls(dir: &Path) -> Vec<String> {
        std::fs::read_to_string(dir.join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_embed_url_used_after_watch_url_fails() {
        let dir = TempDir::new().unwrap();
        let binary = fake_ytdlp(
            dir.path(),
            r#"case "$url" in
  */embed/*) dd if=/dev/zero of="$out" bs=1024 count=4 2>/dev/null ;;
  *) echo "ERROR: Sign in to confirm your age" >&2; exit 1 ;;
esac"#,
        );
        let downloader = YtDlpDownloader::new(YtDlpOptions {
            binary,
            ..Default::default()
        });
        let target = dir.path().join("v1.mp4");

        downloader
            .download(&VideoId::from("v1"), &target, None)
            .await
            .unwrap();

        assert_eq!(
            logged_urls(dir.path()),
            vec![
                "https://www.youtube.com/watch?v=v1".to_string(),
                "https://www.youtube.com/embed/v1".to_string(),
            ]
        );
        assert_eq!(std::fs::metadata(&target).unwrap().len(), 4096);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_with_large_file_counts_as_success() {
        let dir = TempDir::new().unwrap();
        let binary = fake_ytdlp(
            dir.path(),
            r#"dd if=/dev/zero of="$out" bs=1024 count=2 2>/dev/null
exit 1"#,
        );
        let downloader = YtDlpDownloader::new(YtDlpOptions {
            binary,
            ..Default::default()
        });
        let target = dir.path().join("v1.mp4");

        downloader
            .download(&VideoId::from("v1"), &target, None)
            .await
            .unwrap();

        assert_eq!(logged_urls(dir.path()).len(), 1);
        assert_eq!(std::fs::metadata(&target).unwrap().len(), 2048);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_both_urls_failing_removes_partials() {
        let dir = TempDir::new().unwrap();
        let binary = fake_ytdlp(
            dir.path(),
            r#"dd if=/dev/zero of="$out" bs=100 count=1 2>/dev/null
echo partial > "$out.part"
exit 1"#,
        );
        let downloader = YtDlpDownloader::new(YtDlpOptions {
            binary,
            ..Default::default()
        });
        let target = dir.path().join("v1.mp4");

        let result = downloader.download(&VideoId::from("v1"), &target, None).await;

        assert!(matches!(result, Err(MediaError::DownloadFailed { .. })));
        assert_eq!(logged_urls(dir.path()).len(), 2);
        assert!(!target.exists());
        assert!(!part_path(&target).exists());
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let dir = TempDir::new().unwrap();
        let downloader = YtDlpDownloader::new(YtDlpOptions {
            binary: PathBuf::from("/nonexistent/yt-dlp"),
            ..Default::default()
        });
        let result = downloader
            .download(&VideoId::from("v1"), &dir.path().join("v1.mp4"), None)
            .await;
        assert!(matches!(result, Err(MediaError::YtDlpNotFound)));
    }
}
