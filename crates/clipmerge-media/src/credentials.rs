//! Cookie credentials for yt-dlp.
//!
//! A [`CredentialProvider`] yields an optional Netscape cookie file. The
//! persisted file is preferred; browser harvesting is the fallback.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::fs_utils;

/// Cookie files at or below this size are treated as absent.
pub const MIN_COOKIE_FILE_SIZE: u64 = 100;

/// Video used to trigger a cookie export without downloading anything.
const PROBE_URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

/// Source of an optional cookie file for authenticated downloads.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Path of a usable cookie file, if one can be produced.
    async fn cookie_file(&self) -> Option<PathBuf>;
}

/// Never yields credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCredentials;

#[async_trait]
impl CredentialProvider for NoCredentials {
    fn name(&self) -> &'static str {
        "none"
    }

    async fn cookie_file(&self) -> Option<PathBuf> {
        None
    }
}

/// Persisted cookie file, with an optional fallback provider.
///
/// The file is only ever read.
pub struct CookieFileCredentials {
    path: PathBuf,
    fallback: Option<Arc<dyn CredentialProvider>>,
}

impl CookieFileCredentials {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            fallback: None,
        }
    }

    /// Delegate to `fallback` when the persisted file is missing or too small.
    pub fn with_fallback(mut self, fallback: Arc<dyn CredentialProvider>) -> Self {
        self.fallback = Some(fallback);
        self
    }
}

#[async_trait]
impl CredentialProvider for CookieFileCredentials {
    fn name(&self) -> &'static str {
        "cookie_file"
    }

    async fn cookie_file(&self) -> Option<PathBuf> {
        if fs_utils::exceeds(&self.path, MIN_COOKIE_FILE_SIZE).await {
            debug!(path = %self.path.display(), "Using persisted cookie file");
            return Some(self.path.clone());
        }

        match &self.fallback {
            Some(fallback) => {
                debug!(
                    path = %self.path.display(),
                    fallback = fallback.name(),
                    "No valid persisted cookie file, trying fallback"
                );
                fallback.cookie_file().await
            }
            None => None,
        }
    }
}

/// Browsers yt-dlp can read cookies from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Browser {
    Chrome,
    Chromium,
    Firefox,
    Edge,
    Brave,
    Safari,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chrome => "chrome",
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Edge => "edge",
            Browser::Brave => "brave",
            Browser::Safari => "safari",
        }
    }

    /// Browsers to try on the current platform, most likely first.
    pub fn platform_preference() -> Vec<Browser> {
        if cfg!(windows) {
            vec![Browser::Chrome, Browser::Firefox, Browser::Edge, Browser::Brave]
        } else if cfg!(target_os = "linux") {
            vec![Browser::Chrome, Browser::Firefox, Browser::Chromium, Browser::Brave]
        } else if cfg!(target_os = "macos") {
            vec![Browser::Chrome, Browser::Firefox, Browser::Safari, Browser::Brave]
        } else {
            vec![Browser::Chrome, Browser::Firefox]
        }
    }

    /// Default profile directory under `home` for this platform.
    pub fn default_profile_dir(&self, home: &Path) -> Option<PathBuf> {
        let relative = if cfg!(windows) {
            match self {
                Browser::Chrome => r"AppData\Local\Google\Chrome\User Data",
                Browser::Firefox => r"AppData\Roaming\Mozilla\Firefox\Profiles",
                Browser::Edge => r"AppData\Local\Microsoft\Edge\User Data",
                Browser::Brave => r"AppData\Local\BraveSoftware\Brave-Browser\User Data",
                _ => return None,
            }
        } else if cfg!(target_os = "macos") {
            match self {
                Browser::Chrome => "Library/Application Support/Google/Chrome",
                Browser::Firefox => "Library/Application Support/Firefox/Profiles",
                Browser::Safari => "Library/Safari",
                Browser::Brave => "Library/Application Support/BraveSoftware/Brave-Browser",
                _ => return None,
            }
        } else {
            match self {
                Browser::Chrome => ".config/google-chrome",
                Browser::Chromium => ".config/chromium",
                Browser::Firefox => ".mozilla/firefox",
                Browser::Brave => ".config/BraveSoftware/Brave-Browser",
                _ => return None,
            }
        };
        Some(home.join(relative))
    }
}

/// Load the `{"<browser>": "<profile path>"}` map.
///
/// A missing or unreadable file yields an empty map.
pub async fn load_browser_paths(path: &Path) -> HashMap<String, PathBuf> {
    #[derive(Deserialize)]
    #[serde(transparent)]
    struct BrowserPaths(HashMap<String, PathBuf>);

    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
        Err(e) => {
            warn!(path = %path.display(), "Failed to read browser paths: {}", e);
            return HashMap::new();
        }
    };

    match serde_json::from_str::<BrowserPaths>(&raw) {
        Ok(paths) => paths.0,
        Err(e) => {
            warn!(path = %path.display(), "Invalid browser paths file: {}", e);
            HashMap::new()
        }
    }
}

/// Stable partition placing browsers with a configured profile path first.
pub fn order_browsers(
    preference: &[Browser],
    custom_paths: &HashMap<String, PathBuf>,
) -> Vec<Browser> {
    let (mut with_paths, without): (Vec<Browser>, Vec<Browser>) = preference
        .iter()
        .copied()
        .partition(|b| custom_paths.contains_key(b.as_str()));
    with_paths.extend(without);
    with_paths
}

/// Exports cookies from locally installed browsers via yt-dlp.
pub struct BrowserCookieHarvester {
    ytdlp: PathBuf,
    output: PathBuf,
    browser_paths_file: PathBuf,
    timeout: Duration,
    browsers: Vec<Browser>,
    home: Option<PathBuf>,
}

impl BrowserCookieHarvester {
    /// `output` is where harvested cookies are written; it must not be the
    /// persisted cookie file.
    pub fn new(
        ytdlp: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        browser_paths_file: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        let home = directories::BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf());
        Self {
            ytdlp: ytdlp.into(),
            output: output.into(),
            browser_paths_file: browser_paths_file.into(),
            timeout,
            browsers: Browser::platform_preference(),
            home,
        }
    }

    /// Override the browser preference list.
    pub fn with_browsers(mut self, browsers: Vec<Browser>) -> Self {
        self.browsers = browsers;
        self
    }

    /// Profile path for `browser`: configured path, then the default one.
    fn profile_for(&self, browser: Browser, custom: &HashMap<String, PathBuf>) -> Option<PathBuf> {
        if let Some(path) = custom.get(browser.as_str()) {
            if path.exists() {
                return Some(path.clone());
            }
        }
        self.home
            .as_deref()
            .and_then(|home| browser.default_profile_dir(home))
            .filter(|p| p.exists())
    }

    fn harvest_args(&self, browser: Browser, profile: Option<&Path>) -> Vec<String> {
        let source = match profile {
            Some(profile) => format!("{}:{}", browser.as_str(), profile.display()),
            None => browser.as_str().to_string(),
        };
        vec![
            "--cookies-from-browser".to_string(),
            source,
            "--cookies".to_string(),
            self.output.to_string_lossy().to_string(),
            "--skip-download".to_string(),
            PROBE_URL.to_string(),
        ]
    }

    async fn try_browser(&self, browser: Browser, profile: Option<&Path>) -> bool {
        let args = self.harvest_args(browser, profile);
        debug!(browser = browser.as_str(), "Harvesting cookies: {}", args.join(" "));

        let run = Command::new(&self.ytdlp)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(self.timeout, run).await {
            Ok(Ok(output)) => {
                if fs_utils::exceeds(&self.output, MIN_COOKIE_FILE_SIZE).await {
                    return true;
                }
                let stderr = String::from_utf8_lossy(&output.stderr);
                warn!(
                    browser = browser.as_str(),
                    "Cookie extraction produced no cookies: {}",
                    stderr.lines().last().unwrap_or_default()
                );
            }
            Ok(Err(e)) => warn!(browser = browser.as_str(), "Failed to run yt-dlp: {}", e),
            Err(_) => warn!(
                browser = browser.as_str(),
                "Cookie extraction timed out after {}s",
                self.timeout.as_secs()
            ),
        }
        false
    }
}

#[async_trait]
impl CredentialProvider for BrowserCookieHarvester {
    fn name(&self) -> &'static str {
        "browser_harvest"
    }

    async fn cookie_file(&self) -> Option<PathBuf> {
        if fs_utils::exceeds(&self.output, MIN_COOKIE_FILE_SIZE).await {
            return Some(self.output.clone());
        }

        let custom = load_browser_paths(&self.browser_paths_file).await;
        for browser in order_browsers(&self.browsers, &custom) {
            let profile = self.profile_for(browser, &custom);
            if self.try_browser(browser, profile.as_deref()).await {
                info!(browser = browser.as_str(), "Harvested browser cookies");
                return Some(self.output.clone());
            }
        }

        warn!("No browser yielded usable cookies");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_cookie_file_requires_minimum_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("youtube_cookies.txt");

        tokio::fs::write(&path, vec![b'#'; 100]).await.unwrap();
        let provider = CookieFileCredentials::new(&path);
        assert_eq!(provider.cookie_file().await, None);

        tokio::fs::write(&path, vec![b'#'; 101]).await.unwrap();
        assert_eq!(provider.cookie_file().await, Some(path));
    }

    #[tokio::test]
    async fn test_cookie_file_falls_back() {
        struct Fixed(PathBuf);

        #[async_trait]
        impl CredentialProvider for Fixed {
            fn name(&self) -> &'static str {
                "fixed"
            }
            async fn cookie_file(&self) -> Option<PathBuf> {
                Some(self.0.clone())
            }
        }

        let dir = TempDir::new().unwrap();
        let harvested = dir.path().join("harvested.txt");
        let provider = CookieFileCredentials::new(dir.path().join("missing.txt"))
            .with_fallback(Arc::new(Fixed(harvested.clone())));
        assert_eq!(provider.cookie_file().await, Some(harvested));
    }

    #[tokio::test]
    async fn test_no_credentials() {
        assert_eq!(NoCredentials.cookie_file().await, None);
    }

    #[test]
    fn test_browsers_with_custom_paths_come_first() {
        let mut custom = HashMap::new();
        custom.insert("brave".to_string(), PathBuf::from("/profiles/brave"));
        custom.insert("firefox".to_string(), PathBuf::from("/profiles/ff"));

        let ordered = order_browsers(
            &[Browser::Chrome, Browser::Firefox, Browser::Chromium, Browser::Brave],
            &custom,
        );
        assert_eq!(
            ordered,
            vec![Browser::Firefox, Browser::Brave, Browser::Chrome, Browser::Chromium]
        );
    }

    #[tokio::test]
    async fn test_load_browser_paths() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("browser_paths.json");
        assert!(load_browser_paths(&file).await.is_empty());

        tokio::fs::write(&file, r#"{"chrome": "/home/u/.config/google-chrome"}"#)
            .await
            .unwrap();
        let paths = load_browser_paths(&file).await;
        assert_eq!(
            paths.get("chrome"),
            Some(&PathBuf::from("/home/u/.config/google-chrome"))
        );

        tokio::fs::write(&file, "not json").await.unwrap();
        assert!(load_browser_paths(&file).await.is_empty());
    }

    #[test]
    fn test_harvest_args() {
        let harvester = BrowserCookieHarvester::new(
            "yt-dlp",
            "/tmp/browser_cookies.txt",
            "/app/browser_paths.json",
            Duration::from_secs(20),
        );
        let args = harvester.harvest_args(Browser::Firefox, Some(Path::new("/p/ff")));
        assert_eq!(
            args,
            vec![
                "--cookies-from-browser",
                "firefox:/p/ff",
                "--cookies",
                "/tmp/browser_cookies.txt",
                "--skip-download",
                PROBE_URL,
            ]
        );
        assert_eq!(harvester.harvest_args(Browser::Chrome, None)[1], "chrome");
    }

    #[tokio::test]
    async fn test_harvest_skips_failing_browsers() {
        let dir = TempDir::new().unwrap();
        let harvester = BrowserCookieHarvester::new(
            "/nonexistent/yt-dlp",
            dir.path().join("cookies.txt"),
            dir.path().join("browser_paths.json"),
            Duration::from_secs(1),
        )
        .with_browsers(vec![Browser::Chrome, Browser::Firefox]);
        assert_eq!(harvester.cookie_file().await, None);
    }
}
