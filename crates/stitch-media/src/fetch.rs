//! Source segment fetching via yt-dlp.
//!
//! Downloads a padded time range of a source video into a local cache
//! directory. Transient failures (network, 5xx, rate limiting) are
//! retried with exponential backoff; permanent failures (removed,
//! private, region-locked) are surfaced immediately and left to the
//! caller to substitute.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use stitch_models::VideoId;

use crate::error::{FetchErrorKind, MediaError, MediaResult};

/// Browsers yt-dlp can extract cookies from.
pub const SUPPORTED_BROWSERS: &[&str] = &[
    "chrome", "firefox", "safari", "edge", "chromium", "opera", "brave",
];

/// Where yt-dlp gets its authentication cookies.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CookieSource {
    /// No cookies; anonymous requests only
    #[default]
    None,
    /// Extract from a local browser profile (`--cookies-from-browser`)
    Browser(String),
    /// Netscape cookie jar file (`--cookies`)
    Jar(PathBuf),
}

impl CookieSource {
    /// Read `COOKIES_FROM_BROWSER`; empty or unknown values mean no cookies.
    pub fn from_env() -> Self {
        match std::env::var("COOKIES_FROM_BROWSER") {
            Ok(name) if !name.trim().is_empty() => {
                let name = name.trim().to_lowercase();
                if SUPPORTED_BROWSERS.contains(&name.as_str()) {
                    CookieSource::Browser(name)
                } else {
                    warn!(browser = %name, "Unsupported browser for cookie extraction, ignoring");
                    CookieSource::None
                }
            }
            _ => CookieSource::None,
        }
    }

    fn extend_args(&self, args: &mut Vec<String>) {
        match self {
            CookieSource::None => {}
            CookieSource::Browser(name) => {
                args.push("--cookies-from-browser".to_string());
                args.push(name.clone());
            }
            CookieSource::Jar(path) => {
                args.push("--cookies".to_string());
                args.push(path.to_string_lossy().to_string());
            }
        }
    }
}

/// Fetcher configuration, fixed per process.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// yt-dlp format selector
    pub format: String,
    pub cookies: CookieSource,
    /// Total attempts per segment (initial + retries)
    pub max_attempts: u32,
    /// First retry delay; doubles each attempt
    pub base_backoff: Duration,
    /// Hard cap per download attempt
    pub attempt_timeout: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            format: "bestvideo[height<=720]+bestaudio/best[height<=720]".to_string(),
            cookies: CookieSource::None,
            max_attempts: 3,
            base_backoff: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(60),
        }
    }
}

/// Downloads padded segments of source videos with a per-directory cache.
#[derive(Debug, Clone)]
pub struct SegmentFetcher {
    config: FetcherConfig,
}

impl SegmentFetcher {
    pub fn new(config: FetcherConfig) -> Self {
        Self { config }
    }

    /// Fetch `[start - padding_start, end + padding_end)` of a video into
    /// `dest_dir`, clamped at zero. Returns the cached file when the same
    /// range was already downloaded.
    pub async fn fetch(
        &self,
        video_id: &VideoId,
        start: f64,
        end: f64,
        padding_start: f64,
        padding_end: f64,
        dest_dir: &Path,
        cancel: Option<watch::Receiver<bool>>,
    ) -> MediaResult<PathBuf> {
        which::which("yt-dlp").map_err(|_| MediaError::YtDlpNotFound)?;

        let padded_start = (start - padding_start).max(0.0);
        let padded_end = (end + padding_end).max(padded_start);

        let stem = segment_stem(video_id, padded_start, padded_end);
        let dest = dest_dir.join(format!("{stem}.mp4"));
        if dest.exists() {
            debug!(path = %dest.display(), "Using cached segment");
            return Ok(dest);
        }
        tokio::fs::create_dir_all(dest_dir).await?;

        let url = video_id.watch_url();
        let mut last_err = None;

        for attempt in 1..=self.config.max_attempts {
            if is_cancelled(&cancel) {
                return Err(MediaError::Cancelled);
            }

            match self
                .attempt_download(&url, padded_start, padded_end, dest_dir, &stem, &cancel)
                .await
            {
                Ok(path) => {
                    info!(
                        video_id = %video_id,
                        start = padded_start,
                        end = padded_end,
                        attempt,
                        "Segment downloaded"
                    );
                    return Ok(path);
                }
                Err(e @ MediaError::Cancelled) => return Err(e),
                Err(e) if e.is_transient() && attempt < self.config.max_attempts => {
                    let delay = self.config.base_backoff * 2u32.pow(attempt - 1);
                    warn!(
                        video_id = %video_id,
                        attempt,
                        delay_secs = delay.as_secs(),
                        error = %e,
                        "Transient fetch failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or_else(|| {
            MediaError::fetch_failed(FetchErrorKind::Transient, "retries exhausted")
        }))
    }

    async fn attempt_download(
        &self,
        url: &str,
        start: f64,
        end: f64,
        dest_dir: &Path,
        stem: &str,
        cancel: &Option<watch::Receiver<bool>>,
    ) -> MediaResult<PathBuf> {
        let template = dest_dir.join(format!("{stem}.%(ext)s"));
        let args = self.build_args(url, start, end, &template);

        debug!("Running yt-dlp {}", args.join(" "));

        let child = Command::new("yt-dlp")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let wait = tokio::time::timeout(self.config.attempt_timeout, child.wait_with_output());
        let output = tokio::select! {
            result = wait => match result {
                Ok(output) => output?,
                Err(_) => {
                    return Err(MediaError::Timeout(self.config.attempt_timeout.as_secs()));
                }
            },
            _ = wait_cancel(cancel.clone()) => return Err(MediaError::Cancelled),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("yt-dlp stderr: {}", stderr);
            let kind = classify_ytdlp_failure(&stderr);
            let message = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("unknown error")
                .to_string();
            return Err(MediaError::fetch_failed(kind, message));
        }

        find_downloaded(dest_dir, stem).await.ok_or_else(|| {
            MediaError::fetch_failed(FetchErrorKind::Transient, "output file not created")
        })
    }

    /// Assemble the yt-dlp argv for one segment download.
    fn build_args(&self, url: &str, start: f64, end: f64, template: &Path) -> Vec<String> {
        let mut args = vec![
            "--quiet".to_string(),
            "--no-warnings".to_string(),
            "--no-playlist".to_string(),
            "--retries".to_string(),
            "0".to_string(),
            "--socket-timeout".to_string(),
            "30".to_string(),
            "-f".to_string(),
            self.config.format.clone(),
            "--download-sections".to_string(),
            format!("*{:.2}-{:.2}", start, end),
            "--force-keyframes-at-cuts".to_string(),
            "--merge-output-format".to_string(),
            "mp4".to_string(),
            "-o".to_string(),
            template.to_string_lossy().to_string(),
        ];
        self.config.cookies.extend_args(&mut args);
        args.push(url.to_string());
        args
    }
}

/// Stable cache stem for a padded range.
fn segment_stem(video_id: &VideoId, start: f64, end: f64) -> String {
    format!("{}_{:08}_{:08}", video_id, (start * 1000.0) as u64, (end * 1000.0) as u64)
}

/// Locate the merged download, skipping partial files.
async fn find_downloaded(dir: &Path, stem: &str) -> Option<PathBuf> {
    let exact = dir.join(format!("{stem}.mp4"));
    if exact.exists() {
        return Some(exact);
    }

    let mut entries = tokio::fs::read_dir(dir).await.ok()?;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(stem) && !name.ends_with(".part") && !name.ends_with(".ytdl") {
            return Some(entry.path());
        }
    }
    None
}

/// Decide whether a yt-dlp failure is worth retrying.
fn classify_ytdlp_failure(stderr: &str) -> FetchErrorKind {
    const PERMANENT: &[&str] = &[
        "Video unavailable",
        "Private video",
        "has been removed",
        "This video is not available",
        "account associated with this video has been terminated",
        "HTTP Error 404",
        "HTTP Error 410",
        "HTTP Error 403",
        "not available in your country",
        "Sign in to confirm your age",
    ];

    if PERMANENT.iter().any(|m| stderr.contains(m)) {
        FetchErrorKind::Permanent
    } else {
        // Network errors, 5xx, 429s and anything unrecognized get a retry
        FetchErrorKind::Transient
    }
}

fn is_cancelled(cancel: &Option<watch::Receiver<bool>>) -> bool {
    cancel.as_ref().is_some_and(|rx| *rx.borrow())
}

async fn wait_cancel(rx: Option<watch::Receiver<bool>>) {
    match rx {
        Some(mut rx) => {
            while !*rx.borrow() {
                if rx.changed().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_stem_is_stable() {
        let id = VideoId::new("abc123def45");
        assert_eq!(
            segment_stem(&id, 1.5, 3.25),
            segment_stem(&id, 1.5, 3.25)
        );
        assert_ne!(segment_stem(&id, 1.5, 3.25), segment_stem(&id, 1.5, 3.3));
    }

    #[test]
    fn test_build_args_section_and_format() {
        let fetcher = SegmentFetcher::new(FetcherConfig::default());
        let args = fetcher.build_args(
            "https://www.youtube.com/watch?v=abc123def45",
            1.5,
            3.25,
            Path::new("/tmp/seg.%(ext)s"),
        );
        assert!(args.contains(&"*1.50-3.25".to_string()));
        assert!(args.contains(&"--force-keyframes-at-cuts".to_string()));
        assert_eq!(args.last().unwrap(), "https://www.youtube.com/watch?v=abc123def45");
        // Our retry loop owns retries, not yt-dlp's
        let retries = args.iter().position(|a| a == "--retries").unwrap();
        assert_eq!(args[retries + 1], "0");
    }

    #[test]
    fn test_cookie_args() {
        let mut args = Vec::new();
        CookieSource::Browser("firefox".to_string()).extend_args(&mut args);
        assert_eq!(args, vec!["--cookies-from-browser", "firefox"]);

        let mut args = Vec::new();
        CookieSource::Jar(PathBuf::from("/tmp/jar.txt")).extend_args(&mut args);
        assert_eq!(args, vec!["--cookies", "/tmp/jar.txt"]);

        let mut args = Vec::new();
        CookieSource::None.extend_args(&mut args);
        assert!(args.is_empty());
    }

    #[test]
    fn test_classify_permanent_failures() {
        for stderr in [
            "ERROR: Video unavailable",
            "ERROR: Private video. Sign in if you've been granted access",
            "ERROR: HTTP Error 404: Not Found",
            "ERROR: This video is not available in your country",
        ] {
            assert_eq!(classify_ytdlp_failure(stderr), FetchErrorKind::Permanent);
        }
    }

    #[test]
    fn test_classify_transient_failures() {
        for stderr in [
            "ERROR: HTTP Error 429: Too Many Requests",
            "ERROR: HTTP Error 503: Service Unavailable",
            "ERROR: unable to download video data: timed out",
            "ERROR: something nobody has seen before",
        ] {
            assert_eq!(classify_ytdlp_failure(stderr), FetchErrorKind::Transient);
        }
    }

    #[test]
    fn test_cookie_source_padding_clamp_stems() {
        // Padded start below zero clamps, reflected in the stem
        let id = VideoId::new("abc123def45");
        let stem_zero = segment_stem(&id, 0.0, 1.0);
        assert!(stem_zero.contains("00000000"));
    }
}
