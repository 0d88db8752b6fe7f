//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Whether a fetch failure is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// Network hiccup, 5xx, rate limit: retry with backoff
    Transient,
    /// Removed, private, region-locked: do not retry
    Permanent,
}

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("ffmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("ffprobe not found in PATH")]
    FfprobeNotFound,

    #[error("yt-dlp not found in PATH")]
    YtDlpNotFound,

    #[error("ffmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("ffprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("fetch failed: {message}")]
    FetchFailed {
        kind: FetchErrorKind,
        message: String,
    },

    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("invalid video file: {0}")]
    InvalidVideo(String),

    #[error("audio enhancement failed: {0}")]
    EnhanceFailed(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl MediaError {
    /// Create an ffmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create a fetch failure of the given kind.
    pub fn fetch_failed(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self::FetchFailed {
            kind,
            message: message.into(),
        }
    }

    /// Create an enhancement failure error.
    pub fn enhance_failed(message: impl Into<String>) -> Self {
        Self::EnhanceFailed(message.into())
    }

    /// True when a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            MediaError::FetchFailed {
                kind: FetchErrorKind::Transient,
                ..
            } | MediaError::Timeout(_)
                | MediaError::Io(_)
        )
    }
}
