//! Media operations for the wordstitch pipeline.
//!
//! Wraps the external tools the pipeline shells out to:
//! - yt-dlp for fetching padded source segments ([`fetch`])
//! - ffmpeg for transcoding to the fixed profile, card synthesis and
//!   concatenation ([`transcode`], [`concat`], [`command`])
//! - ffprobe for media inspection ([`probe`])
//! - the Auphonic API for optional audio enhancement ([`enhance`])

pub mod command;
pub mod concat;
pub mod enhance;
pub mod error;
pub mod fetch;
pub mod fs_utils;
pub mod probe;
pub mod transcode;

pub use command::{check_ffmpeg, check_ffprobe, check_ytdlp, FfmpegCommand, FfmpegRunner};
pub use concat::{Concatenator, INCREMENTAL_THRESHOLD};
pub use enhance::{AudioEnhancer, EnhancerConfig};
pub use error::{FetchErrorKind, MediaError, MediaResult};
pub use fetch::{CookieSource, FetcherConfig, SegmentFetcher};
pub use probe::MediaInfo;
pub use transcode::{
    TranscodeOptions, Transcoder, PLACEHOLDER_DURATION, TITLE_CARD_DURATION,
};
