//! Pipeline configuration.

use std::path::PathBuf;

use stitch_media::{EnhancerConfig, FetcherConfig};
use stitch_models::MediaProfile;

/// Configuration for one pipeline instance, loaded once at startup.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Where finished videos land
    pub output_dir: PathBuf,
    /// Root for per-job scratch directories
    pub temp_dir: PathBuf,
    /// Longest phrase the planner will try, clamped to 1..=50
    pub max_phrase_length: usize,
    /// Padding before each clip's start, seconds
    pub clip_padding_start: f64,
    /// Padding after each clip's end, seconds
    pub clip_padding_end: f64,
    /// Concurrent segment downloads
    pub fetch_workers: usize,
    /// Concurrent transcodes
    pub transcode_workers: usize,
    /// Target profile for all intermediates
    pub profile: MediaProfile,
    /// Burn each pick's text into its segment
    pub add_subtitles: bool,
    pub watermark_text: Option<String>,
    pub intro_text: Option<String>,
    pub outro_text: Option<String>,
    /// Restrict clip selection to these channels when non-empty
    pub preferred_channels: Vec<String>,
    /// Substitute placeholder cards for missing/failed picks
    pub allow_placeholders: bool,
    /// Treat any per-pick failure as fatal
    pub fail_on_any: bool,
    /// Remove job scratch directories on exit
    pub cleanup_temp: bool,
    /// Verify ffmpeg/ffprobe/yt-dlp exist before running
    pub verify_tools: bool,
    /// Force the incremental concat fold regardless of input count
    pub force_incremental_concat: bool,
    /// Enable the audio enhancement round-trip
    pub enhance: Option<EnhancerConfig>,
    /// Keep the pre-enhancement file next to the enhanced one
    pub keep_original_audio: bool,
    pub fetcher: FetcherConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./output"),
            temp_dir: PathBuf::from("./temp"),
            max_phrase_length: 10,
            clip_padding_start: 0.15,
            clip_padding_end: 0.15,
            fetch_workers: 3,
            transcode_workers: 4,
            profile: MediaProfile::default(),
            add_subtitles: false,
            watermark_text: None,
            intro_text: None,
            outro_text: None,
            preferred_channels: Vec::new(),
            allow_placeholders: true,
            fail_on_any: false,
            cleanup_temp: true,
            verify_tools: true,
            force_incremental_concat: false,
            enhance: None,
            keep_original_audio: false,
            fetcher: FetcherConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Build from environment variables, falling back to defaults.
    ///
    /// Reads `OUTPUT_DIR`, `TEMP_DIR`, `COOKIES_FROM_BROWSER` and
    /// `AUPHONIC_API_TOKEN`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("OUTPUT_DIR") {
            if !dir.trim().is_empty() {
                config.output_dir = PathBuf::from(dir);
            }
        }
        if let Ok(dir) = std::env::var("TEMP_DIR") {
            if !dir.trim().is_empty() {
                config.temp_dir = PathBuf::from(dir);
            }
        }
        config.fetcher.cookies = stitch_media::CookieSource::from_env();
        config.enhance = EnhancerConfig::from_env();

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = PipelineConfig::default();
        assert_eq!(config.max_phrase_length, 10);
        assert_eq!(config.fetch_workers, 3);
        assert_eq!(config.transcode_workers, 4);
        assert!((config.clip_padding_start - 0.15).abs() < 1e-9);
        assert!(config.allow_placeholders);
        assert!(config.cleanup_temp);
        assert!(config.enhance.is_none());
    }
}
