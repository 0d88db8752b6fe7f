//! The fixed intermediate media profile.
//!
//! Every intermediate artifact and the final output share one container,
//! codec, pixel format, frame rate and audio layout. This is the
//! precondition that lets the concatenator stream-copy.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default video codec (H.264)
pub const VIDEO_CODEC: &str = "libx264";
/// H.264 profile for broad playback compatibility
pub const H264_PROFILE: &str = "high";
/// H.264 level
pub const H264_LEVEL: &str = "3.1";
/// Pixel format required for stream-copy concatenation
pub const PIXEL_FORMAT: &str = "yuv420p";
/// Constant output frame rate
pub const FRAME_RATE: u32 = 30;
/// Audio codec (AAC-LC)
pub const AUDIO_CODEC: &str = "aac";
/// Audio sample rate, Hz
pub const AUDIO_SAMPLE_RATE: u32 = 48_000;
/// Audio channel count (stereo)
pub const AUDIO_CHANNELS: u32 = 2;
/// Audio bitrate
pub const AUDIO_BITRATE: &str = "128k";
/// Integrated loudness target when normalization is enabled, LUFS
pub const LOUDNESS_TARGET: i32 = -16;

/// Target output aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "1:1")]
    Square,
}

impl AspectRatio {
    /// Profile resolution for this aspect, `(width, height)`.
    pub fn resolution(&self) -> (u32, u32) {
        match self {
            AspectRatio::Landscape => (1280, 720),
            AspectRatio::Portrait => (720, 1280),
            AspectRatio::Square => (720, 720),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("invalid aspect ratio '{0}' (expected 16:9, 9:16 or 1:1)")]
pub struct AspectRatioError(pub String);

impl FromStr for AspectRatio {
    type Err = AspectRatioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "16:9" => Ok(AspectRatio::Landscape),
            "9:16" => Ok(AspectRatio::Portrait),
            "1:1" => Ok(AspectRatio::Square),
            other => Err(AspectRatioError(other.to_string())),
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
            AspectRatio::Square => "1:1",
        };
        write!(f, "{}", s)
    }
}

/// Encoding knobs that vary per deployment without breaking the profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodingSettings {
    /// Encoder preset (speed/size tradeoff)
    pub preset: String,
    /// Constant Rate Factor, lower is better quality
    pub crf: u8,
    /// Apply per-clip loudness normalization
    pub normalize_audio: bool,
}

impl Default for EncodingSettings {
    fn default() -> Self {
        Self {
            preset: "fast".to_string(),
            crf: 23,
            normalize_audio: true,
        }
    }
}

/// The complete intermediate profile: aspect-dependent geometry plus the
/// fixed codec parameters above.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaProfile {
    pub aspect: AspectRatio,
    pub encoding: EncodingSettings,
}

impl Default for MediaProfile {
    fn default() -> Self {
        Self {
            aspect: AspectRatio::Landscape,
            encoding: EncodingSettings::default(),
        }
    }
}

impl MediaProfile {
    pub fn with_aspect(aspect: AspectRatio) -> Self {
        Self {
            aspect,
            ..Default::default()
        }
    }

    pub fn width(&self) -> u32 {
        self.aspect.resolution().0
    }

    pub fn height(&self) -> u32 {
        self.aspect.resolution().1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect_resolutions() {
        assert_eq!(AspectRatio::Landscape.resolution(), (1280, 720));
        assert_eq!(AspectRatio::Portrait.resolution(), (720, 1280));
        assert_eq!(AspectRatio::Square.resolution(), (720, 720));
    }

    #[test]
    fn test_aspect_parse_round_trip() {
        for s in ["16:9", "9:16", "1:1"] {
            let aspect: AspectRatio = s.parse().unwrap();
            assert_eq!(aspect.to_string(), s);
        }
        assert!("4:3".parse::<AspectRatio>().is_err());
    }

    #[test]
    fn test_aspect_serde_rename() {
        let json = serde_json::to_string(&AspectRatio::Portrait).unwrap();
        assert_eq!(json, "\"9:16\"");
        let parsed: AspectRatio = serde_json::from_str("\"1:1\"").unwrap();
        assert_eq!(parsed, AspectRatio::Square);
    }

    #[test]
    fn test_profile_dimensions() {
        let profile = MediaProfile::with_aspect(AspectRatio::Portrait);
        assert_eq!((profile.width(), profile.height()), (720, 1280));
    }
}
