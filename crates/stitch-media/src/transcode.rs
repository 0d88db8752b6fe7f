//! Segment transcoding to the fixed intermediate profile.
//!
//! Every intermediate is re-encoded to identical container, codec, pixel
//! format, frame rate and audio layout so the final join can stream-copy.
//! Placeholder and title cards are synthesized with lavfi sources at the
//! same profile.

use std::path::Path;
use tokio::sync::watch;
use tracing::info;

use stitch_models::profile::{
    AUDIO_BITRATE, AUDIO_CHANNELS, AUDIO_SAMPLE_RATE, FRAME_RATE, H264_LEVEL, H264_PROFILE,
    PIXEL_FORMAT,
};
use stitch_models::MediaProfile;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;

/// Hard cap per transcode invocation, seconds.
pub const TRANSCODE_TIMEOUT_SECS: u64 = 120;

/// Default placeholder card duration, seconds.
pub const PLACEHOLDER_DURATION: f64 = 1.0;

/// Default intro/outro card duration, seconds.
pub const TITLE_CARD_DURATION: f64 = 2.0;

/// Loudness normalization filter (−16 LUFS integrated).
const LOUDNORM_FILTER: &str = "loudnorm=I=-16:TP=-1.5:LRA=11";

/// Per-segment options on top of the profile.
#[derive(Debug, Clone, Default)]
pub struct TranscodeOptions {
    /// Trim window within the source file, `(start, duration)` seconds
    pub trim: Option<(f64, f64)>,
    /// Caption burned into the lower third
    pub subtitle: Option<String>,
    /// Small overlay text in the top-right corner
    pub watermark: Option<String>,
}

/// Encodes segments and synthesized cards to the intermediate profile.
#[derive(Debug, Clone)]
pub struct Transcoder {
    profile: MediaProfile,
}

impl Transcoder {
    pub fn new(profile: MediaProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &MediaProfile {
        &self.profile
    }

    /// Re-encode `input` to the profile.
    pub async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        opts: &TranscodeOptions,
        cancel: Option<watch::Receiver<bool>>,
    ) -> MediaResult<()> {
        info!(
            input = %input.display(),
            output = %output.display(),
            "Transcoding segment to profile"
        );

        let mut cmd = FfmpegCommand::new(output);
        if let Some((start, duration)) = opts.trim {
            cmd = cmd.seek(start.max(0.0)).duration(duration);
        }
        cmd = cmd
            .input(input)
            .video_filter(self.video_filter(opts.subtitle.as_deref(), opts.watermark.as_deref()));

        if self.profile.encoding.normalize_audio {
            cmd = cmd.audio_filter(LOUDNORM_FILTER);
        }
        cmd = cmd.output_args(self.encode_args());

        self.runner(cancel).run(&cmd).await
    }

    /// Render a solid-color card with centered text and silent audio.
    pub async fn render_placeholder(
        &self,
        text: &str,
        duration: f64,
        output: &Path,
        cancel: Option<watch::Receiver<bool>>,
    ) -> MediaResult<()> {
        self.render_card(text, duration, 56, output, cancel).await
    }

    /// Render an intro/outro title card.
    pub async fn render_title_card(
        &self,
        text: &str,
        duration: f64,
        output: &Path,
        cancel: Option<watch::Receiver<bool>>,
    ) -> MediaResult<()> {
        self.render_card(text, duration, 64, output, cancel).await
    }

    async fn render_card(
        &self,
        text: &str,
        duration: f64,
        font_size: u32,
        output: &Path,
        cancel: Option<watch::Receiver<bool>>,
    ) -> MediaResult<()> {
        let (width, height) = self.profile.aspect.resolution();
        info!(text = %text, duration, output = %output.display(), "Rendering card");

        let draw = format!(
            "drawtext=text='{}':fontcolor=white:fontsize={}:x=(w-text_w)/2:y=(h-text_h)/2",
            escape_drawtext(text),
            font_size
        );

        let cmd = FfmpegCommand::new(output)
            .lavfi_input(format!(
                "color=c=black:s={}x{}:r={}:d={:.3}",
                width, height, FRAME_RATE, duration
            ))
            .input_arg("-t")
            .input_arg(format!("{:.3}", duration))
            .lavfi_input(format!(
                "anullsrc=r={}:cl=stereo",
                AUDIO_SAMPLE_RATE
            ))
            .video_filter(draw)
            .output_args(self.encode_args())
            .output_arg("-shortest");

        self.runner(cancel).run(&cmd).await
    }

    /// Scale-and-pad chain to the profile geometry, plus optional text
    /// overlays.
    fn video_filter(&self, subtitle: Option<&str>, watermark: Option<&str>) -> String {
        let (width, height) = self.profile.aspect.resolution();
        let mut filter = format!(
            "scale={w}:{h}:force_original_aspect_ratio=decrease,\
             pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,fps={fps},format={pix}",
            w = width,
            h = height,
            fps = FRAME_RATE,
            pix = PIXEL_FORMAT,
        );

        if let Some(text) = subtitle {
            filter.push_str(&format!(
                ",drawtext=text='{}':fontcolor=white:fontsize=42:borderw=2:bordercolor=black:\
                 x=(w-text_w)/2:y=h-text_h-48",
                escape_drawtext(text)
            ));
        }
        if let Some(text) = watermark {
            filter.push_str(&format!(
                ",drawtext=text='{}':fontcolor=white@0.6:fontsize=28:x=w-text_w-24:y=24",
                escape_drawtext(text)
            ));
        }
        filter
    }

    /// Fixed encoder arguments shared by every intermediate.
    fn encode_args(&self) -> Vec<String> {
        let enc = &self.profile.encoding;
        vec![
            "-c:v".to_string(),
            "libx264".to_string(),
            "-profile:v".to_string(),
            H264_PROFILE.to_string(),
            "-level".to_string(),
            H264_LEVEL.to_string(),
            "-preset".to_string(),
            enc.preset.clone(),
            "-crf".to_string(),
            enc.crf.to_string(),
            "-pix_fmt".to_string(),
            PIXEL_FORMAT.to_string(),
            "-r".to_string(),
            FRAME_RATE.to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            AUDIO_BITRATE.to_string(),
            "-ar".to_string(),
            AUDIO_SAMPLE_RATE.to_string(),
            "-ac".to_string(),
            AUDIO_CHANNELS.to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
        ]
    }

    fn runner(&self, cancel: Option<watch::Receiver<bool>>) -> FfmpegRunner {
        let mut runner = FfmpegRunner::new().with_timeout(TRANSCODE_TIMEOUT_SECS);
        if let Some(rx) = cancel {
            runner = runner.with_cancel(rx);
        }
        runner
    }
}

/// Escape text for an ffmpeg drawtext filter argument.
fn escape_drawtext(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace(':', "\\:")
        .replace('%', "\\%")
        .replace('\n', " ")
}
