//! Auphonic audio enhancement round-trip.
//!
//! The output's audio track is extracted, submitted to the Auphonic API
//! with a fixed speech preset (noise reduction, hum removal, loudness
//! −16 LUFS), polled to completion, downloaded and muxed back over the
//! video. Every failure here is recoverable: callers fall back to the
//! unenhanced file.

use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::Deserialize;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Enhancement configuration; `api_token` comes from `AUPHONIC_API_TOKEN`.
#[derive(Debug, Clone)]
pub struct EnhancerConfig {
    pub api_token: String,
    pub api_url: String,
    /// Delay between status polls
    pub poll_interval: Duration,
    /// Total budget for the remote job
    pub total_budget: Duration,
    /// Integrated loudness target, LUFS
    pub loudness_target: i32,
    /// Auphonic denoise method (classic | static | dynamic | speech_isolation)
    pub denoise_method: String,
    /// Noise reduction amount, dB (0 = auto)
    pub denoise_amount: i32,
    /// Hum reduction amount, dB (0 = auto)
    pub dehum_amount: i32,
    /// Intermediate audio format submitted and returned
    pub output_format: String,
    pub output_bitrate: u32,
}

impl EnhancerConfig {
    /// Build from the environment; `None` when no token is configured.
    pub fn from_env() -> Option<Self> {
        let api_token = std::env::var("AUPHONIC_API_TOKEN").ok()?;
        if api_token.trim().is_empty() {
            return None;
        }
        Some(Self::with_token(api_token))
    }

    pub fn with_token(api_token: impl Into<String>) -> Self {
        Self {
            api_token: api_token.into(),
            api_url: "https://auphonic.com/api".to_string(),
            poll_interval: Duration::from_secs(5),
            total_budget: Duration::from_secs(600),
            loudness_target: -16,
            denoise_method: "dynamic".to_string(),
            denoise_amount: 6,
            dehum_amount: 6,
            output_format: "mp3".to_string(),
            output_bitrate: 192,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    data: ProductionData,
}

#[derive(Debug, Deserialize, Default)]
struct ProductionData {
    #[serde(default)]
    uuid: String,
    #[serde(default)]
    status_string: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    output_files: Vec<OutputFile>,
}

#[derive(Debug, Deserialize)]
struct OutputFile {
    download_url: String,
}

/// Client for the Auphonic enhancement service.
#[derive(Debug, Clone)]
pub struct AudioEnhancer {
    config: EnhancerConfig,
    client: reqwest::Client,
}

impl AudioEnhancer {
    pub fn new(config: EnhancerConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Full round-trip: returns the path of a new video file whose audio
    /// track has been replaced with the enhanced one.
    ///
    /// The cancel flag is observed between steps, on every poll of the
    /// remote job, and by both ffmpeg invocations.
    pub async fn enhance_video(
        &self,
        video: &Path,
        scratch: &Path,
        cancel: Option<watch::Receiver<bool>>,
    ) -> MediaResult<PathBuf> {
        tokio::fs::create_dir_all(scratch).await?;
        let raw_audio = scratch.join("enhance_input.mp3");
        let enhanced_audio = scratch.join("enhance_output.mp3");
        let enhanced_video = scratch.join("enhanced.mp4");

        info!(video = %video.display(), "Starting audio enhancement");

        extract_audio(video, &raw_audio, cancel.clone()).await?;

        ensure_not_cancelled(&cancel)?;
        let uuid = self.create_production(&raw_audio).await?;
        self.upload(&uuid, &raw_audio).await?;
        self.start(&uuid).await?;
        self.wait_for_completion(&uuid, &cancel).await?;
        ensure_not_cancelled(&cancel)?;
        self.download_result(&uuid, &enhanced_audio).await?;

        mux_audio(video, &enhanced_audio, &enhanced_video, cancel).await?;

        info!(video = %enhanced_video.display(), "Audio enhancement complete");
        Ok(enhanced_video)
    }

    async fn create_production(&self, input: &Path) -> MediaResult<String> {
        if !input.exists() {
            return Err(MediaError::FileNotFound(input.to_path_buf()));
        }

        let title = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "wordstitch".to_string());
        let payload = serde_json::json!({
            "metadata": { "title": title },
            "algorithms": self.algorithms_payload(),
            "output_files": [{
                "format": self.config.output_format,
                "bitrate": self.config.output_bitrate,
            }],
        });

        debug!("Creating production");
        let response = self
            .client
            .post(format!("{}/productions.json", self.config.api_url))
            .bearer_auth(&self.config.api_token)
            .json(&payload)
            .timeout(Duration::from_secs(30))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(MediaError::enhance_failed(
                "authentication failed, check the API token",
            ));
        }
        if !response.status().is_success() {
            return Err(MediaError::enhance_failed(format!(
                "create production returned HTTP {}",
                response.status()
            )));
        }

        let envelope: ApiEnvelope = response.json().await?;
        info!(uuid = %envelope.data.uuid, "Production created");
        Ok(envelope.data.uuid)
    }

    async fn upload(&self, uuid: &str, input: &Path) -> MediaResult<()> {
        let bytes = tokio::fs::read(input).await?;
        debug!(size_mb = bytes.len() as f64 / (1024.0 * 1024.0), "Uploading audio");

        let file_name = input
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio.mp3".to_string());
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("audio/mpeg")
            .map_err(|e| MediaError::enhance_failed(format!("bad mime type: {e}")))?;
        let form = reqwest::multipart::Form::new().part("input_file", part);

        let response = self
            .client
            .post(format!(
                "{}/production/{}/upload.json",
                self.config.api_url, uuid
            ))
            .bearer_auth(&self.config.api_token)
            .multipart(form)
            .timeout(Duration::from_secs(300))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MediaError::enhance_failed(format!(
                "upload returned HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn start(&self, uuid: &str) -> MediaResult<()> {
        let response = self
            .client
            .post(format!(
                "{}/production/{}/start.json",
                self.config.api_url, uuid
            ))
            .bearer_auth(&self.config.api_token)
            .timeout(Duration::from_secs(30))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MediaError::enhance_failed(format!(
                "start returned HTTP {}",
                response.status()
            )));
        }
        info!(uuid = %uuid, "Production started");
        Ok(())
    }

    async fn status(&self, uuid: &str) -> MediaResult<ProductionData> {
        let response = self
            .client
            .get(format!("{}/production/{}.json", self.config.api_url, uuid))
            .bearer_auth(&self.config.api_token)
            .timeout(Duration::from_secs(30))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MediaError::enhance_failed(format!(
                "status returned HTTP {}",
                response.status()
            )));
        }
        let envelope: ApiEnvelope = response.json().await?;
        Ok(envelope.data)
    }

    async fn wait_for_completion(
        &self,
        uuid: &str,
        cancel: &Option<watch::Receiver<bool>>,
    ) -> MediaResult<()> {
        let deadline = Instant::now() + self.config.total_budget;

        loop {
            ensure_not_cancelled(cancel)?;

            match self.status(uuid).await {
                Ok(data) => {
                    let status = data.status_string.as_deref().unwrap_or("Unknown");
                    debug!(uuid = %uuid, status = %status, "Polled production");
                    match status {
                        "Done" => return Ok(()),
                        "Error" => {
                            let detail = data
                                .error_message
                                .unwrap_or_else(|| "unknown remote error".to_string());
                            return Err(MediaError::enhance_failed(format!(
                                "remote processing failed: {detail}"
                            )));
                        }
                        _ => {}
                    }
                }
                Err(e) => {
                    // Poll errors are retried until the budget runs out
                    warn!(uuid = %uuid, error = %e, "Status poll failed");
                }
            }

            if Instant::now() + self.config.poll_interval > deadline {
                return Err(MediaError::enhance_failed(format!(
                    "remote job did not finish within {}s",
                    self.config.total_budget.as_secs()
                )));
            }
            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                _ = wait_cancel(cancel.clone()) => return Err(MediaError::Cancelled),
            }
        }
    }

    async fn download_result(&self, uuid: &str, output: &Path) -> MediaResult<()> {
        let data = self.status(uuid).await?;
        let Some(file) = data.output_files.first() else {
            return Err(MediaError::enhance_failed("no output files available"));
        };

        let response = self
            .client
            .get(&file.download_url)
            .bearer_auth(&self.config.api_token)
            .timeout(Duration::from_secs(300))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(MediaError::enhance_failed(format!(
                "download returned HTTP {}",
                response.status()
            )));
        }

        let bytes = response.bytes().await?;
        tokio::fs::write(output, &bytes).await?;
        info!(
            size_mb = bytes.len() as f64 / (1024.0 * 1024.0),
            output = %output.display(),
            "Downloaded enhanced audio"
        );
        Ok(())
    }

    /// Algorithm settings map as the API expects them: numeric choices,
    /// 0 meaning auto.
    fn algorithms_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "denoisemethod": self.config.denoise_method,
            "denoiseamount": self.config.denoise_amount,
            "dehum": 0,
            "dehumamount": self.config.dehum_amount,
            "leveler": 0,
            "normloudness": 0,
            "loudnesstarget": self.config.loudness_target,
        })
    }
}

/// Extract the audio track to a lossy intermediate.
async fn extract_audio(
    video: &Path,
    output: &Path,
    cancel: Option<watch::Receiver<bool>>,
) -> MediaResult<()> {
    let cmd = FfmpegCommand::new(output)
        .input(video)
        .output_args(["-vn", "-c:a", "libmp3lame", "-b:a", "192k"]);
    runner(cancel).run(&cmd).await
}

/// Replace the video's audio track, copying the video stream.
async fn mux_audio(
    video: &Path,
    audio: &Path,
    output: &Path,
    cancel: Option<watch::Receiver<bool>>,
) -> MediaResult<()> {
    let cmd = FfmpegCommand::new(output)
        .input(video)
        .input(audio)
        .output_args([
            "-map", "0:v", "-map", "1:a", "-c:v", "copy", "-c:a", "aac", "-b:a", "128k", "-ar",
            "48000", "-ac", "2", "-movflags", "+faststart", "-shortest",
        ]);
    runner(cancel).run(&cmd).await
}

fn runner(cancel: Option<watch::Receiver<bool>>) -> FfmpegRunner {
    let mut runner = FfmpegRunner::new().with_timeout(120);
    if let Some(rx) = cancel {
        runner = runner.with_cancel(rx);
    }
    runner
}

fn ensure_not_cancelled(cancel: &Option<watch::Receiver<bool>>) -> MediaResult<()> {
    if cancel.as_ref().is_some_and(|rx| *rx.borrow()) {
        Err(MediaError::Cancelled)
    } else {
        Ok(())
    }
}

/// Resolve once the cancellation flag flips to true; pend forever when no
/// receiver is attached.
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
