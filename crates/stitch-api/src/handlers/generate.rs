//! The synchronous composition endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};

use stitch_models::{tokenize, AspectRatio, JobOutcome, JobStatus, WordTiming};
use stitch_pipeline::{JobRequest, Pipeline, PipelineConfig, PipelineError};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateVideoRequest {
    pub text: String,
    #[serde(default = "default_lang")]
    pub lang: String,
    #[serde(default = "default_max_phrase_length")]
    pub max_phrase_length: u32,
    #[serde(default = "default_padding")]
    pub clip_padding_start: f64,
    #[serde(default = "default_padding")]
    pub clip_padding_end: f64,
    #[serde(default)]
    pub add_subtitles: bool,
    #[serde(default)]
    pub aspect_ratio: Option<String>,
    #[serde(default)]
    pub watermark_text: Option<String>,
    #[serde(default)]
    pub intro_text: Option<String>,
    #[serde(default)]
    pub outro_text: Option<String>,
    #[serde(default)]
    pub enhance_audio: bool,
    #[serde(default)]
    pub keep_original_audio: bool,
    #[serde(default)]
    pub max_download_workers: Option<u32>,
    #[serde(default)]
    pub max_processing_workers: Option<u32>,
}

fn default_lang() -> String {
    "en".to_string()
}

fn default_max_phrase_length() -> u32 {
    10
}

fn default_padding() -> f64 {
    0.15
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateVideoResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_video_url: Option<String>,
    pub word_timings: Vec<WordTiming>,
    pub missing_words: Vec<String>,
    pub message: String,
}

/// Flips the job's cancel flag if the request future is dropped before
/// the pipeline finishes (client disconnect).
struct CancelOnDrop(watch::Sender<bool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        let _ = self.0.send(true);
    }
}

/// `POST /generate-video`: run a composition job and block until done.
pub async fn generate_video(
    State(state): State<AppState>,
    Json(request): Json<GenerateVideoRequest>,
) -> Response {
    let config = match apply_request(&state.base_pipeline, &request) {
        Ok(config) => config,
        Err(e) => return e.into_response(),
    };

    info!(text_len = request.text.len(), lang = %request.lang, "Composition request");

    let pipeline = Pipeline::new(Arc::clone(&state.catalog), config);
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let _cancel_guard = CancelOnDrop(cancel_tx);

    match pipeline
        .run(JobRequest::new(request.text.clone()), cancel_rx, None)
        .await
    {
        Ok(outcome) => {
            let body = build_response(&outcome);
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) if e.is_bad_request() => ApiError::from(e).into_response(),
        Err(PipelineError::Cancelled) => ApiError::Cancelled.into_response(),
        Err(e) => {
            warn!(error = %e, "Composition job failed");
            let body = GenerateVideoResponse {
                status: "failed".to_string(),
                video_url: None,
                original_video_url: None,
                word_timings: Vec::new(),
                missing_words: Vec::new(),
                message: format!("Video generation failed: {e}"),
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    }
}

/// Validate the request and layer it over the base pipeline config.
fn apply_request(
    base: &PipelineConfig,
    request: &GenerateVideoRequest,
) -> Result<PipelineConfig, ApiError> {
    if tokenize(&request.text).is_empty() {
        return Err(ApiError::bad_request("text must contain at least one word"));
    }
    if !(1..=50).contains(&request.max_phrase_length) {
        return Err(ApiError::bad_request(
            "maxPhraseLength must be between 1 and 50",
        ));
    }
    if request.clip_padding_start < 0.0 || request.clip_padding_end < 0.0 {
        return Err(ApiError::bad_request("clip padding must be non-negative"));
    }
    for workers in [request.max_download_workers, request.max_processing_workers]
        .into_iter()
        .flatten()
    {
        if !(1..=10).contains(&workers) {
            return Err(ApiError::bad_request(
                "worker counts must be between 1 and 10",
            ));
        }
    }

    let mut config = base.clone();
    if let Some(aspect) = &request.aspect_ratio {
        let aspect: AspectRatio = aspect
            .parse()
            .map_err(|e: stitch_models::AspectRatioError| ApiError::bad_request(e.to_string()))?;
        config.profile.aspect = aspect;
    }
    config.max_phrase_length = request.max_phrase_length as usize;
    config.clip_padding_start = request.clip_padding_start;
    config.clip_padding_end = request.clip_padding_end;
    config.add_subtitles = request.add_subtitles;
    config.watermark_text = request.watermark_text.clone();
    config.intro_text = request.intro_text.clone();
    config.outro_text = request.outro_text.clone();
    config.keep_original_audio = request.keep_original_audio;
    if let Some(workers) = request.max_download_workers {
        config.fetch_workers = workers as usize;
    }
    if let Some(workers) = request.max_processing_workers {
        config.transcode_workers = workers as usize;
    }
    if !request.enhance_audio {
        config.enhance = None;
    }

    Ok(config)
}

fn build_response(outcome: &JobOutcome) -> GenerateVideoResponse {
    let status = match outcome.status {
        JobStatus::Success => "success",
        JobStatus::Partial => "partial_failure",
        JobStatus::Failed | JobStatus::Cancelled => "failed",
    };

    let message = match outcome.status {
        JobStatus::Success => "Video generated successfully".to_string(),
        JobStatus::Partial if outcome.missing_tokens.is_empty() => {
            "Video generated with substituted segments".to_string()
        }
        JobStatus::Partial => format!(
            "Video generated; {} word(s) had no clip",
            outcome.missing_tokens.len()
        ),
        _ => "Video generation failed".to_string(),
    };

    GenerateVideoResponse {
        status: status.to_string(),
        video_url: outcome.output_path.as_ref().and_then(video_url),
        original_video_url: outcome.original_output_path.as_ref().and_then(video_url),
        word_timings: outcome.word_timings.clone(),
        missing_words: outcome.missing_tokens.clone(),
        message,
    }
}

fn video_url(path: &std::path::PathBuf) -> Option<String> {
    path.file_name()
        .map(|name| format!("/videos/{}", name.to_string_lossy()))
}
