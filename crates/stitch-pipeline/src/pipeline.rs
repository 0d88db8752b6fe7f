//! Pipeline orchestration.
//!
//! Drives plan → fetch → transcode → concat → enhance for one job.
//! Fetch and transcode run in bounded pools and may complete out of
//! order; a reorder buffer restores plan order before concatenation, so
//! the final video's segments always match the planner's emission order.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, watch, Semaphore};
use tracing::{info, warn};

use stitch_catalog::ClipCatalog;
use stitch_media::{
    check_ffmpeg, check_ffprobe, check_ytdlp, fs_utils, probe, AudioEnhancer, Concatenator,
    MediaError, SegmentFetcher, TranscodeOptions, Transcoder, PLACEHOLDER_DURATION,
    TITLE_CARD_DURATION,
};
use stitch_models::{tokenize, JobId, JobOutcome, JobStatus, SegmentPick, WordTiming};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::planner;
use crate::reorder::ReorderBuffer;
use crate::scratch::ScratchDir;

/// Progress callback: `(completed_picks, total_picks)`.
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// One composition request.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub text: String,
    /// Output filename stem; defaults to `stitch_<jobid>`
    pub output_stem: Option<String>,
}

impl JobRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            output_stem: None,
        }
    }
}

/// A pick that made it through transcode.
#[derive(Debug)]
struct RenderedPick {
    pick: SegmentPick,
    path: PathBuf,
    duration: f64,
    /// True for placeholder picks and for clips substituted after a
    /// failed fetch.
    placeholder: bool,
}

/// Per-pick stage result flowing to the in-order consumer.
struct StageOutput {
    index: usize,
    rendered: Option<RenderedPick>,
    warnings: Vec<String>,
    fatal: Option<PipelineError>,
}

/// Shared state for the fetch/transcode worker tasks.
struct StageContext {
    fetcher: SegmentFetcher,
    transcoder: Transcoder,
    downloads_dir: PathBuf,
    processed_dir: PathBuf,
    fetch_sem: Arc<Semaphore>,
    transcode_sem: Arc<Semaphore>,
    cancel: watch::Receiver<bool>,
    config: PipelineConfig,
    progress: Option<ProgressCallback>,
    completed: AtomicUsize,
    total: usize,
}

/// The composition pipeline. One instance serves many jobs; the catalog
/// and its transcript cache are shared.
pub struct Pipeline {
    catalog: Arc<ClipCatalog>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(catalog: Arc<ClipCatalog>, config: PipelineConfig) -> Self {
        Self { catalog, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run one job to completion or cancellation.
    pub async fn run(
        &self,
        request: JobRequest,
        cancel: watch::Receiver<bool>,
        progress: Option<ProgressCallback>,
    ) -> PipelineResult<JobOutcome> {
        let started_at = Utc::now();

        if self.config.verify_tools {
            check_ffmpeg()?;
            check_ffprobe()?;
            check_ytdlp()?;
        }

        let tokens = tokenize(&request.text);
        if tokens.is_empty() {
            return Err(PipelineError::EmptyText);
        }

        let job_id = JobId::new();
        info!(job_id = %job_id, tokens = tokens.len(), "Starting composition job");

        tokio::fs::create_dir_all(&self.config.output_dir).await?;
        let scratch = ScratchDir::create(
            &self.config.temp_dir,
            &job_id,
            !self.config.cleanup_temp,
        )
        .await?;

        // Stage 1: plan (serial)
        let plan = planner::plan(
            self.catalog.as_ref(),
            &tokens,
            self.config.max_phrase_length,
            &self.config.preferred_channels,
        )
        .await?;
        let missing_tokens = plan.missing.clone();

        let mut picks = plan.picks;
        if !self.config.allow_placeholders {
            picks.retain(|p| !p.is_placeholder());
        }
        if picks.is_empty() {
            return Err(PipelineError::NothingRendered);
        }
        ensure_not_cancelled(&cancel)?;

        // Stage 2+3: fetch and transcode, pipelined per pick
        let total = picks.len();
        let ctx = Arc::new(StageContext {
            fetcher: SegmentFetcher::new(self.config.fetcher.clone()),
            transcoder: Transcoder::new(self.config.profile.clone()),
            downloads_dir: scratch.downloads(),
            processed_dir: scratch.processed(),
            fetch_sem: Arc::new(Semaphore::new(self.config.fetch_workers.max(1))),
            transcode_sem: Arc::new(Semaphore::new(self.config.transcode_workers.max(1))),
            cancel: cancel.clone(),
            config: self.config.clone(),
            progress,
            completed: AtomicUsize::new(0),
            total,
        });

        let (tx, mut rx) = mpsc::channel::<StageOutput>(total);
        for (index, pick) in picks.iter().cloned().enumerate() {
            let ctx = Arc::clone(&ctx);
            let tx = tx.clone();
            tokio::spawn(async move {
                let output = render_pick(index, pick, ctx).await;
                let _ = tx.send(output).await;
            });
        }
        drop(tx);

        // Consume in plan order
        let mut buffer = ReorderBuffer::new();
        let mut ordered: Vec<RenderedPick> = Vec::new();
        let mut warnings: Vec<String> = Vec::new();
        let mut fatal: Option<PipelineError> = None;

        while let Some(output) = rx.recv().await {
            warnings.extend(output.warnings);
            if let Some(err) = output.fatal {
                // Keep draining so in-flight work settles before cleanup
                fatal.get_or_insert(err);
            }
            for rendered in buffer.push(output.index, output.rendered) {
                if let Some(r) = rendered {
                    ordered.push(r);
                }
            }
        }
        if let Some(err) = fatal {
            return Err(err);
        }
        ensure_not_cancelled(&cancel)?;
        if ordered.is_empty() {
            return Err(PipelineError::NothingRendered);
        }

        // Intro/outro cards around the in-order intermediates
        let transcoder = Transcoder::new(self.config.profile.clone());
        let mut sequence: Vec<PathBuf> = Vec::new();
        let mut intro_duration = 0.0;
        if let Some(text) = &self.config.intro_text {
            let path = scratch.path().join("intro_card.mp4");
            transcoder
                .render_title_card(text, TITLE_CARD_DURATION, &path, Some(cancel.clone()))
                .await?;
            intro_duration = probe::duration(&path).await.unwrap_or(TITLE_CARD_DURATION);
            sequence.push(path);
        }
        sequence.extend(ordered.iter().map(|r| r.path.clone()));
        if let Some(text) = &self.config.outro_text {
            let path = scratch.path().join("outro_card.mp4");
            transcoder
                .render_title_card(text, TITLE_CARD_DURATION, &path, Some(cancel.clone()))
                .await?;
            sequence.push(path);
        }

        // Stage 4: concatenate (single-threaded, strict plan order)
        let stem = request
            .output_stem
            .as_deref()
            .map(sanitize_stem)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("stitch_{}", job_id.short()));
        let output_path = fs_utils::unique_output_path(&self.config.output_dir, &stem, "mp4");

        let concatenator = Concatenator::new(scratch.path().join("concat"))
            .with_incremental(self.config.force_incremental_concat);
        concatenator
            .concatenate(&sequence, &output_path, Some(cancel.clone()))
            .await
            .map_err(|e| match e {
                MediaError::Cancelled => PipelineError::Cancelled,
                other => PipelineError::ConcatFailed(other),
            })?;

        let word_timings = build_word_timings(&ordered, &tokens, intro_duration);

        // Stage 5: optional audio enhancement, never fatal
        let mut final_output = output_path.clone();
        let mut original_output_path = None;
        if let Some(enhancer_config) = &self.config.enhance {
            ensure_not_cancelled(&cancel)?;
            let enhancer = AudioEnhancer::new(enhancer_config.clone());
            match enhancer
                .enhance_video(
                    &output_path,
                    &scratch.path().join("enhance"),
                    Some(cancel.clone()),
                )
                .await
            {
                Ok(enhanced) => {
                    if self.config.keep_original_audio {
                        let original = self.config.output_dir.join(format!(
                            "{}_original.mp4",
                            output_path
                                .file_stem()
                                .map(|s| s.to_string_lossy().to_string())
                                .unwrap_or_else(|| stem.clone())
                        ));
                        fs_utils::move_file(&output_path, &original).await?;
                        original_output_path = Some(original);
                    }
                    fs_utils::move_file(&enhanced, &final_output).await?;
                }
                Err(MediaError::Cancelled) => return Err(PipelineError::Cancelled),
                Err(e) => {
                    warn!(job_id = %job_id, error = %e, "Audio enhancement failed");
                    warnings.push(format!(
                        "audio enhancement failed, returning unenhanced output: {e}"
                    ));
                    final_output = output_path.clone();
                }
            }
        }

        let degraded = !missing_tokens.is_empty()
            || ordered.len() < total
            || ordered.iter().any(|r| r.placeholder);
        let status = if degraded {
            JobStatus::Partial
        } else {
            JobStatus::Success
        };

        info!(
            job_id = %job_id,
            status = ?status,
            output = %final_output.display(),
            duration = word_timings.last().map(|t| t.end).unwrap_or(0.0),
            "Composition job finished"
        );

        Ok(JobOutcome {
            job_id,
            status,
            output_path: Some(final_output),
            original_output_path,
            word_timings,
            missing_tokens,
            warnings,
            started_at,
            finished_at: Utc::now(),
        })
    }
}

/// Fetch (clip picks only) and transcode one pick.
async fn render_pick(index: usize, pick: SegmentPick, ctx: Arc<StageContext>) -> StageOutput {
    let mut warnings = Vec::new();

    let result = render_pick_inner(index, &pick, &ctx, &mut warnings).await;
    let output = match result {
        Ok(rendered) => StageOutput {
            index,
            rendered,
            warnings,
            fatal: None,
        },
        Err(err) => StageOutput {
            index,
            rendered: None,
            warnings,
            fatal: Some(err),
        },
    };

    let done = ctx.completed.fetch_add(1, Ordering::SeqCst) + 1;
    if let Some(progress) = &ctx.progress {
        progress(done, ctx.total);
    }
    output
}

async fn render_pick_inner(
    index: usize,
    pick: &SegmentPick,
    ctx: &StageContext,
    warnings: &mut Vec<String>,
) -> PipelineResult<Option<RenderedPick>> {
    if *ctx.cancel.borrow() {
        return Err(PipelineError::Cancelled);
    }

    // Fetch stage: only clip picks hit the network
    let source = match pick {
        SegmentPick::Clip {
            video_id,
            start,
            end,
            text,
            ..
        } => {
            let permit = ctx
                .fetch_sem
                .acquire()
                .await
                .expect("fetch semaphore closed");
            let fetched = ctx
                .fetcher
                .fetch(
                    video_id,
                    *start,
                    *end,
                    ctx.config.clip_padding_start,
                    ctx.config.clip_padding_end,
                    &ctx.downloads_dir,
                    Some(ctx.cancel.clone()),
                )
                .await;
            drop(permit);

            match fetched {
                Ok(path) => Some(path),
                Err(MediaError::Cancelled) => return Err(PipelineError::Cancelled),
                Err(e) => {
                    warnings.push(format!("fetch failed for '{text}': {e}"));
                    if ctx.config.fail_on_any {
                        return Err(e.into());
                    }
                    if !ctx.config.allow_placeholders {
                        return Ok(None);
                    }
                    None // substitute a placeholder below
                }
            }
        }
        SegmentPick::Placeholder { .. } => None,
    };

    // Transcode stage
    let _permit = ctx
        .transcode_sem
        .acquire()
        .await
        .expect("transcode semaphore closed");
    if *ctx.cancel.borrow() {
        return Err(PipelineError::Cancelled);
    }

    let output = ctx.processed_dir.join(format!("{index:04}.mp4"));
    let substituted = source.is_none() && !pick.is_placeholder();

    let encode_result = match &source {
        Some(path) => {
            let opts = TranscodeOptions {
                trim: None,
                subtitle: ctx
                    .config
                    .add_subtitles
                    .then(|| pick.text().to_string()),
                watermark: ctx.config.watermark_text.clone(),
            };
            ctx.transcoder
                .transcode(path, &output, &opts, Some(ctx.cancel.clone()))
                .await
        }
        None => {
            ctx.transcoder
                .render_placeholder(
                    pick.text(),
                    PLACEHOLDER_DURATION,
                    &output,
                    Some(ctx.cancel.clone()),
                )
                .await
        }
    };

    match encode_result {
        Ok(()) => {
            let duration = match probe::duration(&output).await {
                Ok(d) => d,
                Err(e) => {
                    warnings.push(format!("could not probe '{}': {e}", pick.text()));
                    PLACEHOLDER_DURATION
                }
            };
            Ok(Some(RenderedPick {
                pick: pick.clone(),
                path: output,
                duration,
                placeholder: pick.is_placeholder() || substituted,
            }))
        }
        Err(MediaError::Cancelled) => Err(PipelineError::Cancelled),
        Err(e) => {
            warnings.push(format!("transcode failed for '{}': {e}", pick.text()));
            if ctx.config.fail_on_any {
                Err(e.into())
            } else {
                Ok(None)
            }
        }
    }
}

/// Distribute each rendered pick's measured duration evenly over the
/// tokens it covers, starting at `offset` (the intro card, if any).
fn build_word_timings(
    rendered: &[RenderedPick],
    tokens: &[String],
    offset: f64,
) -> Vec<WordTiming> {
    let mut timings = Vec::new();
    let mut clock = offset;

    for r in rendered {
        let span = r.pick.word_span();
        let covered = &tokens[span.start..span.end.min(tokens.len())];
        if covered.is_empty() {
            clock += r.duration;
            continue;
        }
        let share = r.duration / covered.len() as f64;
        for (j, word) in covered.iter().enumerate() {
            timings.push(WordTiming {
                word: word.clone(),
                start: clock + j as f64 * share,
                end: clock + (j + 1) as f64 * share,
            });
        }
        clock += r.duration;
    }
    timings
}

fn ensure_not_cancelled(cancel: &watch::Receiver<bool>) -> PipelineResult<()> {
    if *cancel.borrow() {
        Err(PipelineError::Cancelled)
    } else {
        Ok(())
    }
}

/// Keep output stems to a safe character set and drop any extension.
fn sanitize_stem(name: &str) -> String {
    let stem = name.strip_suffix(".mp4").unwrap_or(name);
    stem.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        .collect()
}
