//! `stitch` CLI: compose a video from text against a local clip catalog.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use stitch_catalog::ClipCatalog;
use stitch_media::EnhancerConfig;
use stitch_models::{AspectRatio, JobStatus};
use stitch_pipeline::{JobRequest, Pipeline, PipelineConfig, PipelineError};

#[derive(Parser, Debug)]
#[command(
    name = "stitch",
    about = "Create videos from text using indexed source clips",
    version
)]
struct Cli {
    /// Input text to convert to video
    #[arg(long)]
    text: String,

    /// Path to the SQLite clip catalog
    #[arg(long)]
    database: PathBuf,

    /// Output video filename
    #[arg(long, default_value = "output.mp4")]
    output: String,

    /// Output directory
    #[arg(long, default_value = "./output")]
    output_dir: PathBuf,

    /// Temporary files directory
    #[arg(long, default_value = "./temp")]
    temp_dir: PathBuf,

    /// Maximum number of consecutive words to match as a phrase
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..=50))]
    max_phrase_length: u32,

    /// Padding before each clip start, seconds
    #[arg(long, default_value_t = 0.15)]
    padding_start: f64,

    /// Padding after each clip end, seconds
    #[arg(long, default_value_t = 0.15)]
    padding_end: f64,

    /// Target aspect ratio (16:9, 9:16 or 1:1)
    #[arg(long, default_value = "16:9")]
    aspect_ratio: String,

    /// Max concurrent downloads
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..=10))]
    max_download_workers: u32,

    /// Max concurrent transcodes
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u32).range(1..=10))]
    max_processing_workers: u32,

    /// Burn each clip's text into the video
    #[arg(long)]
    add_subtitles: bool,

    /// Disable per-clip loudness normalization
    #[arg(long)]
    no_normalize: bool,

    /// Keep temporary files (useful for debugging)
    #[arg(long)]
    no_cleanup: bool,

    /// Run the audio enhancement round-trip (needs AUPHONIC_API_TOKEN)
    #[arg(long)]
    enhance_audio: bool,

    /// Enable verbose debug logging
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("stitch={default_level}"))),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            if matches!(e, PipelineError::Cancelled) {
                eprintln!("\nOperation cancelled.");
                return ExitCode::from(130);
            }
            error!("Fatal: {e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, PipelineError> {
    if !cli.database.exists() {
        eprintln!("Error: database file not found: {}", cli.database.display());
        return Ok(ExitCode::FAILURE);
    }
    let aspect: AspectRatio = match cli.aspect_ratio.parse() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {e}");
            return Ok(ExitCode::from(2));
        }
    };

    let mut config = PipelineConfig::from_env();
    config.output_dir = cli.output_dir.clone();
    config.temp_dir = cli.temp_dir.clone();
    config.max_phrase_length = cli.max_phrase_length as usize;
    config.clip_padding_start = cli.padding_start;
    config.clip_padding_end = cli.padding_end;
    config.fetch_workers = cli.max_download_workers as usize;
    config.transcode_workers = cli.max_processing_workers as usize;
    config.profile.aspect = aspect;
    config.profile.encoding.normalize_audio = !cli.no_normalize;
    config.add_subtitles = cli.add_subtitles;
    config.cleanup_temp = !cli.no_cleanup;
    if !cli.enhance_audio {
        config.enhance = None;
    } else if config.enhance.is_none() {
        config.enhance = EnhancerConfig::from_env();
        if config.enhance.is_none() {
            eprintln!("Warning: --enhance-audio set but AUPHONIC_API_TOKEN is missing; skipping");
        }
    }

    let catalog = Arc::new(ClipCatalog::open(&cli.database).await?);
    let pipeline = Pipeline::new(catalog, config);

    // Cooperative cancellation on ctrl-c
    let (cancel_tx, cancel_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cancel_tx.send(true);
        }
    });

    let progress: stitch_pipeline::ProgressCallback = Arc::new(|done: usize, total: usize| {
        let percent = done as f64 / total as f64 * 100.0;
        eprint!("\rProgress: {done}/{total} ({percent:.1}%)");
        if done == total {
            eprintln!();
        }
    });

    let request = JobRequest {
        text: cli.text.clone(),
        output_stem: Some(cli.output.clone()),
    };
    let outcome = pipeline.run(request, cancel_rx, Some(progress)).await?;

    println!();
    match outcome.status {
        JobStatus::Success => println!("Video created: {}", display_path(&outcome)),
        JobStatus::Partial => {
            println!("Video created with gaps: {}", display_path(&outcome));
            if !outcome.missing_tokens.is_empty() {
                println!("Missing words: {}", outcome.missing_tokens.join(", "));
            }
        }
        JobStatus::Failed | JobStatus::Cancelled => {
            eprintln!("Job did not produce a video");
            return Ok(ExitCode::FAILURE);
        }
    }
    for warning in &outcome.warnings {
        eprintln!("Warning: {warning}");
    }

    Ok(ExitCode::SUCCESS)
}

fn display_path(outcome: &stitch_models::JobOutcome) -> String {
    outcome
        .output_path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<none>".to_string())
}
