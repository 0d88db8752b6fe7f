//! Intermediate concatenation.
//!
//! Intermediates share the fixed profile, so the batch path can use the
//! concat demuxer in stream-copy mode. The incremental path folds inputs
//! pairwise to bound disk usage on very long plans.

use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Input count above which concatenation switches to the incremental fold.
pub const INCREMENTAL_THRESHOLD: usize = 50;

/// Per-join timeout, seconds.
const CONCAT_TIMEOUT_SECS: u64 = 300;

/// Joins profile-conformant intermediates into one container.
#[derive(Debug, Clone)]
pub struct Concatenator {
    temp_dir: PathBuf,
    /// Force the incremental fold regardless of input count
    force_incremental: bool,
}

impl Concatenator {
    pub fn new(temp_dir: impl AsRef<Path>) -> Self {
        Self {
            temp_dir: temp_dir.as_ref().to_path_buf(),
            force_incremental: false,
        }
    }

    pub fn with_incremental(mut self, force: bool) -> Self {
        self.force_incremental = force;
        self
    }

    /// Join `inputs` into `output`, picking batch or incremental mode.
    pub async fn concatenate(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        cancel: Option<watch::Receiver<bool>>,
    ) -> MediaResult<()> {
        if inputs.is_empty() {
            return Err(MediaError::InvalidVideo(
                "no intermediates to concatenate".to_string(),
            ));
        }
        for input in inputs {
            if !input.exists() {
                return Err(MediaError::FileNotFound(input.clone()));
            }
        }

        if inputs.len() == 1 {
            tokio::fs::copy(&inputs[0], output).await?;
            info!(output = %output.display(), "Single intermediate copied through");
            return Ok(());
        }

        if self.force_incremental || inputs.len() > INCREMENTAL_THRESHOLD {
            self.concatenate_incremental(inputs, output, cancel).await
        } else {
            self.concatenate_batch(inputs, output, cancel).await
        }
    }

    /// Concat-demuxer manifest + stream copy.
    pub async fn concatenate_batch(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        cancel: Option<watch::Receiver<bool>>,
    ) -> MediaResult<()> {
        tokio::fs::create_dir_all(&self.temp_dir).await?;

        // Stream copy requires every input to carry a decodable video stream
        for input in inputs {
            if !crate::probe::has_valid_video_stream(input).await {
                return Err(MediaError::InvalidVideo(format!(
                    "input has no decodable video stream: {}",
                    input.display()
                )));
            }
        }

        let manifest_name = format!(
            "concat_{}.txt",
            output
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "output".to_string())
        );
        let manifest_path = self.temp_dir.join(manifest_name);
        tokio::fs::write(&manifest_path, manifest(inputs)).await?;
        debug!(manifest = %manifest_path.display(), "Wrote concat manifest");

        let cmd = FfmpegCommand::new(output)
            .input_arg("-f")
            .input_arg("concat")
            .input_arg("-safe")
            .input_arg("0")
            .input(&manifest_path)
            .output_args(["-c", "copy", "-movflags", "+faststart"]);

        let result = self.runner(cancel).run(&cmd).await;
        let _ = tokio::fs::remove_file(&manifest_path).await;
        result?;

        verify_output(output).await?;
        info!(
            inputs = inputs.len(),
            output = %output.display(),
            "Concatenated intermediates"
        );
        Ok(())
    }

    /// Fold-left concatenation: `acc + next -> acc'`.
    pub async fn concatenate_incremental(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        cancel: Option<watch::Receiver<bool>>,
    ) -> MediaResult<()> {
        tokio::fs::create_dir_all(&self.temp_dir).await?;
        info!(inputs = inputs.len(), "Incremental concatenation");

        let mut current = self.temp_dir.join("incremental_0.mp4");
        tokio::fs::copy(&inputs[0], &current).await?;

        for (i, next) in inputs[1..].iter().enumerate() {
            let step_output = self.temp_dir.join(format!("incremental_{}.mp4", i + 1));
            self.concatenate_batch(
                &[current.clone(), next.clone()],
                &step_output,
                cancel.clone(),
            )
            .await?;

            let _ = tokio::fs::remove_file(&current).await;
            current = step_output;
        }

        crate::fs_utils::move_file(&current, output).await?;
        Ok(())
    }

    fn runner(&self, cancel: Option<watch::Receiver<bool>>) -> FfmpegRunner {
        let mut runner = FfmpegRunner::new().with_timeout(CONCAT_TIMEOUT_SECS);
        if let Some(rx) = cancel {
            runner = runner.with_cancel(rx);
        }
        runner
    }
}

/// Concat-demuxer manifest body: absolute paths, single quotes escaped.
fn manifest(inputs: &[PathBuf]) -> String {
    let mut body = String::new();
    for input in inputs {
        let absolute = std::path::absolute(input).unwrap_or_else(|_| input.clone());
        let escaped = absolute.to_string_lossy().replace('\'', "'\\''");
        body.push_str(&format!("file '{}'\n", escaped));
    }
    body
}

async fn verify_output(output: &Path) -> MediaResult<()> {
    let meta = tokio::fs::metadata(output)
        .await
        .map_err(|_| MediaError::FileNotFound(output.to_path_buf()))?;
    if meta.len() == 0 {
        return Err(MediaError::InvalidVideo(format!(
            "concatenation produced an empty file: {}",
            output.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_lines() {
        let inputs = vec![PathBuf::from("/tmp/a.mp4"), PathBuf::from("/tmp/b.mp4")];
        let body = manifest(&inputs);
        assert_eq!(body, "file '/tmp/a.mp4'\nfile '/tmp/b.mp4'\n");
    }

    #[test]
    fn test_manifest_escapes_quotes() {
        let inputs = vec![PathBuf::from("/tmp/it's.mp4")];
        let body = manifest(&inputs);
        assert_eq!(body, "file '/tmp/it'\\''s.mp4'\n");
    }

    #[tokio::test]
    async fn test_concatenate_rejects_empty_input() {
        let dir = tempfile::tempdir().unwrap();
        let concat = Concatenator::new(dir.path());
        let err = concat
            .concatenate(&[], &dir.path().join("out.mp4"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::InvalidVideo(_)));
    }

    #[tokio::test]
    async fn test_concatenate_rejects_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let concat = Concatenator::new(dir.path());
        let missing = dir.path().join("missing.mp4");
        let err = concat
            .concatenate(
                std::slice::from_ref(&missing),
                &dir.path().join("out.mp4"),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_single_input_copies_through() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("only.mp4");
        tokio::fs::write(&input, b"fake video bytes").await.unwrap();

        let concat = Concatenator::new(dir.path().join("tmp"));
        let output = dir.path().join("out.mp4");
        concat
            .concatenate(std::slice::from_ref(&input), &output, None)
            .await
            .unwrap();

        assert_eq!(
            tokio::fs::read(&output).await.unwrap(),
            b"fake video bytes"
        );
    }
}
