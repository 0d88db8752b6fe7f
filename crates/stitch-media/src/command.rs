//! FFmpeg command builder and runner.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// One ffmpeg input with its preceding arguments (`-ss`, `-t`, `-f`, ...).
#[derive(Debug, Clone)]
struct Input {
    args: Vec<String>,
    source: String,
}

/// Builder for ffmpeg invocations with any number of inputs.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    inputs: Vec<Input>,
    pending_input_args: Vec<String>,
    output: PathBuf,
    output_args: Vec<String>,
    overwrite: bool,
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new command writing to `output`.
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            inputs: Vec::new(),
            pending_input_args: Vec::new(),
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Queue an argument for the next input.
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.pending_input_args.push(arg.into());
        self
    }

    /// Add a file input, consuming queued input arguments.
    pub fn input(mut self, source: impl AsRef<Path>) -> Self {
        let args = std::mem::take(&mut self.pending_input_args);
        self.inputs.push(Input {
            args,
            source: source.as_ref().to_string_lossy().to_string(),
        });
        self
    }

    /// Add a lavfi-generated input (color source, anullsrc, ...).
    pub fn lavfi_input(mut self, spec: impl Into<String>) -> Self {
        let mut args = std::mem::take(&mut self.pending_input_args);
        args.push("-f".to_string());
        args.push("lavfi".to_string());
        self.inputs.push(Input {
            args,
            source: spec.into(),
        });
        self
    }

    /// Seek position for the next input.
    pub fn seek(self, seconds: f64) -> Self {
        self.input_arg("-ss").input_arg(format!("{:.3}", seconds))
    }

    /// Duration limit for the next input.
    pub fn duration(self, seconds: f64) -> Self {
        self.input_arg("-t").input_arg(format!("{:.3}", seconds))
    }

    /// Add an output argument (after all inputs).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set video filter.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Set audio filter.
    pub fn audio_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-af").output_arg(filter)
    }

    /// Build the argv for this command.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }
        args.push("-hide_banner".to_string());
        args.push("-v".to_string());
        args.push(self.log_level.clone());

        for input in &self.inputs {
            args.extend(input.args.iter().cloned());
            args.push("-i".to_string());
            args.push(input.source.clone());
        }

        args.extend(self.output_args.iter().cloned());
        args.push(self.output.to_string_lossy().to_string());

        args
    }

    pub fn output_path(&self) -> &Path {
        &self.output
    }
}

/// Runner for ffmpeg commands with timeout and cooperative cancellation.
#[derive(Default)]
pub struct FfmpegRunner {
    cancel_rx: Option<watch::Receiver<bool>>,
    timeout_secs: Option<u64>,
}

impl FfmpegRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe a cancellation signal; the child is killed when it fires.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    /// Kill the child and fail after `secs` seconds.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Run an ffmpeg command to completion.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

        let args = cmd.build_args();
        debug!("Running ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let mut stderr_pipe = child.stderr.take().expect("stderr not captured");
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr_pipe.read_to_string(&mut buf).await;
            buf
        });

        let status = self.wait_for_completion(&mut child).await;
        let stderr = stderr_task.await.unwrap_or_default();

        match status {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => Err(MediaError::ffmpeg_failed(
                "ffmpeg exited with non-zero status",
                Some(truncate_stderr(&stderr)),
                status.code(),
            )),
            Err(e) => Err(e),
        }
    }

    async fn wait_for_completion(&self, child: &mut Child) -> MediaResult<std::process::ExitStatus> {
        // Effectively "no timeout" when unset; tokio timers cap far
        // shorter than this anyway.
        const NO_TIMEOUT_SECS: u64 = 86_400 * 365;
        let timeout = Duration::from_secs(self.timeout_secs.unwrap_or(NO_TIMEOUT_SECS));
        let mut cancel_rx = self.cancel_rx.clone();

        tokio::select! {
            status = child.wait() => Ok(status?),
            _ = cancelled(&mut cancel_rx) => {
                warn!("ffmpeg cancelled, killing process");
                let _ = child.kill().await;
                Err(MediaError::Cancelled)
            }
            _ = tokio::time::sleep(timeout) => {
                warn!("ffmpeg timed out after {}s, killing process", timeout.as_secs());
                let _ = child.kill().await;
                Err(MediaError::Timeout(timeout.as_secs()))
            }
        }
    }
}

/// Resolve once the cancellation flag flips to true; pend forever when no
/// receiver is attached.
async fn cancelled(rx: &mut Option<watch::Receiver<bool>>) {
    match rx {
        Some(rx) => {
            while !*rx.borrow() {
                if rx.changed().await.is_err() {
                    // Sender dropped without cancelling
                    std::future::pending::<()>().await;
                }
            }
        }
        None => std::future::pending().await,
    }
}

fn truncate_stderr(stderr: &str) -> String {
    const MAX: usize = 4096;
    if stderr.len() > MAX {
        format!("...{}", &stderr[stderr.len() - MAX..])
    } else {
        stderr.to_string()
    }
}

/// Check if ffmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Check if ffprobe is available.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}

/// Check if yt-dlp is available.
pub fn check_ytdlp() -> MediaResult<PathBuf> {
    which::which("yt-dlp").map_err(|_| MediaError::YtDlpNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_input_ordering() {
        let cmd = FfmpegCommand::new("out.mp4")
            .seek(10.0)
            .duration(30.0)
            .input("in.mp4")
            .output_args(["-c:v", "libx264"]);

        let args = cmd.build_args();
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        let i = args.iter().position(|a| a == "-i").unwrap();
        assert!(ss < i, "seek must precede the input");
        assert!(args.contains(&"10.000".to_string()));
        assert!(args.contains(&"30.000".to_string()));
        assert_eq!(args.last().unwrap(), "out.mp4");
    }

    #[test]
    fn test_multiple_inputs_keep_their_args() {
        let cmd = FfmpegCommand::new("out.mp4")
            .lavfi_input("color=c=black:s=1280x720")
            .lavfi_input("anullsrc=r=48000:cl=stereo");

        let args = cmd.build_args();
        let inputs: Vec<usize> = args
            .iter()
            .enumerate()
            .filter(|(_, a)| *a == "-i")
            .map(|(i, _)| i)
            .collect();
        assert_eq!(inputs.len(), 2);
        assert_eq!(args[inputs[0] + 1], "color=c=black:s=1280x720");
        assert_eq!(args[inputs[1] + 1], "anullsrc=r=48000:cl=stereo");
        // Each lavfi input carries its own -f lavfi
        assert_eq!(args.iter().filter(|a| *a == "lavfi").count(), 2);
    }

    #[test]
    fn test_overwrite_and_log_level() {
        let cmd = FfmpegCommand::new("out.mp4").input("in.mp4");
        let args = cmd.build_args();
        assert_eq!(args[0], "-y");
        assert!(args.contains(&"error".to_string()));
    }

    #[tokio::test]
    async fn test_cancelled_pends_without_receiver() {
        let mut rx = None;
        let wait = tokio::time::timeout(Duration::from_millis(20), cancelled(&mut rx)).await;
        assert!(wait.is_err(), "should pend forever with no receiver");
    }

    #[tokio::test]
    async fn test_cancelled_fires_on_signal() {
        let (tx, rx) = watch::channel(false);
        let mut rx = Some(rx);
        let wait = tokio::time::timeout(Duration::from_millis(200), async {
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                let _ = tx.send(true);
            });
            cancelled(&mut rx).await;
        })
        .await;
        assert!(wait.is_ok(), "should resolve once the flag flips");
    }
}
