//! Filesystem helpers.
//!
//! Final outputs move from the job scratch directory to the output root,
//! which may sit on another filesystem; rename falls back to
//! copy-and-delete on EXDEV.

use std::path::Path;
use tokio::fs;

use crate::error::MediaResult;

/// Move a file, handling cross-device moves.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if let Some(parent) = dst.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => {
            // Copy to a sibling temp file, then rename atomically on the
            // destination filesystem.
            let tmp = dst.with_extension("tmp");
            fs::copy(src, &tmp).await?;
            if let Err(e) = fs::rename(&tmp, dst).await {
                let _ = fs::remove_file(&tmp).await;
                return Err(e.into());
            }
            if let Err(e) = fs::remove_file(src).await {
                tracing::warn!(src = %src.display(), error = %e, "Failed to remove source after move");
            }
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Pick an output path that does not collide with existing files by
/// appending a monotonic suffix.
pub fn unique_output_path(dir: &Path, stem: &str, ext: &str) -> std::path::PathBuf {
    let direct = dir.join(format!("{stem}.{ext}"));
    if !direct.exists() {
        return direct;
    }
    for n in 1u32.. {
        let candidate = dir.join(format!("{stem}_{n}.{ext}"));
        if !candidate.exists() {
            return candidate;
        }
    }
    unreachable!("suffix space exhausted")
}

fn is_cross_device(e: &std::io::Error) -> bool {
    // EXDEV is 18 on Linux and macOS
    e.raw_os_error() == Some(18)
}
