//! Per-job scratch directory lifecycle.

use std::path::{Path, PathBuf};

use stitch_models::JobId;
use tracing::{debug, warn};

/// A job-owned scratch directory, removed on drop on every exit path
/// unless the job was configured to keep temp files.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
    keep: bool,
}

impl ScratchDir {
    /// Create `<root>/job-<id>/` with `downloads/` and `processed/`
    /// subdirectories.
    pub async fn create(root: &Path, job_id: &JobId, keep: bool) -> std::io::Result<Self> {
        let path = root.join(format!("job-{}", job_id));
        tokio::fs::create_dir_all(path.join("downloads")).await?;
        tokio::fs::create_dir_all(path.join("processed")).await?;
        debug!(path = %path.display(), "Created scratch directory");
        Ok(Self { path, keep })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn downloads(&self) -> PathBuf {
        self.path.join("downloads")
    }

    pub fn processed(&self) -> PathBuf {
        self.path.join("processed")
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if self.keep {
            debug!(path = %self.path.display(), "Keeping scratch directory");
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "Failed to remove scratch directory");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scratch_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let job_id = JobId::new();

        let path = {
            let scratch = ScratchDir::create(root.path(), &job_id, false).await.unwrap();
            assert!(scratch.downloads().exists());
            assert!(scratch.processed().exists());
            tokio::fs::write(scratch.path().join("leftover.mp4"), b"x")
                .await
                .unwrap();
            scratch.path().to_path_buf()
        };

        assert!(!path.exists(), "scratch directory must be removed on drop");
    }

    #[tokio::test]
    async fn test_scratch_kept_when_requested() {
        let root = tempfile::tempdir().unwrap();
        let job_id = JobId::new();

        let path = {
            let scratch = ScratchDir::create(root.path(), &job_id, true).await.unwrap();
            scratch.path().to_path_buf()
        };

        assert!(path.exists());
    }
}
