//! Pipeline job identity and results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Unique identifier for a pipeline job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix used in output filenames.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(8)]
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Terminal state of a pipeline job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Every pick rendered from a real clip
    Success,
    /// At least one pick rendered, some substituted or skipped
    Partial,
    /// Nothing rendered, or the final join failed
    Failed,
    /// Cancelled cooperatively before completion
    Cancelled,
}

impl JobStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Partial)
    }
}

/// Word-level timing in the final output. Ranges are non-decreasing and
/// their union covers `[0, output_duration]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTiming {
    pub word: String,
    pub start: f64,
    pub end: f64,
}

/// Result of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOutcome {
    pub job_id: JobId,
    pub status: JobStatus,
    /// Final output file; absent when the job failed before concatenation
    pub output_path: Option<PathBuf>,
    /// Pre-enhancement copy, present when keep-original was requested
    pub original_output_path: Option<PathBuf>,
    pub word_timings: Vec<WordTiming>,
    /// Input tokens with no catalog hit
    pub missing_tokens: Vec<String>,
    pub warnings: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl JobOutcome {
    pub fn output_duration(&self) -> f64 {
        self.word_timings.last().map(|t| t.end).unwrap_or(0.0)
    }
}
