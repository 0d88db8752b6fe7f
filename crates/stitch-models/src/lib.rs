//! Shared data models for the wordstitch backend.
//!
//! This crate provides Serde-serializable types for:
//! - Word clips, phrase hits and planner segment picks
//! - Video transcripts (word-level timings)
//! - The fixed intermediate media profile
//! - Pipeline jobs, statuses and word timings
//! - Text normalization and phrase hashing

pub mod clip;
pub mod job;
pub mod normalize;
pub mod profile;
pub mod transcript;

// Re-export common types
pub use clip::{PhraseHit, SegmentPick, VideoId, WordClip, WordSpan};
pub use job::{JobId, JobOutcome, JobStatus, WordTiming};
pub use normalize::{normalize, phrase_hash, tokenize};
pub use profile::{AspectRatio, AspectRatioError, EncodingSettings, MediaProfile};
pub use transcript::{Transcript, TranscriptError, TranscriptWord};
