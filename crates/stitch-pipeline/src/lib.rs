//! Planning and orchestration for wordstitch video composition.
//!
//! The [`Pipeline`] turns an input sentence into a finished video:
//! greedy phrase planning against the clip catalog, bounded parallel
//! fetch/transcode with in-order emission, concatenation and optional
//! audio enhancement. Jobs own a scratch directory that is removed on
//! every exit path.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod planner;
pub mod reorder;
pub mod scratch;

pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use pipeline::{JobRequest, Pipeline, ProgressCallback};
pub use planner::{plan, ClipSource, Plan};
