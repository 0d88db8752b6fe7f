//! Catalog error types.

use std::path::PathBuf;
use thiserror::Error;

pub type CatalogResult<T> = Result<T, CatalogError>;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog database not found: {0}")]
    NotFound(PathBuf),

    #[error("catalog is missing required table '{0}'")]
    SchemaMissing(&'static str),

    #[error("transcript for {video_id} is corrupt: {source}")]
    CorruptTranscript {
        video_id: String,
        source: stitch_models::TranscriptError,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
