//! Pipeline error types.

use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("input text contains no usable words")]
    EmptyText,

    #[error("no segments could be rendered")]
    NothingRendered,

    #[error("job cancelled")]
    Cancelled,

    #[error("concatenation failed: {0}")]
    ConcatFailed(#[source] stitch_media::MediaError),

    #[error("catalog error: {0}")]
    Catalog(#[from] stitch_catalog::CatalogError),

    #[error("media error: {0}")]
    Media(#[from] stitch_media::MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Bad-request class errors: reject before a job is created.
    pub fn is_bad_request(&self) -> bool {
        matches!(self, PipelineError::EmptyText)
    }
}
