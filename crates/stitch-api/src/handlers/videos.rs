//! Generated video downloads, sandboxed to the output directory.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// `GET /videos/{filename}`: stream a generated file.
///
/// Filenames that are hidden, contain path separators or traversal
/// components are treated as not found.
pub async fn serve_video(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<Response> {
    if !is_safe_filename(&filename) {
        debug!(filename = %filename, "Rejected unsafe video filename");
        return Err(ApiError::not_found(&filename));
    }

    let path = state.base_pipeline.output_dir.join(&filename);
    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(|_| ApiError::not_found(&filename))?;
    if !metadata.is_file() {
        return Err(ApiError::not_found(&filename));
    }

    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|_| ApiError::not_found(&filename))?;
    let stream = ReaderStream::new(file);

    let content_type = if filename.ends_with(".mp4") {
        "video/mp4"
    } else {
        "application/octet-stream"
    };

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_LENGTH, metadata.len().to_string()),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

/// A filename is safe when it names a plain, visible file in the output
/// directory itself.
fn is_safe_filename(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains("..")
        && !name.contains('\0')
}
