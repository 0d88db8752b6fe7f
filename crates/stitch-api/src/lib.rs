//! HTTP composition service for wordstitch.
//!
//! Exposes the pipeline as `POST /generate-video`, serves finished files
//! under `/videos/{filename}`, and forwards `/search` to an optional
//! provider.

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::{AppState, SearchProvider};
