//! Delegated caption search.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    pub lang: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    20
}

/// `GET /search`: forwarded to the configured provider; this service
/// does not implement the search index itself.
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let q = query.q.trim();
    if q.is_empty() {
        return Err(ApiError::bad_request("q is required"));
    }

    match &state.search {
        Some(provider) => {
            let results = provider
                .search(q, query.lang.as_deref(), query.limit)
                .await?;
            Ok(Json(results))
        }
        None => Err(ApiError::NotImplemented(
            "search is not configured on this deployment".to_string(),
        )),
    }
}
