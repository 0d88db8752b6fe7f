//! Liveness endpoint.

use axum::Json;
use serde_json::{json, Value};

/// `GET /health`: constant liveness payload.
pub async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}
