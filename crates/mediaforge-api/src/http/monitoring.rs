//! Health endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

use crate::state::AppState;

/// `GET /health`: liveness summary.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "uptime_secs": state.uptime().as_secs(),
        "active_runs": state.progress.run_count(),
        "catalog_entries": state.catalog.len().await,
    }))
}
