//! Catalog read routes.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;

use mediaforge_catalog::{CatalogEntry, CatalogFilter};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct CatalogQuery {
    pub workflow: Option<String>,
    pub folder: Option<String>,
}

/// `GET /api/media`: list entries, newest first, optionally filtered.
pub async fn list_media(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CatalogQuery>,
) -> Json<Vec<CatalogEntry>> {
    let filter = CatalogFilter {
        workflow: query.workflow,
        folder: query.folder,
    };
    Json(state.catalog.list_filtered(&filter).await)
}

/// `GET /api/media/{uid}`: one entry.
pub async fn get_media(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<u64>,
) -> Result<Json<CatalogEntry>, ApiError> {
    state
        .catalog
        .find_by_uid(uid)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("catalog entry {uid}")))
}
