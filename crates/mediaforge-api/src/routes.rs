//! HTTP route definitions.
//!
//! ```text
//! /api/generations
//!   POST   /api/generations            - Submit a generation (multipart)
//!   GET    /api/generations/{task_id}  - Run status snapshot
//!
//! /api/media
//!   GET    /api/media        - List catalog entries (newest first)
//!   GET    /api/media/{uid}  - Get one catalog entry
//!
//! /media/{file}  - Generated media files (static)
//! /ws/{task_id}  - WebSocket progress subscription
//! /health        - Liveness summary
//! ```

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::http::{catalog, generate, monitoring};
use crate::state::AppState;
use crate::websocket::ws_handler;

/// Build the application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let media_dir = state.storage.media_dir.clone();

    let generation_routes = Router::new()
        .route("/", post(generate::start_generation))
        .route("/{task_id}", get(generate::generation_status))
        .with_state(state.clone());

    let catalog_routes = Router::new()
        .route("/", get(catalog::list_media))
        .route("/{uid}", get(catalog::get_media))
        .with_state(state.clone());

    Router::new()
        .nest("/api/generations", generation_routes)
        .nest("/api/media", catalog_routes)
        .route("/ws/{task_id}", get(ws_handler))
        .route("/health", get(monitoring::health_check))
        .nest_service("/media", ServeDir::new(media_dir))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
