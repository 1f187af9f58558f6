//! # Mediaforge API
//!
//! The HTTP surface: generation submission (multipart), run status, the
//! WebSocket progress subscription, catalog reads, and health. Requests
//! validate and return immediately; the pipeline runs detached and reports
//! through the progress channel.

mod engine_events;
mod error;
mod http;
mod routes;
mod server;
mod state;
mod websocket;

pub use engine_events::spawn_engine_event_pump;
pub use error::ApiError;
pub use routes::create_router;
pub use server::ApiServer;
pub use state::AppState;
