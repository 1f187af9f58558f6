//! # Mediaforge Engine
//!
//! Client for the external node-graph compute engine: media upload, graph
//! submission, bounded completion polling, best-effort memory release, and a
//! WebSocket listener for push progress events.
//!
//! Progress visibility and completion confirmation are deliberately
//! redundant: push frames drive the progress display, while completion is
//! confirmed by an idempotent poll so a dropped socket cannot hang a run.

mod api;
mod client;
mod events;
mod listener;
mod session;

pub use api::{CompletionStatus, SubmittedJob, UploadedMedia};
pub use client::{EngineClient, MediaUploadKind, StorageScope};
pub use events::EngineEvent;
pub use listener::spawn_listener;
pub use session::EngineSessionState;
