//! WebSocket progress subscription.

mod handler;

pub use handler::ws_handler;
