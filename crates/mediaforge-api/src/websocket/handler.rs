//! WebSocket handler for progress subscriptions.
//!
//! A client may subscribe at any point in a run's lifetime; buffered events
//! replay first (see the progress channel), then live frames stream until a
//! terminal frame closes the connection.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// `GET /ws/{task_id}`: upgrade and stream progress.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(task_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, task_id))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>, task_id: String) {
    let Some(mut events) = state.progress.subscribe(&task_id) else {
        // The run never existed or was already evicted.
        let frame = json!({
            "status": "error",
            "message": format!("unknown task: {task_id}")
        });
        let _ = socket.send(Message::Text(frame.to_string().into())).await;
        let _ = socket.send(Message::Close(None)).await;
        return;
    };
    info!(%task_id, "progress subscriber connected");

    let (mut sender, mut receiver) = socket.split();
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    // Run record evicted; nothing more will arrive.
                    break;
                };
                let terminal = event.is_terminal();
                let frame = match serde_json::to_string(&event) {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!(%task_id, error = %e, "unserializable progress event");
                        continue;
                    }
                };
                if sender.send(Message::Text(frame.into())).await.is_err() {
                    debug!(%task_id, "subscriber went away");
                    break;
                }
                if terminal {
                    // Terminal statuses close the stream after delivery.
                    break;
                }
            }
            frame = receiver.next() => {
                match frame {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!(%task_id, error = %e, "subscriber socket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    let _ = sender.send(Message::Close(None)).await;
    info!(%task_id, "progress subscriber disconnected");
}
