//! Bridge from engine push events to the progress channel.

#[cfg(test)]
#[path = "engine_events_tests.rs"]
mod tests;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::warn;

use mediaforge_engine::{EngineClient, EngineEvent, spawn_listener};
use mediaforge_progress::ProgressChannel;

/// Spawn the engine WebSocket listener and the pump that translates its
/// events into progress-channel calls.
pub fn spawn_engine_event_pump(
    engine: Arc<EngineClient>,
    client_id: &str,
    progress: Arc<ProgressChannel>,
) -> tokio::task::JoinHandle<()> {
    let (tx, mut rx) = mpsc::channel(256);
    let listener = spawn_listener(engine.ws_url(client_id), tx);
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            handle_engine_event(&progress, event);
        }
        listener.abort();
    })
}

/// Translate one engine event.
///
/// Execution errors are deliberately NOT forwarded as terminal frames: the
/// completion poll is the authority on failure, and a push-channel error
/// racing it would double-report.
pub(crate) fn handle_engine_event(progress: &Arc<ProgressChannel>, event: EngineEvent) {
    match event {
        EngineEvent::Executing {
            job_id,
            node: Some(node),
        } => progress.engine_node_event(&job_id, &node, 0, 0),
        EngineEvent::Executing { node: None, .. } => {}
        EngineEvent::Progress {
            job_id,
            node: Some(node),
            value,
            max,
        } => progress.engine_node_event(&job_id, &node, value, max),
        EngineEvent::Progress { node: None, .. } => {}
        EngineEvent::Cached { job_id, nodes } => {
            // Cached nodes will emit no further events; count them now.
            for node in nodes {
                progress.engine_node_event(&job_id, &node, 0, 0);
            }
        }
        EngineEvent::ExecutionError { job_id, message } => {
            warn!(%job_id, %message, "engine push channel reported an execution error");
        }
    }
}
