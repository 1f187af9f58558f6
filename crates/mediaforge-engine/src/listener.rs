//! WebSocket push-event listener.

use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::events::EngineEvent;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Spawn a background task that keeps a WebSocket connection to the engine
/// open and forwards decoded [`EngineEvent`]s into `tx`.
///
/// The listener reconnects with a fixed delay after any disconnect. It stops
/// when the receiving side of `tx` is dropped.
pub fn spawn_listener(ws_url: String, tx: mpsc::Sender<EngineEvent>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if tx.is_closed() {
                return;
            }
            match connect_async(ws_url.as_str()).await {
                Ok((stream, _)) => {
                    info!(url = %ws_url, "engine push channel connected");
                    let (_, mut read) = stream.split();
                    while let Some(frame) = read.next().await {
                        match frame {
                            Ok(Message::Text(text)) => {
                                if let Some(event) = EngineEvent::decode(&text) {
                                    if tx.send(event).await.is_err() {
                                        return;
                                    }
                                }
                            }
                            Ok(Message::Close(_)) => {
                                debug!("engine push channel closed by peer");
                                break;
                            }
                            Ok(_) => {}
                            Err(e) => {
                                warn!(error = %e, "engine push channel error");
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(url = %ws_url, error = %e, "engine push channel connect failed");
                }
            }
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    })
}
