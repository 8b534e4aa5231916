use std::sync::Arc;

use axum::extract::ws::Message;
use tokio::sync::broadcast;

use n3_events::CoordinationEvent;

use crate::ws::manager::WsManager;

/// Spawn a task relaying bus events to WebSocket clients as JSON text
/// frames.
///
/// Exits when the bus is dropped. A lagging receiver skips the missed
/// events and keeps going.
pub fn start_event_forwarder(
    ws_manager: Arc<WsManager>,
    mut receiver: broadcast::Receiver<CoordinationEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::error!(error = %e, event_type = %event.event_type, "Failed to serialize event");
                            continue;
                        }
                    };
                    let sent = ws_manager
                        .send_to_run(event.run_id, Message::Text(text.into()))
                        .await;
                    tracing::trace!(event_type = %event.event_type, sent, "Event pushed to WebSocket clients");
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "WebSocket forwarder lagged behind event bus");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, WebSocket forwarder stopping");
                    break;
                }
            }
        }
    })
}
