//! `WebSocket` endpoint for real-time events.
//!
//! Clients connect to `GET /ws`. On upgrade the socket is registered with
//! the [`Fanout`](atmo_core::Fanout) and from then on receives every
//! broadcast as a text frame of the form:
//!
//! ```json
//! {"event": "new_alert", "data": { ... full row ... }}
//! ```
//!
//! The connection is unregistered when the client closes, a read fails,
//! or a frame cannot be written within the configured send timeout.

use std::sync::Arc;

use atmo_core::Subscription;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// Upgrade an HTTP request to a `WebSocket` connection and begin
/// streaming real-time events.
///
/// # Route
///
/// `GET /ws`
pub async fn ws_events(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

/// Drive one connection until either side goes away, then unregister it.
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    let Subscription { id, mut rx } = state.fanout.connect();
    info!(connection_id = %id, clients = state.fanout.len(), "A client connected");

    loop {
        tokio::select! {
            queued = rx.recv() => {
                // `None` only if the registry pruned us.
                let Some(message) = queued else { break };
                let json = match serde_json::to_string(message.as_ref()) {
                    Ok(j) => j,
                    Err(e) => {
                        warn!(connection_id = %id, error = %e, "Failed to serialize event");
                        continue;
                    }
                };
                let send = socket.send(Message::Text(json.into()));
                match tokio::time::timeout(state.send_timeout, send).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        debug!(connection_id = %id, error = %e, "Send failed");
                        break;
                    }
                    Err(_) => {
                        warn!(connection_id = %id, "Send timed out, dropping client");
                        break;
                    }
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!(connection_id = %id, error = %e, "WebSocket read error");
                        break;
                    }
                    // Pings are answered by the protocol layer; clients have
                    // nothing else to say.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.fanout.disconnect(id);
    info!(connection_id = %id, clients = state.fanout.len(), "Client disconnected");
}
