//! Realtime channel.
//!
//! Every committed reservation transition and space change is pushed to every
//! open connection, whether or not it joined the plan's room.
//!
//! ```text
//! Client          Handler                 Broadcaster
//!   │                │                         │
//!   ├─ Upgrade ─────>│  authenticate token     │
//!   │<─ connected ───┤                         │
//!   │                ├─ subscribe() ──────────>│
//!   ├─ join_plano ──>│                         │
//!   │<─ joined_plano ┤                         │
//!   │                │<── envelope ────────────┤
//!   │<─ envelope ────┤                         │
//! ```
//!
//! # Message Protocol
//!
//! **Client → Server:**
//! ```json
//! { "type": "join_plano", "plano_id": "..." }
//! { "type": "leave_plano", "plano_id": "..." }
//! { "type": "ping" }
//! ```
//!
//! **Server → Client (control):**
//! ```json
//! { "type": "connected", "authenticated": true }
//! { "type": "auth_error", "message": "..." }
//! { "type": "joined_plano", "plano_id": "..." }
//! { "type": "pong" }
//! ```
//!
//! **Server → Client (domain):**
//! ```json
//! { "event": "reservation_updated", "reservation": { ... }, "plano_id": "..." }
//! ```

use crate::error::AppError;
use crate::extractors::BearerToken;
use crate::state::RealtimeState;
use axum::{
    extract::{
        Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, stream::StreamExt};
use serde::{Deserialize, Serialize};
use standbook_core::PlanId;
use standbook_runtime::metrics::BroadcastMetrics;
use std::collections::HashSet;
use tokio::sync::{OwnedSemaphorePermit, broadcast::error::RecvError, mpsc};
use tracing::{debug, info, warn};

/// Control messages sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once the connection is open
    Connected {
        /// Whether a valid credential was presented
        authenticated: bool,
    },
    /// Credential rejected; the connection closes after this message
    AuthError {
        /// Reason
        message: String,
    },
    /// Room joined
    JoinedPlano {
        /// Plan room
        plano_id: PlanId,
    },
    /// Room left
    LeftPlano {
        /// Plan room
        plano_id: PlanId,
    },
    /// Reply to a client ping
    Pong,
    /// Client frame could not be understood
    Error {
        /// Reason
        message: String,
    },
}

/// Messages accepted from clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join a plan room
    JoinPlano {
        /// Plan room
        plano_id: PlanId,
    },
    /// Leave a plan room
    LeavePlano {
        /// Plan room
        plano_id: PlanId,
    },
    /// Application-level keep-alive
    Ping,
}

/// Query string of the upgrade request.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    /// Credential, as an alternative to the `Authorization` header
    pub token: Option<String>,
}

/// `GET /ws` upgrade handler.
///
/// Answers 503 once the connection limit is reached.
#[allow(clippy::unused_async)] // Axum handler signature requires async
pub async fn handle(
    ws: WebSocketUpgrade,
    State(state): State<RealtimeState>,
    Query(params): Query<ConnectParams>,
    headers: HeaderMap,
) -> Response {
    let Ok(permit) = state.slots.clone().try_acquire_owned() else {
        warn!(
            max_connections = state.limits.max_connections,
            "Realtime connection limit reached"
        );
        return AppError::unavailable("Too many realtime connections").into_response();
    };

    let token = params
        .token
        .filter(|t| !t.is_empty())
        .or(BearerToken::from_headers(&headers).0);

    ws.on_upgrade(move |socket| handle_socket(socket, state, token, permit))
}

fn encode<T: Serialize>(message: &T) -> Option<Message> {
    match serde_json::to_string(message) {
        Ok(json) => Some(Message::Text(json)),
        Err(e) => {
            warn!(error = %e, "Failed to serialize realtime message");
            None
        }
    }
}

/// Connection lifecycle.
///
/// Runs two tasks:
/// 1. **Sender**: envelopes, control replies and protocol pings to the client
/// 2. **Receiver**: client frames, with an idle timeout
#[allow(clippy::cognitive_complexity)]
async fn handle_socket(
    mut socket: WebSocket,
    state: RealtimeState,
    token: Option<String>,
    permit: OwnedSemaphorePermit,
) {
    let authenticated = match token {
        None => false,
        Some(token) => match state.authenticator.authenticate(&token).await {
            Ok(identity) => {
                debug!(user_id = %identity.user_id, "Realtime client authenticated");
                true
            }
            Err(e) => {
                info!(error = %e, "Realtime credential rejected");
                if let Some(message) = encode(&ServerMessage::AuthError {
                    message: e.to_string(),
                }) {
                    let _ = socket.send(message).await;
                }
                let _ = socket.send(Message::Close(None)).await;
                return;
            }
        },
    };

    BroadcastMetrics::record_connections(state.connections());
    info!(authenticated, "Realtime connection established");

    let (mut sender, mut receiver) = socket.split();
    let mut envelopes = state.broadcaster.subscribe();
    let (reply_tx, mut reply_rx) = mpsc::channel::<ServerMessage>(32);
    let _ = reply_tx.send(ServerMessage::Connected { authenticated }).await;

    let ping_interval = state.limits.ping_interval;
    let mut send_task = tokio::spawn(async move {
        let mut ping = tokio::time::interval(ping_interval);
        ping.tick().await;

        loop {
            let message = tokio::select! {
                envelope = envelopes.recv() => match envelope {
                    Ok(envelope) => encode(envelope.as_ref()),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Realtime client lagging, envelopes skipped");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                },
                reply = reply_rx.recv() => match reply {
                    Some(reply) => encode(&reply),
                    None => break,
                },
                _ = ping.tick() => Some(Message::Ping(Vec::new())),
            };

            if let Some(message) = message {
                if sender.send(message).await.is_err() {
                    break;
                }
            }
        }

        debug!("Realtime send task terminated");
    });

    let idle_timeout = state.limits.idle_timeout;
    let mut recv_task = tokio::spawn(async move {
        let mut rooms = HashSet::new();

        loop {
            let frame = match tokio::time::timeout(idle_timeout, receiver.next()).await {
                Ok(Some(Ok(frame))) => frame,
                Ok(Some(Err(e))) => {
                    debug!(error = %e, "Realtime receive error");
                    break;
                }
                Ok(None) => break,
                Err(_) => {
                    info!("Realtime connection idle, closing");
                    break;
                }
            };

            let reply = match frame {
                Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::JoinPlano { plano_id }) => {
                        rooms.insert(plano_id);
                        debug!(%plano_id, rooms = rooms.len(), "Joined plan room");
                        ServerMessage::JoinedPlano { plano_id }
                    }
                    Ok(ClientMessage::LeavePlano { plano_id }) => {
                        rooms.remove(&plano_id);
                        debug!(%plano_id, rooms = rooms.len(), "Left plan room");
                        ServerMessage::LeftPlano { plano_id }
                    }
                    Ok(ClientMessage::Ping) => ServerMessage::Pong,
                    Err(e) => {
                        debug!(error = %e, "Unparseable realtime message");
                        ServerMessage::Error {
                            message: format!("invalid message: {e}"),
                        }
                    }
                },
                Message::Close(_) => {
                    debug!("Client requested close");
                    break;
                }
                // Axum answers protocol pings itself.
                Message::Binary(_) | Message::Ping(_) | Message::Pong(_) => continue,
            };

            if reply_tx.send(reply).await.is_err() {
                break;
            }
        }

        debug!("Realtime receive task terminated");
    });

    tokio::select! {
        _ = (&mut send_task) => {
            debug!("Send task completed, aborting receive task");
            recv_task.abort();
        },
        _ = (&mut recv_task) => {
            debug!("Receive task completed, aborting send task");
            send_task.abort();
        },
    }

    drop(permit);
    BroadcastMetrics::record_connections(state.connections());
    info!("Realtime connection closed");
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;

    #[test]
    fn test_client_messages_parse() {
        let plano_id = PlanId::new();
        let join: ClientMessage =
            serde_json::from_str(&format!(r#"{{"type":"join_plano","plano_id":"{plano_id}"}}"#))
                .expect("Deserialize");
        assert_eq!(join, ClientMessage::JoinPlano { plano_id });

        let ping: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).expect("Deserialize");
        assert_eq!(ping, ClientMessage::Ping);

        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"command"}"#).is_err());
    }

    #[test]
    fn test_server_messages_serialize() {
        let json = serde_json::to_string(&ServerMessage::Connected {
            authenticated: false,
        })
        .expect("Serialize");
        assert_eq!(json, r#"{"type":"connected","authenticated":false}"#);

        let json = serde_json::to_string(&ServerMessage::AuthError {
            message: "expired".to_string(),
        })
        .expect("Serialize");
        assert_eq!(json, r#"{"type":"auth_error","message":"expired"}"#);

        let json = serde_json::to_string(&ServerMessage::Pong).expect("Serialize");
        assert_eq!(json, r#"{"type":"pong"}"#);
    }
}
