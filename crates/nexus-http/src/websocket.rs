//! WebSocket handler for real-time session events.
//!
//! Clients connect to `/ws` and receive every `SessionEvent` as a JSON text
//! frame. They may send `{"type":"ping"}` (answered with a pong) or
//! `{"type":"subscribe","session_id":...}` to get the current snapshot of an
//! active session immediately.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use nexus_core::SessionKey;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use super::SharedState;

/// A send that cannot complete within this window means the client has
/// stopped reading.
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Message sent by a client.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ClientMessage {
    Ping,
    Subscribe { session_id: SessionKey },
}

/// Handler for GET /ws
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<SharedState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Handle an individual WebSocket connection.
///
/// Bus events and replies to client messages share one send path. The
/// connection ends on the first failed or timed-out send, when the client
/// closes, or when the bus drops this subscriber for falling behind.
async fn handle_socket(socket: WebSocket, state: Arc<SharedState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut subscription = state.context.event_bus.subscribe();
    log::debug!("WebSocket connected as subscriber {}", subscription.id());

    loop {
        let outgoing = tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => match reply_to(&state, text.as_str()) {
                    Some(reply) => reply,
                    None => continue,
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    log::debug!("WebSocket receive error: {}", e);
                    break;
                }
            },
            event = subscription.recv() => match event {
                Some(event) => match serde_json::to_string(&event) {
                    Ok(json) => json,
                    Err(e) => {
                        log::warn!("Failed to encode session event: {}", e);
                        continue;
                    }
                },
                None => break,
            },
        };

        match tokio::time::timeout(SEND_TIMEOUT, sender.send(Message::Text(outgoing.into()))).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => break, // Client disconnected
            Err(_) => {
                log::warn!("WebSocket client stopped reading; closing connection");
                break;
            }
        }
    }

    state.context.event_bus.unsubscribe(subscription.id());
    log::debug!("WebSocket connection closed");
}

/// Build the reply for one client text frame, if it warrants one.
fn reply_to(state: &SharedState, text: &str) -> Option<String> {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            log::debug!("Ignoring unrecognized WebSocket message: {}", e);
            return None;
        }
    };

    match message {
        ClientMessage::Ping => Some(json!({ "type": "pong" }).to_string()),
        ClientMessage::Subscribe { session_id } => {
            let session = state.context.registry.get(&session_id).ok()?;
            Some(
                json!({
                    "type": "session_update",
                    "session_id": session_id,
                    "data": session,
                })
                .to_string(),
            )
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_core::mission::{AgentRole, DifficultyMode};
    use nexus_core::session::SessionStart;
    use nexus_core::EngineContext;
    use serde_json::Value;

    fn state_with_session(key: &str) -> SharedState {
        let state = SharedState::new(EngineContext::default());
        state
            .context
            .registry
            .start(SessionStart {
                key: SessionKey::new(key),
                team_name: "Ravens".to_string(),
                role: AgentRole::Infiltrator,
                agent_color: "#651FFF".to_string(),
                difficulty: DifficultyMode::Tactical,
            })
            .unwrap();
        state
    }

    #[test]
    fn client_message_deserialization() {
        assert_eq!(
            serde_json::from_str::<ClientMessage>(r#"{"type":"ping"}"#).unwrap(),
            ClientMessage::Ping
        );
        assert_eq!(
            serde_json::from_str::<ClientMessage>(r#"{"type":"subscribe","session_id":"abc"}"#).unwrap(),
            ClientMessage::Subscribe {
                session_id: SessionKey::new("abc")
            }
        );
    }

    #[test]
    fn ping_gets_pong() {
        let state = state_with_session("a");
        let reply = reply_to(&state, r#"{"type":"ping"}"#).unwrap();
        assert_eq!(serde_json::from_str::<Value>(&reply).unwrap(), json!({ "type": "pong" }));
    }

    #[test]
    fn subscribe_returns_active_snapshot() {
        let state = state_with_session("a");
        let reply = reply_to(&state, r#"{"type":"subscribe","session_id":"a"}"#).unwrap();
        let value: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(value["type"], "session_update");
        assert_eq!(value["data"]["team_name"], "Ravens");
        assert_eq!(value["data"]["selected_agent"], "infiltrator");
    }

    #[test]
    fn subscribe_to_unknown_session_is_silent() {
        let state = state_with_session("a");
        assert!(reply_to(&state, r#"{"type":"subscribe","session_id":"zzz"}"#).is_none());
    }

    #[test]
    fn garbage_is_ignored() {
        let state = state_with_session("a");
        assert!(reply_to(&state, "not json").is_none());
        assert!(reply_to(&state, r#"{"type":"dance"}"#).is_none());
    }
}
