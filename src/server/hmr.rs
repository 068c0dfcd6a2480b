//! Live reload channel

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::rebuild::RebuildOutcome;
use super::ServerState;

/// Reload message types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HmrMessage {
    /// Connection established
    Connected,

    /// Full page reload required
    FullReload { reason: String },

    /// A rebuild was published
    Update {
        generation: u64,
        /// Chunks whose content hash changed
        chunks: Vec<String>,
    },

    /// Rebuild failed; the previous output is still served
    Error { message: String },
}

impl HmrMessage {
    /// Message for a finished rebuild, if clients need to hear about it
    pub fn from_outcome(outcome: &RebuildOutcome) -> Option<Self> {
        match outcome {
            RebuildOutcome::Published {
                generation,
                changed,
                ..
            } if !changed.is_empty() => Some(HmrMessage::Update {
                generation: *generation,
                chunks: changed.clone(),
            }),
            RebuildOutcome::Published {
                static_changed: true,
                ..
            } => Some(HmrMessage::FullReload {
                reason: "static files changed".to_string(),
            }),
            RebuildOutcome::Published { .. } => None,
            RebuildOutcome::Superseded { .. } => None,
            RebuildOutcome::Failed { error, .. } => Some(HmrMessage::Error {
                message: error.clone(),
            }),
        }
    }
}

/// Handle WebSocket upgrade for live reload
pub(super) async fn hmr_websocket(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> Response {
    ws.on_upgrade(|socket| handle_hmr_socket(socket, state))
}

/// Handle a live reload WebSocket connection
async fn handle_hmr_socket(socket: WebSocket, state: Arc<ServerState>) {
    let (mut sender, mut receiver) = socket.split();

    let mut hmr_rx = state.hmr_tx.subscribe();

    if let Ok(json) = serde_json::to_string(&HmrMessage::Connected) {
        let _ = sender.send(Message::Text(json)).await;
    }

    debug!("Reload client connected");

    let send_task = tokio::spawn(async move {
        while let Ok(message) = hmr_rx.recv().await {
            if let Ok(json) = serde_json::to_string(&message) {
                if sender.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            if let Message::Close(_) = message {
                debug!("Reload client disconnected");
                break;
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    debug!("Reload connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_wire_format() {
        let update = HmrMessage::Update {
            generation: 3,
            chunks: vec!["main".into()],
        };
        assert_eq!(
            serde_json::to_string(&update).unwrap(),
            r#"{"type":"update","generation":3,"chunks":["main"]}"#
        );
        assert_eq!(
            serde_json::to_string(&HmrMessage::FullReload { reason: "x".into() }).unwrap(),
            r#"{"type":"full-reload","reason":"x"}"#
        );
    }

    #[test]
    fn test_outcome_messages() {
        assert_eq!(
            HmrMessage::from_outcome(&RebuildOutcome::Superseded { generation: 1 }),
            None
        );
        assert_eq!(
            HmrMessage::from_outcome(&RebuildOutcome::Published {
                generation: 2,
                changed: Vec::new(),
                static_changed: false,
            }),
            None
        );
        assert_eq!(
            HmrMessage::from_outcome(&RebuildOutcome::Published {
                generation: 2,
                changed: Vec::new(),
                static_changed: true,
            }),
            Some(HmrMessage::FullReload {
                reason: "static files changed".into()
            })
        );
        assert_eq!(
            HmrMessage::from_outcome(&RebuildOutcome::Published {
                generation: 4,
                changed: vec!["main".into()],
                static_changed: true,
            }),
            Some(HmrMessage::Update {
                generation: 4,
                chunks: vec!["main".into()],
            })
        );
        assert_eq!(
            HmrMessage::from_outcome(&RebuildOutcome::Failed {
                generation: 3,
                error: "boom".into()
            }),
            Some(HmrMessage::Error {
                message: "boom".into()
            })
        );
    }
}
