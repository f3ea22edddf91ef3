//! WebSocket session transport

use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::AppState;
use crate::session::Session;

/// Structured inbound frame; plain text frames are accepted too
#[derive(Debug, Deserialize)]
struct InboundFrame {
    content: String,
}

/// GET /ws - start a brand new session
pub async fn new_session(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let session_id = Uuid::now_v7().to_string();
    debug!(%session_id, "new_session: called");
    ws.on_upgrade(move |socket| handle_socket(socket, state, session_id))
}

/// GET /ws/{session_id} - join or resume a session
pub async fn existing_session(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    debug!(%session_id, "existing_session: called");
    ws.on_upgrade(move |socket| handle_socket(socket, state, session_id))
}

fn inbound_content(text: &str) -> String {
    match serde_json::from_str::<InboundFrame>(text) {
        Ok(frame) if !frame.content.trim().is_empty() => frame.content,
        _ => text.to_string(),
    }
}

async fn handle_socket(socket: WebSocket, state: AppState, session_id: String) {
    let session = state.registry.get_or_create(&session_id).await;
    let (sender, receiver) = socket.split();
    bridge(session, sender, receiver).await;
}

/// Pump frames between a session and one connection until either side stops
async fn bridge<S, R, E>(session: Arc<Session>, mut sender: S, mut receiver: R)
where
    S: Sink<WsMessage> + Unpin + Send + 'static,
    R: Stream<Item = Result<WsMessage, E>> + Unpin + Send + 'static,
    E: Send + 'static,
{
    let session_id = session.id().to_string();
    let (generation, mut frames) = session.attach();
    info!(%session_id, generation, "connection attached");

    // Ends when this connection is replaced or the socket stops accepting writes
    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = frames.recv().await {
            let text = match serde_json::to_string(&frame) {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "failed to encode outbound frame");
                    continue;
                }
            };
            if sender.send(WsMessage::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let inbound = session.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            match message {
                WsMessage::Text(text) => inbound.deliver(&inbound_content(text.as_str())),
                WsMessage::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    session.detach(generation);
    info!(%session_id, generation, "connection closed");
}
