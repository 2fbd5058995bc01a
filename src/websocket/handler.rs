//! WebSocket Handler
//!
//! Handles WebSocket upgrade requests and manages the connection lifecycle.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::connection::Connection;
use super::messages::ServerMessage;
use crate::api::AppState;
use crate::session::{Frame, MessageSink, SessionRegistry};

/// WebSocket upgrade handler
///
/// This is the entry point for WebSocket connections.
/// It upgrades the HTTP connection to WebSocket and starts message handling.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    let registry = Arc::clone(&state.registry);
    let shutdown = state.shutdown.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, registry, shutdown))
}

/// Handle an established WebSocket connection
async fn handle_socket(
    socket: WebSocket,
    registry: Arc<SessionRegistry>,
    shutdown: CancellationToken,
) {
    let (mut sender, mut receiver) = socket.split();

    // Everything bound for this client goes through the channel
    let (tx, mut rx) = mpsc::unbounded_channel::<Frame>();
    let sink: Arc<dyn MessageSink> = Arc::new(tx);
    let mut connection = Connection::new(registry, sink);
    let connection_id = connection.id().to_string();

    tracing::info!(participant_id = %connection_id, "WebSocket connected");

    let conn_id_for_send = connection_id.clone();

    // Task to forward frames from channel to WebSocket
    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sender.send(Message::Text(frame.to_string())).await.is_err() {
                tracing::debug!(
                    participant_id = %conn_id_for_send,
                    "WebSocket send failed, closing connection"
                );
                break;
            }
        }
        let _ = sender.close().await;
    });

    let conn_id_for_recv = connection_id.clone();
    let read_loop = async {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(msg) => {
                    if !handle_ws_message(&mut connection, msg).await {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(
                        participant_id = %conn_id_for_recv,
                        error = %e,
                        "WebSocket receive error"
                    );
                    break;
                }
            }
        }
    };

    // Whichever side ends first ends the connection
    tokio::select! {
        _ = read_loop => {}
        _ = &mut send_task => {}
        _ = shutdown.cancelled() => {
            tracing::debug!(participant_id = %connection_id, "Closing connection for shutdown");
        }
    }

    // Cleanup: leave the room exactly once, then stop the writer
    connection.close().await;
    send_task.abort();

    tracing::info!(participant_id = %connection_id, "WebSocket disconnected");
}

/// Handle a received WebSocket message
///
/// Returns false if the connection should be closed.
async fn handle_ws_message(connection: &mut Connection, message: Message) -> bool {
    match message {
        Message::Text(text) => {
            connection.handle_text(&text).await;
            true
        }
        Message::Binary(_) => {
            connection.reply(&ServerMessage::error("Binary messages not supported"));
            true
        }
        Message::Ping(_) | Message::Pong(_) => {
            // Axum answers pings itself
            true
        }
        Message::Close(_) => {
            tracing::debug!(participant_id = %connection.id(), "Client requested close");
            false
        }
    }
}
