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

use super::hub::BroadcastHub;
use super::registry::{Connection, ReadyState};
use crate::api::AppState;
use crate::codec::Envelope;

/// WebSocket upgrade handler
///
/// This is the entry point for WebSocket connections.
/// It upgrades the HTTP connection to WebSocket and starts message handling.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    let hub = Arc::clone(&state.hub);
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

/// Handle an established WebSocket connection
async fn handle_socket(socket: WebSocket, hub: Arc<BroadcastHub>) {
    let (mut sender, mut receiver) = socket.split();

    // Everything written to this socket goes through the channel
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let connection = Connection::new(tx);
    let connection_id = hub.register(connection.clone()).await;

    let conn_id_for_send = connection_id.clone();

    // Task to forward messages from channel to WebSocket
    let mut send_task = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sender.send(Message::Text(text)).await.is_err() {
                tracing::debug!(
                    connection_id = %conn_id_for_send,
                    "WebSocket send failed, closing connection"
                );
                break;
            }
        }
    });

    let hub_for_recv = Arc::clone(&hub);
    let conn_for_recv = connection.clone();

    // Task to receive messages from WebSocket and handle them
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(msg) => {
                    if !handle_ws_message(&hub_for_recv, &conn_for_recv, msg).await {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(
                        connection_id = %conn_for_recv.id(),
                        error = %e,
                        "WebSocket receive error"
                    );
                    break;
                }
            }
        }
    });

    // Wait for either task to complete
    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }

    hub.unregister(&connection_id).await;
}

/// Handle a received WebSocket message
///
/// Returns false if the connection should be closed.
async fn handle_ws_message(hub: &BroadcastHub, connection: &Connection, message: Message) -> bool {
    match message {
        Message::Text(text) => {
            hub.handle_inbound(connection.id(), &text).await;
            true
        }
        Message::Binary(bytes) => match std::str::from_utf8(&bytes) {
            Ok(text) => {
                hub.handle_inbound(connection.id(), text).await;
                true
            }
            Err(_) => {
                reject_binary(hub, connection.id()).await;
                true
            }
        },
        Message::Ping(_) | Message::Pong(_) => true,
        Message::Close(_) => {
            tracing::debug!(connection_id = %connection.id(), "Client requested close");
            connection.set_state(ReadyState::Closing);
            false
        }
    }
}

/// Answer a binary frame that is not UTF-8 text
async fn reject_binary(hub: &BroadcastHub, id: &str) {
    tracing::debug!(connection_id = %id, "Binary frame is not UTF-8");
    let error = Envelope::error("Invalid message format");
    if let Err(e) = hub.send_to(id, &error).await {
        tracing::warn!(connection_id = %id, error = %e, "Failed to reply");
    }
}
