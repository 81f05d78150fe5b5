//! Broadcast Hub
//!
//! Owns the connection registry and fans envelopes out to its members.
//! Point-to-point replies (welcome, confirmation, error) go through here too
//! so every write to a connection shares the same failure handling.

use chrono::Utc;
use serde_json::Value;
use thiserror::Error;

use super::registry::{Connection, ConnectionId, ConnectionRegistry, ReadyState};
use crate::codec::{self, is_empty_message, Envelope, EnvelopeType, ProtocolError};

/// Configuration for the broadcast hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Text of the info envelope sent to every new connection
    pub welcome_message: String,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            welcome_message: "Connected to WebSocket server".to_string(),
        }
    }
}

/// Fans envelopes out to every live connection
pub struct BroadcastHub {
    registry: ConnectionRegistry,
    config: HubConfig,
}

impl BroadcastHub {
    /// Create a hub with an empty registry
    pub fn new(config: HubConfig) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            config,
        }
    }

    /// Add a connection whose handshake just completed and greet it
    ///
    /// The welcome is queued before the connection joins the live set, so no
    /// broadcast can overtake it.
    pub async fn register(&self, connection: Connection) -> ConnectionId {
        connection.set_state(ReadyState::Open);
        let welcome = Envelope::info(self.config.welcome_message.clone(), connection.id());
        if let Err(e) = deliver(&connection, &welcome) {
            tracing::warn!(
                connection_id = %connection.id(),
                error = %e,
                "Failed to send welcome message"
            );
        }

        let id = self.registry.insert(connection).await;
        let count = self.registry.len().await;
        tracing::info!(connection_id = %id, clients = count, "WebSocket connected");

        id
    }

    /// Remove a connection. Unknown ids are ignored.
    pub async fn unregister(&self, id: &str) -> bool {
        let Some(connection) = self.registry.remove(id).await else {
            return false;
        };
        let count = self.registry.len().await;
        let connected_secs = (Utc::now() - connection.joined_at()).num_seconds();
        tracing::info!(
            connection_id = %id,
            clients = count,
            connected_secs,
            "WebSocket disconnected"
        );
        true
    }

    /// Deliver an envelope to every connection in the live set
    ///
    /// Returns how many connections the snapshot held, which is the number
    /// of intended recipients rather than confirmed deliveries.
    pub async fn broadcast(&self, envelope: &Envelope) -> usize {
        let snapshot = self.registry.snapshot().await;
        let recipients = snapshot.len();

        let text = match codec::encode(envelope) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode broadcast");
                return recipients;
            }
        };

        let mut delivered = 0;
        for connection in &snapshot {
            if !connection.is_open() {
                continue;
            }
            match connection.send(text.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        connection_id = %connection.id(),
                        error = %e,
                        "Broadcast delivery failed"
                    );
                }
            }
        }

        tracing::debug!(recipients, delivered, "Broadcast sent");
        recipients
    }

    /// Broadcast a caller-supplied message stamped with the current time
    pub async fn trigger(&self, message: Option<Value>) -> Result<usize, HubError> {
        let message = match message {
            Some(message) if !is_empty_message(&message) => message,
            _ => return Err(HubError::MessageRequired),
        };

        Ok(self.broadcast(&Envelope::broadcast(message)).await)
    }

    /// Handle a text frame received from one connection
    ///
    /// The sender always gets a reply of its own: a confirmation echoing the
    /// text, or an error envelope if the text is not JSON. A well-formed
    /// `broadcast` envelope is additionally fanned out to everyone.
    pub async fn handle_inbound(&self, id: &str, text: &str) {
        let reply = match codec::decode(text) {
            Ok(value) => {
                tracing::debug!(connection_id = %id, "Received message");
                self.relay_client_broadcast(id, value).await;
                Envelope::confirmation(text)
            }
            Err(e) => {
                tracing::debug!(connection_id = %id, error = %e, "Invalid client message");
                Envelope::error("Invalid message format")
            }
        };

        if let Err(e) = self.send_to(id, &reply).await {
            tracing::warn!(connection_id = %id, error = %e, "Failed to reply");
        }
    }

    async fn relay_client_broadcast(&self, id: &str, value: Value) {
        let Ok(envelope) = serde_json::from_value::<Envelope>(value) else {
            return;
        };
        if envelope.kind != EnvelopeType::Broadcast {
            return;
        }
        match self.trigger(Some(envelope.message)).await {
            Ok(recipients) => {
                tracing::info!(connection_id = %id, recipients, "Client broadcast relayed");
            }
            Err(e) => {
                tracing::debug!(connection_id = %id, error = %e, "Client broadcast ignored");
            }
        }
    }

    /// Send an envelope to one connection
    pub async fn send_to(&self, id: &str, envelope: &Envelope) -> Result<(), HubError> {
        let connection = self
            .registry
            .get(id)
            .await
            .ok_or(HubError::ConnectionNotFound)?;
        deliver(&connection, envelope)
    }

    /// Get the current connection count
    pub async fn connection_count(&self) -> usize {
        self.registry.len().await
    }
}

fn deliver(connection: &Connection, envelope: &Envelope) -> Result<(), HubError> {
    let text = codec::encode(envelope)?;
    connection.send(text)
}

/// Errors that can occur in the broadcast hub
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Message is required")]
    MessageRequired,

    #[error("Connection not found")]
    ConnectionNotFound,

    #[error("Connection is not open")]
    ConnectionClosed,

    #[error("Failed to send message")]
    SendFailed,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
