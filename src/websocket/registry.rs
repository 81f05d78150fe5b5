//! Connection Registry
//!
//! The live set of accepted WebSocket connections.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use super::hub::HubError;

/// Unique identifier for a WebSocket connection
pub type ConnectionId = String;

/// Lifecycle of a server-side connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReadyState {
    Connecting = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

impl ReadyState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ReadyState::Connecting,
            1 => ReadyState::Open,
            2 => ReadyState::Closing,
            _ => ReadyState::Closed,
        }
    }
}

/// Handle for writing to one accepted connection
///
/// Cloning shares the ready state and the outbound channel, so the socket
/// task and the registry always agree on whether the connection is open.
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    joined_at: DateTime<Utc>,
    state: Arc<AtomicU8>,
    sender: mpsc::UnboundedSender<String>,
}

impl Connection {
    /// Wrap the writer channel of a connection that is still handshaking
    pub fn new(sender: mpsc::UnboundedSender<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            joined_at: Utc::now(),
            state: Arc::new(AtomicU8::new(ReadyState::Connecting as u8)),
            sender,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn joined_at(&self) -> DateTime<Utc> {
        self.joined_at
    }

    pub fn state(&self) -> ReadyState {
        ReadyState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: ReadyState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn is_open(&self) -> bool {
        self.state() == ReadyState::Open && !self.sender.is_closed()
    }

    /// Queue encoded text for the socket writer
    pub fn send(&self, text: String) -> Result<(), HubError> {
        if self.state() != ReadyState::Open {
            return Err(HubError::ConnectionClosed);
        }
        self.sender.send(text).map_err(|_| {
            self.set_state(ReadyState::Closed);
            HubError::SendFailed
        })
    }
}

/// Set of live connections, unique by identity
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, Connection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a connection open and add it to the live set
    pub async fn insert(&self, connection: Connection) -> ConnectionId {
        connection.set_state(ReadyState::Open);
        let id = connection.id.clone();
        self.connections.write().await.insert(id.clone(), connection);
        id
    }

    /// Remove a connection; returns `None` if it was already gone
    pub async fn remove(&self, id: &str) -> Option<Connection> {
        let connection = self.connections.write().await.remove(id)?;
        connection.set_state(ReadyState::Closed);
        Some(connection)
    }

    pub async fn get(&self, id: &str) -> Option<Connection> {
        self.connections.read().await.get(id).cloned()
    }

    /// Copy of the current members, taken under a single read lock
    pub async fn snapshot(&self) -> Vec<Connection> {
        self.connections.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_marks_open() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let connection = Connection::new(tx);
        assert_eq!(connection.state(), ReadyState::Connecting);

        let id = registry.insert(connection.clone()).await;
        assert_eq!(id, connection.id());
        assert_eq!(connection.state(), ReadyState::Open);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let connection = Connection::new(tx);
        let id = registry.insert(connection.clone()).await;

        let removed = registry.remove(&id).await.unwrap();
        assert_eq!(removed.joined_at(), connection.joined_at());
        assert_eq!(connection.state(), ReadyState::Closed);
        assert!(registry.remove(&id).await.is_none());
        assert!(registry.remove("never-registered").await.is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_send_requires_open() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let connection = Connection::new(tx);

        assert!(matches!(
            connection.send("early".to_string()),
            Err(HubError::ConnectionClosed)
        ));

        connection.set_state(ReadyState::Open);
        connection.send("hello".to_string()).unwrap();
        assert_eq!(rx.try_recv().unwrap(), "hello");

        connection.set_state(ReadyState::Closing);
        assert!(connection.send("late".to_string()).is_err());
    }

    #[tokio::test]
    async fn test_send_to_dropped_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection = Connection::new(tx);
        connection.set_state(ReadyState::Open);
        drop(rx);

        assert!(!connection.is_open());
        assert!(matches!(
            connection.send("lost".to_string()),
            Err(HubError::SendFailed)
        ));
        assert_eq!(connection.state(), ReadyState::Closed);
    }

    #[tokio::test]
    async fn test_snapshot_is_detached() {
        let registry = ConnectionRegistry::new();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();
        let id1 = registry.insert(Connection::new(tx1)).await;
        registry.insert(Connection::new(tx2)).await;

        let snapshot = registry.snapshot().await;
        registry.remove(&id1).await;

        assert_eq!(snapshot.len(), 2);
        assert_eq!(registry.len().await, 1);
    }
}
