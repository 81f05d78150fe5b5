//! Client Error Types

use thiserror::Error;

use crate::codec::ProtocolError;

/// Network-level failure of the underlying transport
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Send failed: {0}")]
    Send(String),

    #[error("Receive failed: {0}")]
    Receive(String),

    #[error("Transport is closed")]
    Closed,
}

/// Errors returned by [`ConnectionManager`](super::ConnectionManager)
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("Payload is not JSON-serializable: {0}")]
    Payload(#[source] serde_json::Error),

    #[error("Connection manager has been torn down")]
    TornDown,
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
