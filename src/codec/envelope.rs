//! Envelope Types
//!
//! The typed JSON unit exchanged between clients and the server.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of envelope on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeType {
    /// Sent once to a connection right after it registers
    Info,
    /// Point-to-point acknowledgment of a received message
    Confirmation,
    /// Fan-out to every live connection
    Broadcast,
    /// Application-defined payload
    Custom,
    /// Server could not process the last inbound frame
    Error,
}

/// Wire envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: EnvelopeType,
    /// Arbitrary JSON payload
    #[serde(default)]
    pub message: Value,
    /// ISO-8601 timestamp, present on broadcasts only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Connection identity, present on info envelopes only
    #[serde(
        default,
        rename = "clientId",
        skip_serializing_if = "Option::is_none"
    )]
    pub client_id: Option<String>,
}

impl Envelope {
    fn new(kind: EnvelopeType, message: Value) -> Self {
        Self {
            kind,
            message,
            timestamp: None,
            client_id: None,
        }
    }

    /// Welcome envelope for a freshly registered connection
    pub fn info(message: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            client_id: Some(client_id.into()),
            ..Self::new(EnvelopeType::Info, Value::String(message.into()))
        }
    }

    /// Acknowledgment echoing the raw text a connection sent
    pub fn confirmation(received: &str) -> Self {
        Self::new(
            EnvelopeType::Confirmation,
            Value::String(format!("Message received: {}", received)),
        )
    }

    /// Broadcast stamped with the current time
    pub fn broadcast(message: Value) -> Self {
        Self {
            timestamp: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
            ..Self::new(EnvelopeType::Broadcast, message)
        }
    }

    pub fn custom(message: Value) -> Self {
        Self::new(EnvelopeType::Custom, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(EnvelopeType::Error, Value::String(message.into()))
    }
}

/// Whether a payload counts as absent for broadcasting.
///
/// `null`, `""`, `false` and `0` are all rejected.
pub fn is_empty_message(message: &Value) -> bool {
    match message {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::Array(_) | Value::Object(_) => false,
    }
}
