//! Message Codec
//!
//! JSON text encoding shared by the server hub and the client manager.
//!
//! Decoding only checks that the text is well-formed JSON. Callers that care
//! about envelope shape use [`decode_envelope`] or inspect the value
//! themselves.

mod envelope;

pub use envelope::{is_empty_message, Envelope, EnvelopeType};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Payload could not be encoded or decoded
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Malformed message: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Encode any serializable value as wire text
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, ProtocolError> {
    serde_json::to_string(value).map_err(ProtocolError::Encode)
}

/// Decode wire text into an untyped JSON value
pub fn decode(text: &str) -> Result<Value, ProtocolError> {
    serde_json::from_str(text).map_err(ProtocolError::Decode)
}

/// Decode wire text into an [`Envelope`]
pub fn decode_envelope(text: &str) -> Result<Envelope, ProtocolError> {
    serde_json::from_str(text).map_err(ProtocolError::Decode)
}
