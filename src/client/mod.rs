//! Resilient WebSocket Client
//!
//! Client half of the messaging layer: a [`ConnectionManager`] that connects,
//! reconnects after a fixed delay when the transport drops, buffers sends
//! while disconnected and exposes the latest message it received.
//!
//! ## Example
//!
//! ```rust,no_run
//! use fanout::client::{ConnectionManager, WsConnector};
//! use fanout::config::ClientConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = ConnectionManager::spawn(ClientConfig::default(), WsConnector);
//!
//!     // Queued until the socket opens, then flushed in order
//!     manager.send(&serde_json::json!({"type": "custom", "message": "hi"})).await?;
//!
//!     let mut status = manager.subscribe_status();
//!     status.wait_for(|s| s.last_message.is_some()).await?;
//!     println!("{:?}", manager.last_message());
//!
//!     manager.teardown().await;
//!     Ok(())
//! }
//! ```

mod error;
#[cfg(test)]
mod fake;
mod manager;
mod queue;
mod transport;

pub use error::{ClientError, ClientResult, TransportError};
pub use manager::{ConnectionManager, ConnectionState, ConnectionStatus, InboundMessage, SendOutcome};
pub use queue::OutboundQueue;
pub use transport::{Connector, Transport, TransportEvent, TransportEvents, WsConnector};
