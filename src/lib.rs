//! # Fanout
//!
//! Real-time broadcast messaging over WebSockets: a hub that fans a message
//! out to every connected client, and a resilient client that stays
//! connected to it.
//!
//! ## Features
//!
//! - **Broadcast hub**: Live connection registry with one-shot fan-out
//! - **HTTP trigger**: `POST /api/send` broadcasts to every client
//! - **Resilient client**: Fixed-delay reconnect with a send queue that
//!   flushes in order once the socket is back
//! - **Observable state**: Connection state, last message and last error
//!   exposed through watch channels
//!
//! ## Modules
//!
//! - [`codec`]: JSON envelope encoding and decoding
//! - [`websocket`]: Connection registry, broadcast hub and upgrade handler
//! - [`api`]: HTTP server with Axum
//! - [`client`]: Reconnecting WebSocket connection manager
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fanout::api::{serve, AppState};
//! use fanout::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_default();
//!     fanout::logging::init(&config.logging, "tower_http=debug");
//!
//!     let state = AppState::new(config.server.clone());
//!     serve(state, &config.server).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod client;
pub mod codec;
pub mod config;
pub mod logging;
pub mod websocket;

// Re-export top-level types for convenience
pub use api::{build_router, serve, ApiError, AppState};

pub use client::{
    ClientError, ClientResult, ConnectionManager, ConnectionState, ConnectionStatus,
    InboundMessage, SendOutcome, WsConnector,
};

pub use codec::{Envelope, EnvelopeType, ProtocolError};

pub use config::{ClientConfig, Config, DecodeFailurePolicy, ServerConfig};

pub use websocket::{BroadcastHub, HubConfig, HubError};
