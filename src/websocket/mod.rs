//! WebSocket Broadcast Server
//!
//! Server half of the messaging layer.
//!
//! ## Architecture
//!
//! - **ConnectionRegistry**: the live set of open connections
//! - **BroadcastHub**: fans envelopes out to the registry and answers each
//!   connection's own messages
//! - **Handler**: WebSocket upgrade at `/` and per-socket read/write tasks
//!
//! ## Wire traffic
//!
//! ```text
//! server -> new client   {"type":"info","message":"Connected to WebSocket server","clientId":"..."}
//! client -> server       {"x":1}
//! server -> same client  {"type":"confirmation","message":"Message received: {\"x\":1}"}
//! POST /api/send         {"type":"broadcast","message":...,"timestamp":"..."} to every client
//! ```

mod handler;
mod hub;
mod registry;

pub use handler::websocket_handler;
pub use hub::{BroadcastHub, HubConfig, HubError};
pub use registry::{Connection, ConnectionId, ConnectionRegistry, ReadyState};
