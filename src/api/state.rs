//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use std::sync::Arc;
use std::time::Instant;

use crate::config::ServerConfig;
use crate::websocket::BroadcastHub;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Broadcast hub owning the live connection set
    pub hub: Arc<BroadcastHub>,
    /// Server configuration
    pub config: Arc<ServerConfig>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    /// Create state with a fresh hub built from the server config
    pub fn new(config: ServerConfig) -> Self {
        let hub = Arc::new(BroadcastHub::new(config.hub_config()));
        Self::with_hub(config, hub)
    }

    /// Create state around an existing hub
    pub fn with_hub(config: ServerConfig, hub: Arc<BroadcastHub>) -> Self {
        Self {
            hub,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Get WebSocket connection count
    pub async fn ws_connection_count(&self) -> usize {
        self.hub.connection_count().await
    }
}
