//! Fanout Server
//!
//! Run with: cargo run --bin fanout
//!
//! # Configuration
//!
//! Read from `config.toml` in the usual locations, then overridden by:
//! - `FANOUT_HOST`: Host to bind to (default: 0.0.0.0)
//! - `FANOUT_PORT` / `PORT`: Port to listen on (default: 5000)
//! - `FANOUT_WELCOME_MESSAGE`: Text of the info message sent on connect
//! - `FANOUT_LOG_LEVEL`, `FANOUT_LOG_FORMAT`: Logging (`pretty` or `json`)
//! - `RUST_LOG`: Full filter override

use fanout::api::{serve, AppState};
use fanout::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load_default();
    fanout::logging::init(&config.logging, "tower_http=debug");

    tracing::info!("Starting Fanout server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Welcome message: {:?}", config.server.welcome_message);

    let state = AppState::new(config.server.clone());
    serve(state, &config.server).await?;

    tracing::info!("Fanout server stopped");
    Ok(())
}
