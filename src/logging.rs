//! Tracing subscriber setup shared by the binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Install the global subscriber
///
/// `RUST_LOG` wins over the configured level. `extra` directives are appended
/// to the configured level, e.g. `"tower_http=debug"`.
pub fn init(config: &LoggingConfig, extra: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let directives = if extra.is_empty() {
            format!("fanout={}", config.level)
        } else {
            format!("fanout={},{}", config.level, extra)
        };
        EnvFilter::new(directives)
    });

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.format.as_str() {
        "json" => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        _ => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };

    if let Err(e) = result {
        eprintln!("Logging already initialized: {}", e);
    }
}
