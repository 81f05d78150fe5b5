//! Fanout CLI
//!
//! Command-line interface for a running Fanout server:
//! - Trigger broadcasts over HTTP
//! - Check connection status and health
//! - Listen on the WebSocket with a reconnecting client

use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use fanout::client::{ConnectionManager, InboundMessage, WsConnector};
use fanout::codec::Envelope;
use fanout::config::Config;

#[derive(Parser)]
#[command(name = "fanout-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Broadcast messages to WebSocket clients")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// API server URL
    #[arg(long, default_value = "http://localhost:5000", global = true)]
    pub api_url: String,

    /// WebSocket URL (default: client.url from config)
    #[arg(long, global = true)]
    pub ws_url: Option<String>,

    /// Config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Broadcast a message to every connected client
    Broadcast {
        /// Message to send. Parsed as JSON when possible, sent as a string otherwise
        message: String,
    },

    /// Show connected client count
    Status,

    /// Show server health
    Health,

    /// Connect over WebSocket, print inbound messages and send stdin lines
    Listen,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    fanout::logging::init(&config.logging, "");

    let client = reqwest::Client::new();

    match cli.command {
        Commands::Broadcast { message } => {
            let message = parse_message(&message);
            let response = client
                .post(format!("{}/api/send", cli.api_url))
                .json(&serde_json::json!({ "message": message }))
                .send()
                .await?;

            let status = response.status();
            let body: Value = response.json().await?;

            if status.is_success() {
                println!(
                    "Broadcast to {} client(s)",
                    body["clientCount"].as_u64().unwrap_or(0)
                );
            } else {
                eprintln!(
                    "Broadcast failed ({}): {}",
                    status,
                    body["error"].as_str().unwrap_or("unknown error")
                );
                std::process::exit(1);
            }
        }

        Commands::Status => {
            let response = client
                .get(format!("{}/api/status", cli.api_url))
                .send()
                .await;

            match response {
                Ok(resp) if resp.status().is_success() => {
                    let status: Value = resp.json().await?;
                    println!(
                        "Connected clients: {}",
                        status["clientsCount"].as_u64().unwrap_or(0)
                    );
                }
                Ok(resp) => {
                    eprintln!("Status request failed: {}", resp.status());
                    std::process::exit(1);
                }
                Err(e) => {
                    eprintln!("Failed to connect to API: {}", e);
                    eprintln!("Is the server running at {}?", cli.api_url);
                    std::process::exit(1);
                }
            }
        }

        Commands::Health => {
            let response = client
                .get(format!("{}/health", cli.api_url))
                .send()
                .await;

            match response {
                Ok(resp) if resp.status().is_success() => {
                    let health: Value = resp.json().await?;

                    println!(
                        "Fanout v{}",
                        health["version"].as_str().unwrap_or(env!("CARGO_PKG_VERSION"))
                    );
                    println!();
                    println!("Status: {}", health["status"].as_str().unwrap_or("unknown"));
                    println!(
                        "Connections: {}",
                        health["connections"].as_u64().unwrap_or(0)
                    );

                    if let Some(uptime) = health["uptime_seconds"].as_u64() {
                        println!("Uptime: {}", format_duration(uptime));
                    }
                }
                Ok(resp) => {
                    eprintln!("Health check failed: {}", resp.status());
                    std::process::exit(1);
                }
                Err(e) => {
                    eprintln!("Failed to connect to API: {}", e);
                    eprintln!("Is the server running at {}?", cli.api_url);
                    std::process::exit(1);
                }
            }
        }

        Commands::Listen => {
            let mut client_config = config.client.clone();
            if let Some(url) = cli.ws_url {
                client_config.url = url;
            }

            println!("Listening on {} (Ctrl+C to quit)", client_config.url);
            listen(ConnectionManager::spawn(client_config, WsConnector)).await?;
        }

        Commands::Config { output } => {
            let config = fanout::config::generate_default_config();

            match output {
                Some(path) => {
                    // Create parent directory if needed
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &config)?;
                    println!("Config written to {:?}", path);
                }
                None => {
                    print!("{}", config);
                }
            }
        }
    }

    Ok(())
}

async fn listen(manager: ConnectionManager) -> Result<(), Box<dyn std::error::Error>> {
    let mut messages = manager.subscribe_messages();
    let mut status = manager.subscribe_status();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut was_connected = false;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,

            received = messages.recv() => match received {
                Ok(InboundMessage::Decoded(value)) => println!("< {}", value),
                Ok(InboundMessage::Raw(text)) => println!("< (raw) {}", text),
                Err(RecvError::Lagged(skipped)) => eprintln!("! skipped {} messages", skipped),
                Err(RecvError::Closed) => break,
            },

            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = status.borrow_and_update().clone();
                if current.is_connected() != was_connected {
                    was_connected = current.is_connected();
                    match (was_connected, current.last_error) {
                        (true, _) => eprintln!("* connected"),
                        (false, Some(error)) => eprintln!("* disconnected: {}", error),
                        (false, None) => eprintln!("* disconnected"),
                    }
                }
            }

            line = lines.next_line(), if stdin_open => match line? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => {
                    let payload = match serde_json::from_str::<Value>(&line) {
                        Ok(value) => value,
                        Err(_) => serde_json::to_value(Envelope::custom(Value::String(line)))?,
                    };
                    manager.send(&payload).await?;
                }
                None => stdin_open = false,
            },
        }
    }

    manager.teardown().await;
    Ok(())
}

/// Treat the argument as JSON when it parses, otherwise as a plain string
fn parse_message(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else if seconds < 86400 {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    } else {
        format!("{}d {}h", seconds / 86400, (seconds % 86400) / 3600)
    }
}
