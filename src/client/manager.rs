//! Connection Manager
//!
//! Keeps one logical connection alive over an unreliable transport.
//!
//! All state lives in a single driver task. Caller commands, transport
//! signals and reconnect timer firings reach it over one channel and are
//! handled one at a time, so the state machine never races with itself.
//!
//! ```text
//!                 connect()                 Opened
//! DISCONNECTED ─────────────► CONNECTING ─────────────► CONNECTED
//!      ▲                          │                         │
//!      │        Error / Closed    │      Error / Closed     │
//!      └──────────────────────────┴─────────────────────────┘
//!                 (one reconnect timer armed)
//! ```

use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use super::error::{ClientError, ClientResult, TransportError};
use super::queue::OutboundQueue;
use super::transport::{Connector, Transport, TransportEvent, TransportEvents};
use crate::codec;
use crate::config::{ClientConfig, DecodeFailurePolicy};

/// Capacity of the per-manager inbound message channel
const MESSAGE_CHANNEL_CAPACITY: usize = 256;

/// Connection state of a manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Message received from the server
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Well-formed JSON
    Decoded(Value),
    /// Text that failed to decode, kept under [`DecodeFailurePolicy::Passthrough`]
    Raw(String),
}

/// What the application can observe about a manager
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    /// Most recent inbound message; earlier ones are overwritten
    pub last_message: Option<InboundMessage>,
    pub last_error: Option<String>,
    pub reconnect_pending: bool,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            last_message: None,
            last_error: None,
            reconnect_pending: false,
        }
    }
}

/// Result of [`ConnectionManager::send`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Written to the open transport
    Sent,
    /// Buffered until the next connection opens
    Queued,
}

#[derive(Debug)]
pub(crate) enum Command {
    Connect,
    Send {
        payload: Value,
        reply: oneshot::Sender<ClientResult<SendOutcome>>,
    },
    Transport {
        generation: u64,
        event: TransportEvent,
    },
    ReconnectDue {
        generation: u64,
    },
    Teardown {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to a connection manager
///
/// Clones share the same underlying connection. Dropping every handle has
/// the same effect as [`teardown`](Self::teardown).
#[derive(Clone)]
pub struct ConnectionManager {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ConnectionStatus>,
    messages: broadcast::Sender<InboundMessage>,
}

impl ConnectionManager {
    /// Start a manager and begin connecting to `config.url`
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<C: Connector>(config: ClientConfig, connector: C) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(ConnectionStatus::default());
        let (messages, _) = broadcast::channel(MESSAGE_CHANNEL_CAPACITY);

        let driver = Driver {
            config,
            connector,
            commands: commands.downgrade(),
            status: status_tx,
            messages: messages.clone(),
            state: ConnectionState::Disconnected,
            transport: None,
            transport_generation: 0,
            pending_reconnect: None,
            timer_generation: 0,
            queue: OutboundQueue::new(),
        };
        tokio::spawn(driver.run(rx));

        let _ = commands.send(Command::Connect);

        Self {
            commands,
            status,
            messages,
        }
    }

    /// Open a connection now unless one is already open
    ///
    /// Cancels a pending reconnect timer.
    pub fn connect(&self) -> ClientResult<()> {
        self.commands
            .send(Command::Connect)
            .map_err(|_| ClientError::TornDown)
    }

    /// Send a payload, or queue it while disconnected
    pub async fn send<T: Serialize + ?Sized>(&self, payload: &T) -> ClientResult<SendOutcome> {
        let payload = serde_json::to_value(payload).map_err(ClientError::Payload)?;
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Send { payload, reply })
            .map_err(|_| ClientError::TornDown)?;
        rx.await.map_err(|_| ClientError::TornDown)?
    }

    /// Close the connection and stop reconnecting
    ///
    /// Safe to call more than once.
    pub async fn teardown(&self) {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(Command::Teardown { reply }).is_ok() {
            let _ = rx.await;
        }
    }

    /// Current status snapshot
    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.status.borrow().is_connected()
    }

    pub fn last_message(&self) -> Option<InboundMessage> {
        self.status.borrow().last_message.clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.status.borrow().last_error.clone()
    }

    /// Watch status changes as they happen
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Receive every inbound message, not just the latest
    pub fn subscribe_messages(&self) -> broadcast::Receiver<InboundMessage> {
        self.messages.subscribe()
    }
}

/// Owns the state machine; runs as one task per manager
struct Driver<C> {
    config: ClientConfig,
    connector: C,
    commands: mpsc::WeakUnboundedSender<Command>,
    status: watch::Sender<ConnectionStatus>,
    messages: broadcast::Sender<InboundMessage>,
    state: ConnectionState,
    transport: Option<Box<dyn Transport>>,
    transport_generation: u64,
    pending_reconnect: Option<JoinHandle<()>>,
    timer_generation: u64,
    queue: OutboundQueue,
}

impl<C: Connector> Driver<C> {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = commands.recv().await {
            match command {
                Command::Connect => self.connect(),
                Command::Send { payload, reply } => {
                    let _ = reply.send(self.send(payload));
                }
                Command::Transport { generation, event } => {
                    self.on_transport_event(generation, event);
                }
                Command::ReconnectDue { generation } => self.on_reconnect_due(generation),
                Command::Teardown { reply } => {
                    self.shutdown();
                    let _ = reply.send(());
                    return;
                }
            }
        }

        // Every handle was dropped
        self.shutdown();
    }

    fn connect(&mut self) {
        if self.transport.as_ref().is_some_and(|t| t.is_open()) {
            tracing::debug!("Already connected, ignoring connect");
            return;
        }

        self.cancel_reconnect();
        if let Some(mut stale) = self.transport.take() {
            stale.close();
        }

        self.transport_generation += 1;
        let events = TransportEvents::new(self.transport_generation, self.commands.clone());
        tracing::info!(url = %self.config.url, attempt = self.transport_generation, "Connecting");
        self.transport = Some(self.connector.open(&self.config.url, events));
        self.transition(ConnectionState::Connecting);
    }

    fn send(&mut self, payload: Value) -> ClientResult<SendOutcome> {
        let transport = match self.transport.as_mut() {
            Some(transport) if self.state == ConnectionState::Connected => transport,
            _ => {
                self.queue.enqueue(payload);
                tracing::debug!(queued = self.queue.len(), "Not connected, message queued");
                return Ok(SendOutcome::Queued);
            }
        };

        let text = codec::encode(&payload)?;
        if let Err(e) = transport.send(text) {
            tracing::warn!(error = %e, "Failed to send message");
            self.record_error(e.to_string());
            return Err(e.into());
        }
        Ok(SendOutcome::Sent)
    }

    fn on_transport_event(&mut self, generation: u64, event: TransportEvent) {
        if self.transport.is_none() || generation != self.transport_generation {
            tracing::trace!(generation, ?event, "Ignoring event from stale transport");
            return;
        }

        match event {
            TransportEvent::Opened => {
                self.status.send_modify(|status| status.last_error = None);
                self.transition(ConnectionState::Connected);
                self.flush_queue();
            }
            TransportEvent::Message(text) => self.on_message(text),
            TransportEvent::Error(e) => {
                tracing::warn!(error = %e, "WebSocket error");
                self.record_error(e.to_string());
                self.on_disconnect();
            }
            TransportEvent::Closed => {
                tracing::info!("WebSocket closed");
                self.on_disconnect();
            }
        }
    }

    fn on_message(&mut self, text: String) {
        let message = match codec::decode(&text) {
            Ok(value) => InboundMessage::Decoded(value),
            Err(e) => match self.config.decode_failure {
                DecodeFailurePolicy::Drop => {
                    tracing::warn!(error = %e, "Dropping undecodable message");
                    self.record_error(e.to_string());
                    return;
                }
                DecodeFailurePolicy::Passthrough => {
                    tracing::debug!(error = %e, "Passing through undecodable message");
                    InboundMessage::Raw(text)
                }
            },
        };

        self.status
            .send_modify(|status| status.last_message = Some(message.clone()));
        let _ = self.messages.send(message);
    }

    fn on_disconnect(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close();
        }
        self.transition(ConnectionState::Disconnected);
        self.schedule_reconnect();
    }

    fn flush_queue(&mut self) {
        let Some(transport) = self.transport.as_mut() else {
            return;
        };
        self.queue.drain(|payload| -> ClientResult<()> {
            let text = codec::encode(&payload)?;
            transport.send(text)?;
            Ok(())
        });
    }

    /// Arm the reconnect timer, replacing any timer already armed
    fn schedule_reconnect(&mut self) {
        self.cancel_reconnect();

        self.timer_generation += 1;
        let generation = self.timer_generation;
        let delay = Duration::from_millis(self.config.reconnect_delay_ms);
        let commands = self.commands.clone();

        tracing::info!(delay_ms = self.config.reconnect_delay_ms, "Scheduling reconnect");
        self.pending_reconnect = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(tx) = commands.upgrade() {
                let _ = tx.send(Command::ReconnectDue { generation });
            }
        }));
        self.status
            .send_modify(|status| status.reconnect_pending = true);
    }

    fn cancel_reconnect(&mut self) {
        if let Some(timer) = self.pending_reconnect.take() {
            timer.abort();
            self.status
                .send_modify(|status| status.reconnect_pending = false);
        }
    }

    fn on_reconnect_due(&mut self, generation: u64) {
        if self.pending_reconnect.is_none() || generation != self.timer_generation {
            return;
        }
        self.pending_reconnect = None;
        self.status
            .send_modify(|status| status.reconnect_pending = false);
        tracing::info!("Attempting to reconnect");
        self.connect();
    }

    fn shutdown(&mut self) {
        self.cancel_reconnect();
        if let Some(mut transport) = self.transport.take() {
            transport.close();
        }
        self.transition(ConnectionState::Disconnected);
        tracing::debug!(dropped = self.queue.len(), "Connection manager stopped");
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state != next {
            tracing::debug!(from = ?self.state, to = ?next, "Connection state changed");
        }
        self.state = next;
        self.status.send_modify(|status| status.state = next);
    }

    fn record_error(&mut self, error: String) {
        self.status
            .send_modify(|status| status.last_error = Some(error));
    }
}
