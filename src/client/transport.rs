//! Client Transport
//!
//! The seam between [`ConnectionManager`](super::ConnectionManager) and the
//! network. A [`Connector`] opens a [`Transport`] and reports what happens to
//! it through [`TransportEvents`], the same open/message/error/close signals a
//! browser WebSocket fires.

use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Message;

use super::error::TransportError;
use super::manager::Command;

/// Signal raised by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Message(String),
    Error(TransportError),
    Closed,
}

/// Where a transport reports its events
///
/// Each handle is tagged with the generation of the transport it belongs to,
/// so the manager can ignore signals from a transport it already replaced.
#[derive(Debug, Clone)]
pub struct TransportEvents {
    generation: u64,
    commands: mpsc::WeakUnboundedSender<Command>,
}

impl TransportEvents {
    pub(super) fn new(generation: u64, commands: mpsc::WeakUnboundedSender<Command>) -> Self {
        Self {
            generation,
            commands,
        }
    }

    /// Report an event; returns false once the manager is gone
    pub fn emit(&self, event: TransportEvent) -> bool {
        match self.commands.upgrade() {
            Some(tx) => tx
                .send(Command::Transport {
                    generation: self.generation,
                    event,
                })
                .is_ok(),
            None => false,
        }
    }
}

/// One underlying connection attempt
pub trait Transport: Send {
    /// Whether the transport can accept writes right now
    fn is_open(&self) -> bool;

    /// Write one text frame
    fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Close the transport; calling it again is a no-op
    fn close(&mut self);
}

/// Opens transports for a URL
///
/// `open` must return immediately. Connection progress is reported later
/// through `events`.
pub trait Connector: Send + 'static {
    fn open(&self, url: &str, events: TransportEvents) -> Box<dyn Transport>;
}

/// Connector backed by tokio-tungstenite
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn open(&self, url: &str, events: TransportEvents) -> Box<dyn Transport> {
        let (tx, rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(run_socket(url.to_string(), rx, Arc::clone(&open), events));

        Box::new(WsTransport {
            outgoing: Some(tx),
            open,
            task,
        })
    }
}

/// Handle to a socket driven by a background task
struct WsTransport {
    outgoing: Option<mpsc::UnboundedSender<Message>>,
    open: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl Transport for WsTransport {
    fn is_open(&self) -> bool {
        self.outgoing.is_some() && self.open.load(Ordering::Acquire)
    }

    fn send(&mut self, text: String) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        let outgoing = self.outgoing.as_ref().ok_or(TransportError::Closed)?;
        outgoing
            .send(Message::Text(text))
            .map_err(|_| TransportError::Closed)
    }

    fn close(&mut self) {
        let was_open = self.open.swap(false, Ordering::AcqRel);
        if self.outgoing.take().is_none() {
            return;
        }
        if was_open {
            // Dropping the sender makes the socket task send a close frame
            tracing::debug!("Closing WebSocket transport");
        } else {
            // Still handshaking: nothing may reach the network from here on
            tracing::debug!("Abandoning WebSocket connection attempt");
            self.task.abort();
        }
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        if self.outgoing.is_some() {
            self.task.abort();
        }
    }
}

async fn run_socket(
    url: String,
    mut outgoing: mpsc::UnboundedReceiver<Message>,
    open: Arc<AtomicBool>,
    events: TransportEvents,
) {
    let connected = tokio::select! {
        result = tokio_tungstenite::connect_async(url.as_str()) => result,
        None = outgoing.recv() => {
            tracing::debug!(url = %url, "Connection attempt abandoned");
            return;
        }
    };

    let stream = match connected {
        Ok((stream, _)) => stream,
        Err(e) => {
            tracing::debug!(url = %url, error = %e, "WebSocket connect failed");
            events.emit(TransportEvent::Error(TransportError::Connect(e.to_string())));
            events.emit(TransportEvent::Closed);
            return;
        }
    };

    open.store(true, Ordering::Release);
    tracing::info!(url = %url, "WebSocket connected");
    events.emit(TransportEvent::Opened);

    let (mut sink, mut stream) = stream.split();

    loop {
        tokio::select! {
            out = outgoing.recv() => match out {
                Some(msg) => {
                    if let Err(e) = sink.send(msg).await {
                        events.emit(TransportEvent::Error(TransportError::Send(e.to_string())));
                        break;
                    }
                }
                None => {
                    let _ = sink.close().await;
                    break;
                }
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    events.emit(TransportEvent::Message(text));
                }
                Some(Ok(Message::Binary(bytes))) => match binary_text(bytes) {
                    Some(text) => {
                        events.emit(TransportEvent::Message(text));
                    }
                    None => {
                        tracing::warn!(url = %url, "Skipping binary frame that is not UTF-8");
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!(url = %url, ?frame, "Server closed WebSocket");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    events.emit(TransportEvent::Error(TransportError::Receive(e.to_string())));
                    break;
                }
                None => break,
            },
        }
    }

    open.store(false, Ordering::Release);
    tracing::info!(url = %url, "WebSocket disconnected");
    events.emit(TransportEvent::Closed);
}

/// Text carried by a binary frame, if it is valid UTF-8
fn binary_text(bytes: Vec<u8>) -> Option<String> {
    String::from_utf8(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_text_keeps_utf8() {
        assert_eq!(
            binary_text(br#"{"type":"info"}"#.to_vec()).as_deref(),
            Some(r#"{"type":"info"}"#)
        );
    }

    #[test]
    fn test_binary_text_rejects_invalid_utf8() {
        assert_eq!(binary_text(vec![0x7b, 0xff, 0xfe, 0x7d]), None);
    }

    #[tokio::test]
    async fn test_close_during_handshake_stops_socket_task() {
        // Accepts TCP but never answers the upgrade request
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());

        let (tx, mut rx) = mpsc::unbounded_channel();
        let events = TransportEvents::new(1, tx.downgrade());
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(run_socket(url, outgoing_rx, Arc::clone(&open), events));
        let mut transport = WsTransport {
            outgoing: Some(outgoing),
            open,
            task,
        };

        let (_stream, _) = listener.accept().await.unwrap();
        assert!(!transport.is_open());

        transport.close();
        tokio::time::timeout(std::time::Duration::from_secs(1), async {
            while !transport.task.is_finished() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        assert!(transport.send("late".to_string()).is_err());
        assert!(rx.try_recv().is_err());

        // Idempotent
        transport.close();
    }
}
