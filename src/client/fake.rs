//! In-memory transport for driving the manager in tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::time::Instant;

use super::error::TransportError;
use super::manager::ConnectionStatus;
use super::transport::{Connector, Transport, TransportEvent, TransportEvents};

type Observer = Arc<Mutex<Option<watch::Receiver<ConnectionStatus>>>>;

/// Records every transport the manager opens
#[derive(Clone, Default)]
pub(crate) struct FakeConnector {
    attempts: Arc<Mutex<Vec<FakeAttempt>>>,
    observer: Observer,
}

impl FakeConnector {
    /// Let transports note whether the manager reported connected at each write
    pub fn observe(&self, status: watch::Receiver<ConnectionStatus>) {
        *self.observer.lock().unwrap() = Some(status);
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    pub fn attempt(&self, index: usize) -> FakeAttempt {
        self.attempts.lock().unwrap()[index].clone()
    }
}

impl Connector for FakeConnector {
    fn open(&self, url: &str, events: TransportEvents) -> Box<dyn Transport> {
        let attempt = FakeAttempt {
            url: url.to_string(),
            at: Instant::now(),
            events,
            open: Arc::new(AtomicBool::new(false)),
            closed: Arc::new(AtomicBool::new(false)),
            broken: Arc::new(AtomicBool::new(false)),
            writes: Arc::default(),
        };
        self.attempts.lock().unwrap().push(attempt.clone());

        Box::new(FakeTransport {
            attempt,
            observer: Arc::clone(&self.observer),
        })
    }
}

/// Test-side view of one opened transport
#[derive(Clone)]
pub(crate) struct FakeAttempt {
    pub url: String,
    pub at: Instant,
    events: TransportEvents,
    open: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
    broken: Arc<AtomicBool>,
    writes: Arc<Mutex<Vec<(String, bool)>>>,
}

impl FakeAttempt {
    pub fn open(&self) -> bool {
        self.open.store(true, Ordering::SeqCst);
        self.events.emit(TransportEvent::Opened)
    }

    pub fn deliver(&self, text: &str) -> bool {
        self.events.emit(TransportEvent::Message(text.to_string()))
    }

    pub fn fail(&self, reason: &str) -> bool {
        self.open.store(false, Ordering::SeqCst);
        self.events
            .emit(TransportEvent::Error(TransportError::Connect(reason.to_string())))
    }

    pub fn close(&self) -> bool {
        self.open.store(false, Ordering::SeqCst);
        self.events.emit(TransportEvent::Closed)
    }

    /// Make every later write fail
    pub fn break_writes(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> Vec<String> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .map(|(text, _)| text.clone())
            .collect()
    }

    /// For each write, whether the observed status said connected
    pub fn connected_at_write(&self) -> Vec<bool> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .map(|(_, connected)| *connected)
            .collect()
    }
}

struct FakeTransport {
    attempt: FakeAttempt,
    observer: Observer,
}

impl Transport for FakeTransport {
    fn is_open(&self) -> bool {
        self.attempt.open.load(Ordering::SeqCst) && !self.attempt.is_closed()
    }

    fn send(&mut self, text: String) -> Result<(), TransportError> {
        if self.attempt.broken.load(Ordering::SeqCst) {
            return Err(TransportError::Send("broken pipe".to_string()));
        }
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        let connected = self
            .observer
            .lock()
            .unwrap()
            .as_ref()
            .map(|status| status.borrow().is_connected())
            .unwrap_or(false);
        self.attempt.writes.lock().unwrap().push((text, connected));
        Ok(())
    }

    fn close(&mut self) {
        self.attempt.open.store(false, Ordering::SeqCst);
        self.attempt.closed.store(true, Ordering::SeqCst);
    }
}
