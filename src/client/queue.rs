//! Outbound Queue
//!
//! Holds payloads sent while no connection is open. The queue has no
//! capacity bound; a long outage grows it without limit.

use serde_json::Value;
use std::collections::VecDeque;
use std::fmt::Display;

/// FIFO buffer of payloads waiting for a connection
#[derive(Debug, Default)]
pub struct OutboundQueue {
    pending: VecDeque<Value>,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a payload at the tail
    pub fn enqueue(&mut self, payload: Value) {
        self.pending.push_back(payload);
    }

    /// Hand every queued payload to `sink` in FIFO order
    ///
    /// The queue is empty afterwards whatever `sink` returned. Failed entries
    /// are logged and dropped. Returns the number of successful hand-offs.
    pub fn drain<F, E>(&mut self, mut sink: F) -> usize
    where
        F: FnMut(Value) -> Result<(), E>,
        E: Display,
    {
        let total = self.pending.len();
        let mut sent = 0;

        for (position, payload) in std::mem::take(&mut self.pending).into_iter().enumerate() {
            match sink(payload) {
                Ok(()) => sent += 1,
                Err(e) => {
                    tracing::warn!(position, error = %e, "Dropping queued message");
                }
            }
        }

        if total > 0 {
            tracing::debug!(total, sent, "Flushed outbound queue");
        }
        sent
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
