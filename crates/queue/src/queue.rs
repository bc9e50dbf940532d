//! Bounded, blocking record queues.
//!
//! A queue connects one producing side (a dispatcher, a writer, a listener) to
//! one consuming reader. Senders are cheap to clone and block while the queue is
//! full; the receiver blocks while it is empty. Messages come out in the order
//! they were put in.

use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use forgebatch_core::Record;
use tracing::trace;

use crate::error::QueueError;
use crate::message::QueueMessage;

/// Create a named queue holding at most `capacity` messages.
///
/// A capacity of zero makes every `put` wait for the reader to take the message.
pub fn record_queue<P>(
    name: impl Into<String>,
    capacity: usize,
) -> (QueueSender<P>, QueueReceiver<P>) {
    let name: Arc<str> = Arc::from(name.into());
    let (tx, rx) = mpsc::sync_channel(capacity);
    (
        QueueSender {
            name: Arc::clone(&name),
            tx,
        },
        QueueReceiver { name, rx },
    )
}

/// Producing side of a record queue.
#[derive(Debug)]
pub struct QueueSender<P> {
    name: Arc<str>,
    tx: mpsc::SyncSender<QueueMessage<P>>,
}

impl<P> Clone for QueueSender<P> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            tx: self.tx.clone(),
        }
    }
}

impl<P> QueueSender<P> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enqueue a record, blocking while the queue is full.
    pub fn put(&self, record: Record<P>) -> Result<(), QueueError> {
        trace!(queue = %self.name, record = record.header().number(), "enqueue record");
        self.send(QueueMessage::Record(record))
    }

    /// Enqueue the end-of-stream marker.
    pub fn put_poison(&self) -> Result<(), QueueError> {
        trace!(queue = %self.name, "enqueue poison");
        self.send(QueueMessage::Poison)
    }

    pub fn send(&self, message: QueueMessage<P>) -> Result<(), QueueError> {
        self.tx.send(message).map_err(|_| QueueError::Disconnected {
            queue: self.name.to_string(),
        })
    }
}

/// Outcome of waiting on an empty queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Idle {
    /// Nothing arrived before the timeout.
    TimedOut,
    /// Every sender is gone and the queue is drained.
    Closed,
}

/// Consuming side of a record queue.
#[derive(Debug)]
pub struct QueueReceiver<P> {
    name: Arc<str>,
    rx: mpsc::Receiver<QueueMessage<P>>,
}

impl<P> QueueReceiver<P> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait up to `timeout` for the next message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<QueueMessage<P>, Idle> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => Idle::TimedOut,
            RecvTimeoutError::Disconnected => Idle::Closed,
        })
    }

    /// Take the next message if one is already queued.
    pub fn try_recv(&self) -> Option<QueueMessage<P>> {
        self.rx.try_recv().ok()
    }

    /// Drain every message already queued.
    pub fn drain(&self) -> Vec<QueueMessage<P>> {
        self.rx.try_iter().collect()
    }
}
