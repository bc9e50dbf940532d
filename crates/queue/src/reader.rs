use std::time::Duration;

use forgebatch_core::Record;
use forgebatch_engine::RecordReader;
use tracing::debug;

use crate::message::QueueMessage;
use crate::queue::{Idle, QueueReceiver};

/// Default wait for the next message before [`TimeoutPolicy::EndOfStream`] applies.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// What an idle queue means to the reader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimeoutPolicy {
    /// A timeout ends the source.
    #[default]
    EndOfStream,
    /// Keep waiting; only a poison message (or losing every sender) ends the source.
    KeepWaiting,
}

/// Reads records from a queue until a poison message arrives.
///
/// Losing every sender also ends the source, since nothing can arrive anymore.
#[derive(Debug)]
pub struct QueueRecordReader<P> {
    receiver: QueueReceiver<P>,
    timeout: Duration,
    policy: TimeoutPolicy,
    exhausted: bool,
}

impl<P> QueueRecordReader<P> {
    pub fn new(receiver: QueueReceiver<P>) -> Self {
        Self {
            receiver,
            timeout: DEFAULT_TIMEOUT,
            policy: TimeoutPolicy::default(),
            exhausted: false,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_policy(mut self, policy: TimeoutPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn end(&mut self, reason: &'static str) -> Option<Record<P>> {
        debug!(queue = %self.receiver.name(), reason, "queue source exhausted");
        self.exhausted = true;
        None
    }
}

impl<P: Send> RecordReader<P> for QueueRecordReader<P> {
    fn open(&mut self) -> anyhow::Result<()> {
        self.exhausted = false;
        Ok(())
    }

    fn read_record(&mut self) -> anyhow::Result<Option<Record<P>>> {
        if self.exhausted {
            return Ok(None);
        }
        loop {
            match self.receiver.recv_timeout(self.timeout) {
                Ok(QueueMessage::Record(record)) => return Ok(Some(record)),
                Ok(QueueMessage::Poison) => return Ok(self.end("poison")),
                Err(Idle::Closed) => return Ok(self.end("closed")),
                Err(Idle::TimedOut) => match self.policy {
                    TimeoutPolicy::EndOfStream => return Ok(self.end("timeout")),
                    TimeoutPolicy::KeepWaiting => continue,
                },
            }
        }
    }
}
