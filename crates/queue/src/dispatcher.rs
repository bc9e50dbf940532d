//! Fan one record stream out to several queues.
//!
//! Dispatchers are the producing half of a master/worker setup: a master job
//! reads the source and writes through a dispatcher writer, and each destination
//! queue feeds one worker job through a [`QueueRecordReader`](crate::QueueRecordReader).
//! Per-queue order is the order records were dispatched in; there is no order
//! across queues.

use forgebatch_core::{Batch, ConfigError, ConfigResult, Record};
use forgebatch_engine::RecordWriter;
use tracing::debug;

use crate::error::QueueError;
use crate::message::QueueMessage;
use crate::queue::QueueSender;

/// Content test deciding whether a record goes to a route's queue.
pub trait RecordPredicate<P>: Send {
    fn matches(&self, record: &Record<P>) -> bool;
}

impl<P, F> RecordPredicate<P> for F
where
    F: Fn(&Record<P>) -> bool + Send,
{
    fn matches(&self, record: &Record<P>) -> bool {
        self(record)
    }
}

struct Route<P> {
    predicate: Box<dyn RecordPredicate<P>>,
    queue: QueueSender<P>,
}

/// Routes each record to the queue of the first matching predicate.
///
/// Routes are tried in registration order. A record no predicate matches goes
/// to the default queue, or is dropped when there is none.
pub struct ContentBasedRecordDispatcher<P> {
    routes: Vec<Route<P>>,
    default: Option<QueueSender<P>>,
}

impl<P> ContentBasedRecordDispatcher<P> {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            default: None,
        }
    }

    /// Send records matching `predicate` to `queue`.
    pub fn when(
        mut self,
        predicate: impl RecordPredicate<P> + 'static,
        queue: QueueSender<P>,
    ) -> Self {
        self.routes.push(Route {
            predicate: Box::new(predicate),
            queue,
        });
        self
    }

    /// Send records matching no predicate to `queue`.
    pub fn otherwise(mut self, queue: QueueSender<P>) -> Self {
        self.default = Some(queue);
        self
    }

    /// The queue `record` would be dispatched to.
    pub fn route(&self, record: &Record<P>) -> Option<&QueueSender<P>> {
        self.routes
            .iter()
            .find(|route| route.predicate.matches(record))
            .map(|route| &route.queue)
            .or(self.default.as_ref())
    }

    /// Dispatch a record. Returns whether some queue accepted it.
    pub fn dispatch(&self, record: Record<P>) -> Result<bool, QueueError> {
        match self.route(&record) {
            Some(queue) => {
                queue.put(record)?;
                Ok(true)
            }
            None => {
                debug!(record = record.header().number(), "no route for record, dropping it");
                Ok(false)
            }
        }
    }

    /// Dispatch a queue message: records are routed, poison goes to every queue.
    pub fn dispatch_message(&self, message: QueueMessage<P>) -> Result<(), QueueError> {
        match message {
            QueueMessage::Record(record) => self.dispatch(record).map(|_| ()),
            QueueMessage::Poison => self.broadcast_poison(),
        }
    }

    /// Every destination queue, routes first, then the default.
    pub fn queues(&self) -> impl Iterator<Item = &QueueSender<P>> {
        self.routes
            .iter()
            .map(|route| &route.queue)
            .chain(self.default.as_ref())
    }

    /// Put a poison message on every destination queue.
    ///
    /// Every queue is attempted; the first failure is returned.
    pub fn broadcast_poison(&self) -> Result<(), QueueError> {
        broadcast_poison(self.queues())
    }
}

impl<P> Default for ContentBasedRecordDispatcher<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> core::fmt::Debug for ContentBasedRecordDispatcher<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ContentBasedRecordDispatcher")
            .field("routes", &self.routes.iter().map(|r| r.queue.name()).collect::<Vec<_>>())
            .field("default", &self.default.as_ref().map(QueueSender::name))
            .finish()
    }
}

/// Sends records to its queues in turn.
#[derive(Debug)]
pub struct RoundRobinRecordDispatcher<P> {
    queues: Vec<QueueSender<P>>,
    next: usize,
}

impl<P> RoundRobinRecordDispatcher<P> {
    pub fn new(queues: Vec<QueueSender<P>>) -> ConfigResult<Self> {
        if queues.is_empty() {
            return Err(ConfigError::invalid_argument(
                "round-robin dispatcher needs at least one queue",
            ));
        }
        Ok(Self { queues, next: 0 })
    }

    pub fn dispatch(&mut self, record: Record<P>) -> Result<(), QueueError> {
        let queue = &self.queues[self.next];
        self.next = (self.next + 1) % self.queues.len();
        queue.put(record)
    }

    /// Dispatch a queue message: records go to the next queue, poison to all.
    pub fn dispatch_message(&mut self, message: QueueMessage<P>) -> Result<(), QueueError> {
        match message {
            QueueMessage::Record(record) => self.dispatch(record),
            QueueMessage::Poison => self.broadcast_poison(),
        }
    }

    pub fn queues(&self) -> impl Iterator<Item = &QueueSender<P>> {
        self.queues.iter()
    }

    pub fn broadcast_poison(&self) -> Result<(), QueueError> {
        broadcast_poison(self.queues())
    }
}

fn broadcast_poison<'a, P: 'a>(
    queues: impl Iterator<Item = &'a QueueSender<P>>,
) -> Result<(), QueueError> {
    let mut first_error = None;
    for queue in queues {
        if let Err(err) = queue.put_poison() {
            first_error.get_or_insert(err);
        }
    }
    first_error.map_or(Ok(()), Err)
}

/// Writer dispatching each record of a batch by content.
#[derive(Debug)]
pub struct ContentBasedQueueRecordWriter<P> {
    dispatcher: ContentBasedRecordDispatcher<P>,
}

impl<P> ContentBasedQueueRecordWriter<P> {
    pub fn new(dispatcher: ContentBasedRecordDispatcher<P>) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &ContentBasedRecordDispatcher<P> {
        &self.dispatcher
    }
}

impl<P: Clone + Send> RecordWriter<P> for ContentBasedQueueRecordWriter<P> {
    fn write_records(&mut self, batch: &Batch<P>) -> anyhow::Result<()> {
        for record in batch {
            self.dispatcher.dispatch(record.clone())?;
        }
        Ok(())
    }
}

/// Writer dispatching the records of a batch in round-robin fashion.
#[derive(Debug)]
pub struct RoundRobinQueueRecordWriter<P> {
    dispatcher: RoundRobinRecordDispatcher<P>,
}

impl<P> RoundRobinQueueRecordWriter<P> {
    pub fn new(dispatcher: RoundRobinRecordDispatcher<P>) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &RoundRobinRecordDispatcher<P> {
        &self.dispatcher
    }
}

impl<P: Clone + Send> RecordWriter<P> for RoundRobinQueueRecordWriter<P> {
    fn write_records(&mut self, batch: &Batch<P>) -> anyhow::Result<()> {
        for record in batch {
            self.dispatcher.dispatch(record.clone())?;
        }
        Ok(())
    }
}
