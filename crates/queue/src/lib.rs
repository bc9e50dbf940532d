//! `forgebatch-queue`: queue-backed readers, writers and record dispatchers.
//!
//! Lets one master job split a source across worker jobs running in parallel:
//! the master writes through a dispatcher into bounded queues, and each worker
//! reads one queue until a poison message arrives.

pub mod dispatcher;
pub mod error;
pub mod message;
pub mod poison;
pub mod queue;
pub mod reader;
pub mod writer;

pub use dispatcher::{
    ContentBasedQueueRecordWriter, ContentBasedRecordDispatcher, RecordPredicate,
    RoundRobinQueueRecordWriter, RoundRobinRecordDispatcher,
};
pub use error::QueueError;
pub use message::QueueMessage;
pub use poison::PoisonRecordBroadcaster;
pub use queue::{Idle, QueueReceiver, QueueSender, record_queue};
pub use reader::{DEFAULT_TIMEOUT, QueueRecordReader, TimeoutPolicy};
pub use writer::QueueRecordWriter;
