use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// Every receiving side of the queue is gone.
    #[error("queue {queue} has no consumer left")]
    Disconnected { queue: String },
}
