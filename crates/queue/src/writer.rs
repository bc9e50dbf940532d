use forgebatch_core::Batch;
use forgebatch_engine::RecordWriter;

use crate::queue::QueueSender;

/// Writes every record of a batch to one queue, in order.
#[derive(Debug, Clone)]
pub struct QueueRecordWriter<P> {
    queue: QueueSender<P>,
}

impl<P> QueueRecordWriter<P> {
    pub fn new(queue: QueueSender<P>) -> Self {
        Self { queue }
    }
}

impl<P: Clone + Send> RecordWriter<P> for QueueRecordWriter<P> {
    fn write_records(&mut self, batch: &Batch<P>) -> anyhow::Result<()> {
        for record in batch {
            self.queue.put(record.clone())?;
        }
        Ok(())
    }
}
