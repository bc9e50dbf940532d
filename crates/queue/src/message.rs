use forgebatch_core::Record;

/// Element type of a record queue.
///
/// `Poison` tells the consuming reader that no more records will come.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueMessage<P> {
    Record(Record<P>),
    Poison,
}

impl<P> QueueMessage<P> {
    pub fn is_poison(&self) -> bool {
        matches!(self, QueueMessage::Poison)
    }

    pub fn into_record(self) -> Option<Record<P>> {
        match self {
            QueueMessage::Record(record) => Some(record),
            QueueMessage::Poison => None,
        }
    }
}

impl<P> From<Record<P>> for QueueMessage<P> {
    fn from(record: Record<P>) -> Self {
        QueueMessage::Record(record)
    }
}
