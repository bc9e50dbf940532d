//! Record sinks.

use std::sync::{Arc, Mutex, PoisonError};

use forgebatch_core::{Batch, LoggingRetryListener, Record, Retry, RetryListener, RetryPolicy};

/// A sink receiving whole batches of records.
///
/// `open` is called once before the first write and `close` once at the end of
/// the run, whatever its outcome.
pub trait RecordWriter<P>: Send {
    fn open(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn write_records(&mut self, batch: &Batch<P>) -> anyhow::Result<()>;

    fn close(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// In-memory writer collecting every written batch.
///
/// Clones share the same storage, so a test can keep a handle while the job owns
/// the writer.
#[derive(Debug)]
pub struct VecRecordWriter<P> {
    batches: Arc<Mutex<Vec<Batch<P>>>>,
}

impl<P> VecRecordWriter<P> {
    pub fn new() -> Self {
        Self {
            batches: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every batch written so far, in write order.
    pub fn batches(&self) -> Vec<Batch<P>>
    where
        P: Clone,
    {
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Every record written so far, flattened.
    pub fn records(&self) -> Vec<Record<P>>
    where
        P: Clone,
    {
        self.batches().into_iter().flatten().collect()
    }

    pub fn payloads(&self) -> Vec<P>
    where
        P: Clone,
    {
        self.records().into_iter().map(Record::into_payload).collect()
    }
}

impl<P> Clone for VecRecordWriter<P> {
    fn clone(&self) -> Self {
        Self {
            batches: Arc::clone(&self.batches),
        }
    }
}

impl<P> Default for VecRecordWriter<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Clone + Send> RecordWriter<P> for VecRecordWriter<P> {
    fn write_records(&mut self, batch: &Batch<P>) -> anyhow::Result<()> {
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(batch.clone());
        Ok(())
    }
}

/// Writer decorator retrying `write_records` under a [`RetryPolicy`].
pub struct RetryableRecordWriter<W, L = LoggingRetryListener> {
    inner: W,
    retry: Retry<L>,
}

impl<W> RetryableRecordWriter<W> {
    pub fn new(inner: W, policy: RetryPolicy) -> Self {
        Self {
            inner,
            retry: Retry::with_listener(policy, LoggingRetryListener::new("write records")),
        }
    }
}

impl<W, L: RetryListener> RetryableRecordWriter<W, L> {
    pub fn with_listener(inner: W, policy: RetryPolicy, listener: L) -> Self {
        Self {
            inner,
            retry: Retry::with_listener(policy, listener),
        }
    }
}

impl<P, W, L> RecordWriter<P> for RetryableRecordWriter<W, L>
where
    W: RecordWriter<P>,
    L: RetryListener + Send,
{
    fn open(&mut self) -> anyhow::Result<()> {
        self.inner.open()
    }

    fn write_records(&mut self, batch: &Batch<P>) -> anyhow::Result<()> {
        let inner = &mut self.inner;
        self.retry.execute(|| inner.write_records(batch))
    }

    fn close(&mut self) -> anyhow::Result<()> {
        self.inner.close()
    }
}
