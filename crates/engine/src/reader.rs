//! Record sources.

use forgebatch_core::{Header, LoggingRetryListener, Record, Retry, RetryListener, RetryPolicy};

/// A source of records, consumed sequentially by a job.
///
/// `open` is called once before the first read and `close` once at the end of the
/// run, whatever its outcome. `Ok(None)` from `read_record` means the source is
/// exhausted.
pub trait RecordReader<P>: Send {
    fn open(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn read_record(&mut self) -> anyhow::Result<Option<Record<P>>>;

    fn close(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Number of records this source will yield, when known up front.
    /// Only consulted after `open`.
    fn total_records(&self) -> Option<u64> {
        None
    }
}

/// Reader over any in-memory iterator. Records are numbered from 1.
pub struct IterableRecordReader<T> {
    source: String,
    items: T,
    next_number: u64,
    total: Option<u64>,
}

impl<T> IterableRecordReader<T>
where
    T: Iterator,
{
    pub fn new(items: impl IntoIterator<IntoIter = T>) -> Self {
        let items = items.into_iter();
        let total = match items.size_hint() {
            (lower, Some(upper)) if lower == upper => Some(lower as u64),
            _ => None,
        };
        Self {
            source: "In-Memory Iterable".to_string(),
            items,
            next_number: 1,
            total,
        }
    }

    /// Name reported in each record header.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }
}

impl<T> RecordReader<T::Item> for IterableRecordReader<T>
where
    T: Iterator + Send,
{
    fn read_record(&mut self) -> anyhow::Result<Option<Record<T::Item>>> {
        Ok(self.items.next().map(|item| {
            let header = Header::new(self.next_number, self.source.clone());
            self.next_number += 1;
            Record::new(header, item)
        }))
    }

    fn total_records(&self) -> Option<u64> {
        self.total
    }
}

/// Reader decorator retrying `read_record` under a [`RetryPolicy`].
///
/// Only reads are retried; `open` and `close` are delegated once.
pub struct RetryableRecordReader<R, L = LoggingRetryListener> {
    inner: R,
    retry: Retry<L>,
}

impl<R> RetryableRecordReader<R> {
    pub fn new(inner: R, policy: RetryPolicy) -> Self {
        Self {
            inner,
            retry: Retry::with_listener(policy, LoggingRetryListener::new("read next record")),
        }
    }
}

impl<R, L: RetryListener> RetryableRecordReader<R, L> {
    pub fn with_listener(inner: R, policy: RetryPolicy, listener: L) -> Self {
        Self {
            inner,
            retry: Retry::with_listener(policy, listener),
        }
    }
}

impl<P, R, L> RecordReader<P> for RetryableRecordReader<R, L>
where
    R: RecordReader<P>,
    L: RetryListener + Send,
{
    fn open(&mut self) -> anyhow::Result<()> {
        self.inner.open()
    }

    fn read_record(&mut self) -> anyhow::Result<Option<Record<P>>> {
        let inner = &mut self.inner;
        self.retry.execute(|| inner.read_record())
    }

    fn close(&mut self) -> anyhow::Result<()> {
        self.inner.close()
    }

    fn total_records(&self) -> Option<u64> {
        self.inner.total_records()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::time::Duration;

    #[test]
    fn numbers_records_from_one() {
        let mut reader = IterableRecordReader::new(vec!["a", "b"]).with_source("letters");

        let first = reader.read_record().unwrap().unwrap();
        let second = reader.read_record().unwrap().unwrap();

        assert_eq!(first.header().number(), 1);
        assert_eq!(second.header().number(), 2);
        assert_eq!(second.header().source(), "letters");
        assert_eq!(*second.payload(), "b");
        assert!(reader.read_record().unwrap().is_none());
    }

    #[test]
    fn knows_total_of_exact_size_sources() {
        let reader = IterableRecordReader::new(1..=10);
        assert_eq!(reader.total_records(), Some(10));

        let reader = IterableRecordReader::new((1..=10).filter(|n| n % 2 == 0));
        assert_eq!(reader.total_records(), None);
    }

    struct FlakyReader {
        failures_left: u32,
        served: bool,
    }

    impl RecordReader<u32> for FlakyReader {
        fn read_record(&mut self) -> anyhow::Result<Option<Record<u32>>> {
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(anyhow!("connection reset"));
            }
            if self.served {
                return Ok(None);
            }
            self.served = true;
            Ok(Some(Record::new(Header::new(1, "flaky"), 42)))
        }
    }

    #[test]
    fn retryable_reader_retries_failed_reads() {
        let flaky = FlakyReader {
            failures_left: 2,
            served: false,
        };
        let policy = RetryPolicy::new(3, Duration::ZERO).unwrap();
        let mut reader = RetryableRecordReader::new(flaky, policy);

        let record = reader.read_record().unwrap().unwrap();
        assert_eq!(*record.payload(), 42);
        assert!(reader.read_record().unwrap().is_none());
    }

    #[test]
    fn retryable_reader_surfaces_last_error() {
        let flaky = FlakyReader {
            failures_left: 5,
            served: false,
        };
        let policy = RetryPolicy::new(2, Duration::ZERO).unwrap();
        let mut reader = RetryableRecordReader::new(flaky, policy);

        let err = reader.read_record().unwrap_err();
        assert_eq!(err.to_string(), "connection reset");
    }
}
