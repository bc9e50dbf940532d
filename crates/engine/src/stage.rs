//! Pipeline stage contracts: filter, map, validate, process.
//!
//! Every contract is also implemented for plain closures of the matching shape, so
//! small stages can be written inline when building a [`Pipeline`](crate::Pipeline).

use forgebatch_core::{LoggingRetryListener, Record, Retry, RetryListener, RetryPolicy};

use crate::error::Violation;

/// Decides whether a record continues down the pipeline.
pub trait RecordFilter<P>: Send {
    /// `Ok(true)` keeps the record, `Ok(false)` filters it out.
    fn accept(&mut self, record: &Record<P>) -> anyhow::Result<bool>;
}

impl<P, F> RecordFilter<P> for F
where
    F: FnMut(&Record<P>) -> bool + Send,
{
    fn accept(&mut self, record: &Record<P>) -> anyhow::Result<bool> {
        Ok(self(record))
    }
}

/// Turns a record into another record, possibly of another payload type.
pub trait RecordMapper<I, O>: Send {
    fn map_record(&mut self, record: Record<I>) -> anyhow::Result<Record<O>>;
}

impl<I, O, F> RecordMapper<I, O> for F
where
    F: FnMut(Record<I>) -> anyhow::Result<Record<O>> + Send,
{
    fn map_record(&mut self, record: Record<I>) -> anyhow::Result<Record<O>> {
        self(record)
    }
}

/// Checks a record against constraints. An empty result means valid.
pub trait RecordValidator<P>: Send {
    fn validate(&mut self, record: &Record<P>) -> Vec<Violation>;
}

impl<P, F> RecordValidator<P> for F
where
    F: FnMut(&Record<P>) -> Vec<Violation> + Send,
{
    fn validate(&mut self, record: &Record<P>) -> Vec<Violation> {
        self(record)
    }
}

/// General-purpose stage. `Ok(None)` means the record is filtered out.
pub trait RecordProcessor<I, O>: Send {
    fn process_record(&mut self, record: Record<I>) -> anyhow::Result<Option<Record<O>>>;
}

impl<I, O, F> RecordProcessor<I, O> for F
where
    F: FnMut(Record<I>) -> anyhow::Result<Option<Record<O>>> + Send,
{
    fn process_record(&mut self, record: Record<I>) -> anyhow::Result<Option<Record<O>>> {
        self(record)
    }
}

/// Processor decorator retrying the inner processor under a [`RetryPolicy`].
///
/// The record is cloned for every attempt, so the inner processor always sees the
/// original input.
pub struct RetryableRecordProcessor<Pr, L = LoggingRetryListener> {
    inner: Pr,
    retry: Retry<L>,
}

impl<Pr> RetryableRecordProcessor<Pr> {
    pub fn new(inner: Pr, policy: RetryPolicy) -> Self {
        Self {
            inner,
            retry: Retry::with_listener(policy, LoggingRetryListener::new("process record")),
        }
    }
}

impl<Pr, L: RetryListener> RetryableRecordProcessor<Pr, L> {
    pub fn with_listener(inner: Pr, policy: RetryPolicy, listener: L) -> Self {
        Self {
            inner,
            retry: Retry::with_listener(policy, listener),
        }
    }
}

impl<I, O, Pr, L> RecordProcessor<I, O> for RetryableRecordProcessor<Pr, L>
where
    I: Clone,
    Pr: RecordProcessor<I, O>,
    L: RetryListener + Send,
{
    fn process_record(&mut self, record: Record<I>) -> anyhow::Result<Option<Record<O>>> {
        let inner = &mut self.inner;
        self.retry
            .execute(|| inner.process_record(record.clone()))
            .map_err(|e| {
                e.context(format!(
                    "record {} failed after retries",
                    record.header().number()
                ))
            })
    }
}
