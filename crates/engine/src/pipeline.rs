//! The record processing pipeline.
//!
//! A [`Pipeline`] is an ordered chain of stages applied to each record read by a
//! job. Stages are appended with combinators and run in registration order:
//!
//! ```ignore
//! let pipeline = Pipeline::<String>::new()
//!     .filter(|r: &Record<String>| !r.payload().is_empty())
//!     .map(parse_order)                // Record<String> -> Record<Order>
//!     .validate(check_order)
//!     .process(enrich_order);          // Record<Order> -> Record<EnrichedOrder>
//! ```
//!
//! Each record ends in exactly one [`Outcome`]. A stage that rejects the record
//! (filtered or errored) short-circuits the rest of the chain.

use forgebatch_core::Record;

use crate::error::RecordError;
use crate::stage::{RecordFilter, RecordMapper, RecordProcessor, RecordValidator};

/// What happened to one record.
#[derive(Debug)]
pub enum Outcome<P> {
    /// The record went through every stage and goes to the writer.
    Accepted(Record<P>),
    /// A filter (or a processor returning `None`) dropped the record.
    Filtered,
    /// A stage failed on the record.
    Errored(RecordError),
}

impl<P> Outcome<P> {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::Accepted(_))
    }

    pub fn is_filtered(&self) -> bool {
        matches!(self, Outcome::Filtered)
    }

    pub fn is_errored(&self) -> bool {
        matches!(self, Outcome::Errored(_))
    }
}

type Chain<I, O> = Box<dyn FnMut(Record<I>) -> Outcome<O> + Send>;

/// Ordered chain of stages turning `Record<I>` into `Record<O>`.
pub struct Pipeline<I, O = I> {
    chain: Chain<I, O>,
    stages: usize,
}

impl<P: 'static> Pipeline<P, P> {
    /// The empty pipeline: accepts every record unchanged.
    pub fn new() -> Self {
        Self {
            chain: Box::new(Outcome::Accepted),
            stages: 0,
        }
    }
}

impl<P: 'static> Default for Pipeline<P, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: 'static, O: 'static> Pipeline<I, O> {
    /// Number of registered stages.
    pub fn len(&self) -> usize {
        self.stages
    }

    pub fn is_empty(&self) -> bool {
        self.stages == 0
    }

    /// Run one record through every stage.
    pub fn run(&mut self, record: Record<I>) -> Outcome<O> {
        (self.chain)(record)
    }

    fn then<N: 'static>(
        self,
        mut stage: impl FnMut(Record<O>) -> Outcome<N> + Send + 'static,
    ) -> Pipeline<I, N> {
        let mut chain = self.chain;
        Pipeline {
            chain: Box::new(move |record| match chain(record) {
                Outcome::Accepted(record) => stage(record),
                Outcome::Filtered => Outcome::Filtered,
                Outcome::Errored(err) => Outcome::Errored(err),
            }),
            stages: self.stages + 1,
        }
    }

    /// Append a filter. Records it rejects end as [`Outcome::Filtered`].
    pub fn filter(self, mut filter: impl RecordFilter<O> + 'static) -> Self {
        self.then(move |record| match filter.accept(&record) {
            Ok(true) => Outcome::Accepted(record),
            Ok(false) => Outcome::Filtered,
            Err(err) => Outcome::Errored(RecordError::Filtering(err)),
        })
    }

    /// Append a mapper, changing the payload type.
    pub fn map<N: 'static>(self, mut mapper: impl RecordMapper<O, N> + 'static) -> Pipeline<I, N> {
        self.then(move |record| match mapper.map_record(record) {
            Ok(mapped) => Outcome::Accepted(mapped),
            Err(err) => Outcome::Errored(RecordError::Mapping(err)),
        })
    }

    /// Append a validator. Any violation ends the record as [`Outcome::Errored`].
    pub fn validate(self, mut validator: impl RecordValidator<O> + 'static) -> Self {
        self.then(move |record| {
            let violations = validator.validate(&record);
            if violations.is_empty() {
                Outcome::Accepted(record)
            } else {
                Outcome::Errored(RecordError::Validation { violations })
            }
        })
    }

    /// Append a processor. Returning `Ok(None)` filters the record.
    pub fn process<N: 'static>(
        self,
        mut processor: impl RecordProcessor<O, N> + 'static,
    ) -> Pipeline<I, N> {
        self.then(move |record| match processor.process_record(record) {
            Ok(Some(processed)) => Outcome::Accepted(processed),
            Ok(None) => Outcome::Filtered,
            Err(err) => Outcome::Errored(RecordError::Processing(err)),
        })
    }
}

impl<I, O> core::fmt::Debug for Pipeline<I, O> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stages)
            .finish_non_exhaustive()
    }
}
