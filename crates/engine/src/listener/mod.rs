//! Listener families observing a job run.
//!
//! Five families exist, one per phase of the run:
//!
//! | family                   | hooks                                                             |
//! |--------------------------|-------------------------------------------------------------------|
//! | [`JobListener`]          | before the run starts, after it ends                              |
//! | [`BatchListener`]        | before a batch is read, after it is processed, after it is written |
//! | [`RecordReaderListener`] | around each read                                                  |
//! | [`PipelineListener`]     | around each record going through the pipeline                     |
//! | [`RecordWriterListener`] | around each batch write                                           |
//!
//! Every hook has a no-op default, so a listener only implements what it needs.
//! A job keeps one [`CompositeListener`] per family: "before" hooks fire in
//! registration order and "after"/"on exception" hooks in reverse registration
//! order, so listeners nest like scopes.
//!
//! Listeners cannot alter control flow. The only thing they can change is the
//! report's custom metrics, from [`JobListener::after_job_end`].

mod timing;

pub use timing::ProcessingTimeListener;

use forgebatch_core::{Batch, Header, Record};

use crate::error::RecordError;
use crate::job::{JobParameters, JobReport};

pub trait JobListener: Send {
    fn before_job_start(&mut self, _parameters: &JobParameters) {}

    /// The report is final except for custom metrics, which may be added here.
    fn after_job_end(&mut self, _report: &mut JobReport) {}
}

pub trait BatchListener<P>: Send {
    fn before_batch_reading(&mut self) {}

    fn after_batch_processing(&mut self, _batch: &Batch<P>) {}

    fn after_batch_writing(&mut self, _batch: &Batch<P>) {}

    fn on_batch_writing_exception(&mut self, _batch: &Batch<P>, _error: &anyhow::Error) {}
}

pub trait RecordReaderListener<P>: Send {
    fn before_record_reading(&mut self) {}

    /// `None` means the reader reported the end of the source.
    fn after_record_reading(&mut self, _record: Option<&Record<P>>) {}

    fn on_record_reading_exception(&mut self, _error: &anyhow::Error) {}
}

pub trait PipelineListener<I, O>: Send {
    fn before_record_processing(&mut self, _record: &Record<I>) {}

    /// `None` means the record was filtered out.
    fn after_record_processing(&mut self, _input: &Header, _output: Option<&Record<O>>) {}

    fn on_record_processing_exception(&mut self, _input: &Header, _error: &RecordError) {}
}

pub trait RecordWriterListener<P>: Send {
    fn before_record_writing(&mut self, _batch: &Batch<P>) {}

    fn after_record_writing(&mut self, _batch: &Batch<P>) {}

    fn on_record_writing_exception(&mut self, _batch: &Batch<P>, _error: &anyhow::Error) {}
}

/// Ordered group of listeners of one family, itself usable as a listener.
pub struct CompositeListener<L: ?Sized> {
    listeners: Vec<Box<L>>,
}

impl<L: ?Sized> CompositeListener<L> {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    pub fn add(&mut self, listener: Box<L>) {
        self.listeners.push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Call `f` on each listener in registration order.
    pub fn forward(&mut self, mut f: impl FnMut(&mut L)) {
        for listener in self.listeners.iter_mut() {
            f(listener.as_mut());
        }
    }

    /// Call `f` on each listener in reverse registration order.
    pub fn reverse(&mut self, mut f: impl FnMut(&mut L)) {
        for listener in self.listeners.iter_mut().rev() {
            f(listener.as_mut());
        }
    }
}

impl<L: ?Sized> Default for CompositeListener<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl JobListener for CompositeListener<dyn JobListener> {
    fn before_job_start(&mut self, parameters: &JobParameters) {
        self.forward(|l| l.before_job_start(parameters));
    }

    fn after_job_end(&mut self, report: &mut JobReport) {
        self.reverse(|l| l.after_job_end(report));
    }
}

impl<P: 'static> BatchListener<P> for CompositeListener<dyn BatchListener<P>> {
    fn before_batch_reading(&mut self) {
        self.forward(|l| l.before_batch_reading());
    }

    fn after_batch_processing(&mut self, batch: &Batch<P>) {
        self.reverse(|l| l.after_batch_processing(batch));
    }

    fn after_batch_writing(&mut self, batch: &Batch<P>) {
        self.reverse(|l| l.after_batch_writing(batch));
    }

    fn on_batch_writing_exception(&mut self, batch: &Batch<P>, error: &anyhow::Error) {
        self.reverse(|l| l.on_batch_writing_exception(batch, error));
    }
}

impl<P: 'static> RecordReaderListener<P> for CompositeListener<dyn RecordReaderListener<P>> {
    fn before_record_reading(&mut self) {
        self.forward(|l| l.before_record_reading());
    }

    fn after_record_reading(&mut self, record: Option<&Record<P>>) {
        self.reverse(|l| l.after_record_reading(record));
    }

    fn on_record_reading_exception(&mut self, error: &anyhow::Error) {
        self.reverse(|l| l.on_record_reading_exception(error));
    }
}

impl<I: 'static, O: 'static> PipelineListener<I, O>
    for CompositeListener<dyn PipelineListener<I, O>>
{
    fn before_record_processing(&mut self, record: &Record<I>) {
        self.forward(|l| l.before_record_processing(record));
    }

    fn after_record_processing(&mut self, input: &Header, output: Option<&Record<O>>) {
        self.reverse(|l| l.after_record_processing(input, output));
    }

    fn on_record_processing_exception(&mut self, input: &Header, error: &RecordError) {
        self.reverse(|l| l.on_record_processing_exception(input, error));
    }
}

impl<P: 'static> RecordWriterListener<P> for CompositeListener<dyn RecordWriterListener<P>> {
    fn before_record_writing(&mut self, batch: &Batch<P>) {
        self.forward(|l| l.before_record_writing(batch));
    }

    fn after_record_writing(&mut self, batch: &Batch<P>) {
        self.reverse(|l| l.after_record_writing(batch));
    }

    fn on_record_writing_exception(&mut self, batch: &Batch<P>, error: &anyhow::Error) {
        self.reverse(|l| l.on_record_writing_exception(batch, error));
    }
}
