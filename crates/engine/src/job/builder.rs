use forgebatch_core::{Batch, ConfigResult, ExecutionId, Record};

use super::{BatchJob, JobParameters};
use crate::listener::{
    BatchListener, CompositeListener, JobListener, PipelineListener, RecordReaderListener,
    RecordWriterListener,
};
use crate::pipeline::Pipeline;
use crate::reader::RecordReader;
use crate::stage::{RecordFilter, RecordProcessor, RecordValidator};
use crate::writer::RecordWriter;

/// Reader used when none is configured: an empty source.
struct NoOpRecordReader;

impl<P> RecordReader<P> for NoOpRecordReader {
    fn read_record(&mut self) -> anyhow::Result<Option<Record<P>>> {
        Ok(None)
    }
}

/// Writer used when none is configured: discards every batch.
struct NoOpRecordWriter;

impl<P> RecordWriter<P> for NoOpRecordWriter {
    fn write_records(&mut self, _batch: &Batch<P>) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Assembles a [`BatchJob`] reading `Record<I>` and writing `Record<O>`.
///
/// Listener registration order matters: "before" hooks fire in the order
/// listeners were added, "after" hooks in reverse.
pub struct JobBuilder<I, O> {
    pub(super) parameters: JobParameters,
    pub(super) reader: Box<dyn RecordReader<I>>,
    pub(super) writer: Box<dyn RecordWriter<O>>,
    pub(super) pipeline: Pipeline<I, O>,
    pub(super) job_listeners: CompositeListener<dyn JobListener>,
    pub(super) batch_listeners: CompositeListener<dyn BatchListener<O>>,
    pub(super) reader_listeners: CompositeListener<dyn RecordReaderListener<I>>,
    pub(super) pipeline_listeners: CompositeListener<dyn PipelineListener<I, O>>,
    pub(super) writer_listeners: CompositeListener<dyn RecordWriterListener<O>>,
}

impl<P: 'static> JobBuilder<P, P> {
    /// Builder with an empty pipeline: records are written as read.
    pub fn new() -> Self {
        Self::with_pipeline(Pipeline::new())
    }
}

impl<P: 'static> Default for JobBuilder<P, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: 'static, O: 'static> JobBuilder<I, O> {
    /// Builder running records through `pipeline`.
    pub fn with_pipeline(pipeline: Pipeline<I, O>) -> Self {
        Self {
            parameters: JobParameters::default(),
            reader: Box::new(NoOpRecordReader),
            writer: Box::new(NoOpRecordWriter),
            pipeline,
            job_listeners: CompositeListener::new(),
            batch_listeners: CompositeListener::new(),
            reader_listeners: CompositeListener::new(),
            pipeline_listeners: CompositeListener::new(),
            writer_listeners: CompositeListener::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.parameters = self.parameters.with_name(name);
        self
    }

    pub fn execution_id(mut self, execution_id: ExecutionId) -> Self {
        self.parameters = self.parameters.with_execution_id(execution_id);
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.parameters = self.parameters.with_batch_size(batch_size);
        self
    }

    pub fn error_threshold(mut self, threshold: u64) -> Self {
        self.parameters = self.parameters.with_error_threshold(threshold);
        self
    }

    pub fn record_limit(mut self, limit: u64) -> Self {
        self.parameters = self.parameters.with_record_limit(limit);
        self
    }

    pub fn enable_monitoring(mut self, enabled: bool) -> Self {
        self.parameters = self.parameters.with_monitoring(enabled);
        self
    }

    pub fn enable_batch_scanning(mut self, enabled: bool) -> Self {
        self.parameters = self.parameters.with_batch_scanning(enabled);
        self
    }

    pub fn data_source(mut self, data_source: impl Into<String>) -> Self {
        self.parameters = self.parameters.with_data_source(data_source);
        self
    }

    /// Replace every parameter at once (e.g. loaded from JSON or the environment).
    pub fn parameters(mut self, parameters: JobParameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn reader(mut self, reader: impl RecordReader<I> + 'static) -> Self {
        self.reader = Box::new(reader);
        self
    }

    pub fn writer(mut self, writer: impl RecordWriter<O> + 'static) -> Self {
        self.writer = Box::new(writer);
        self
    }

    /// Append a filter at the end of the pipeline.
    pub fn filter(mut self, filter: impl RecordFilter<O> + 'static) -> Self {
        self.pipeline = self.pipeline.filter(filter);
        self
    }

    /// Append a validator at the end of the pipeline.
    pub fn validator(mut self, validator: impl RecordValidator<O> + 'static) -> Self {
        self.pipeline = self.pipeline.validate(validator);
        self
    }

    /// Append a payload-preserving processor at the end of the pipeline.
    pub fn processor(mut self, processor: impl RecordProcessor<O, O> + 'static) -> Self {
        self.pipeline = self.pipeline.process(processor);
        self
    }

    pub fn job_listener(mut self, listener: impl JobListener + 'static) -> Self {
        self.job_listeners.add(Box::new(listener));
        self
    }

    pub fn batch_listener(mut self, listener: impl BatchListener<O> + 'static) -> Self {
        self.batch_listeners.add(Box::new(listener));
        self
    }

    pub fn reader_listener(mut self, listener: impl RecordReaderListener<I> + 'static) -> Self {
        self.reader_listeners.add(Box::new(listener));
        self
    }

    pub fn pipeline_listener(mut self, listener: impl PipelineListener<I, O> + 'static) -> Self {
        self.pipeline_listeners.add(Box::new(listener));
        self
    }

    pub fn writer_listener(mut self, listener: impl RecordWriterListener<O> + 'static) -> Self {
        self.writer_listeners.add(Box::new(listener));
        self
    }

    /// Validate the parameters and assemble the job.
    pub fn build(self) -> ConfigResult<BatchJob<I, O>> {
        self.parameters.validate()?;
        Ok(BatchJob::from_builder(self))
    }
}
