//! Jobs: the read → process → write loop.
//!
//! A [`BatchJob`] drives one run over one data source:
//!
//! ```text
//! before_job_start
//! open reader, open writer            (failure: FAILED, no record is read)
//! loop:
//!     before_batch_reading
//!     pull records until batch_size are accepted, the source is exhausted,
//!     the record limit is hit, or the error threshold is exceeded
//!     after_batch_processing
//!     write the accepted records      (failure: FAILED, unless batch scanning)
//! stamp end time, close writer, close reader
//! COMPLETED | FAILED
//! after_job_end
//! ```
//!
//! A run never panics on collaborator failures and always yields a
//! [`JobReport`]: its status and counters are the failure signal.

mod builder;
mod metrics;
mod monitor;
mod parameters;
mod report;

pub use builder::JobBuilder;
pub use metrics::JobMetrics;
pub use monitor::{JobMonitor, MonitorSnapshot, Subscription};
pub use parameters::{
    DEFAULT_BATCH_SIZE, DEFAULT_JOB_NAME, ENV_BATCH_SCANNING, ENV_BATCH_SIZE,
    ENV_ERROR_THRESHOLD, ENV_MONITORING, ENV_RECORD_LIMIT, JobParameters,
};
pub use report::{JobReport, JobStatus};

use chrono::Utc;
use forgebatch_core::format::format_error_threshold;
use forgebatch_core::{Batch, Record};
use tracing::{debug, error, info, warn};

use crate::error::{JobError, error_chain};
use crate::listener::{
    BatchListener, CompositeListener, JobListener, PipelineListener, RecordReaderListener,
    RecordWriterListener,
};
use crate::pipeline::{Outcome, Pipeline};
use crate::reader::RecordReader;
use crate::writer::RecordWriter;

/// A unit of work an executor can run to completion.
pub trait Job: Send {
    fn name(&self) -> &str;

    /// Run the job and return its final report.
    fn call(&mut self) -> JobReport;
}

impl<J: Job + ?Sized> Job for Box<J> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn call(&mut self) -> JobReport {
        (**self).call()
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Opened {
    reader: bool,
    writer: bool,
}

/// Why the pulling of a batch stopped early.
enum Stop {
    Exhausted,
    Abort(JobError),
}

/// The batch processing engine. Build one with [`JobBuilder`].
pub struct BatchJob<I, O> {
    reader: Box<dyn RecordReader<I>>,
    writer: Box<dyn RecordWriter<O>>,
    pipeline: Pipeline<I, O>,
    job_listeners: CompositeListener<dyn JobListener>,
    batch_listeners: CompositeListener<dyn BatchListener<O>>,
    reader_listeners: CompositeListener<dyn RecordReaderListener<I>>,
    pipeline_listeners: CompositeListener<dyn PipelineListener<I, O>>,
    writer_listeners: CompositeListener<dyn RecordWriterListener<O>>,
    report: JobReport,
    monitor: JobMonitor,
    opened: Opened,
}

impl<I: 'static, O: 'static> BatchJob<I, O> {
    fn from_builder(builder: JobBuilder<I, O>) -> Self {
        let report = JobReport::new(builder.parameters);
        let monitor = JobMonitor::new(report.clone());
        Self {
            reader: builder.reader,
            writer: builder.writer,
            pipeline: builder.pipeline,
            job_listeners: builder.job_listeners,
            batch_listeners: builder.batch_listeners,
            reader_listeners: builder.reader_listeners,
            pipeline_listeners: builder.pipeline_listeners,
            writer_listeners: builder.writer_listeners,
            report,
            monitor,
            opened: Opened::default(),
        }
    }

    pub fn parameters(&self) -> &JobParameters {
        self.report.parameters()
    }

    /// Report of the current (or last) run.
    pub fn report(&self) -> &JobReport {
        &self.report
    }

    /// Handle on the live report, usable from other threads while the job runs.
    pub fn monitor(&self) -> JobMonitor {
        self.monitor.clone()
    }

    fn run(&mut self) -> JobReport {
        self.start();
        let outcome = match self.open() {
            Ok(()) => {
                self.set_status(JobStatus::Started);
                self.process_batches()
            }
            Err(err) => Err(err),
        };
        self.report.metrics_mut().set_end_time(Utc::now());
        self.close();
        self.finish(outcome);
        self.report.clone()
    }

    fn start(&mut self) {
        self.report.reset();
        self.opened = Opened::default();
        self.job_listeners.before_job_start(self.report.parameters());
        self.report.metrics_mut().set_start_time(Utc::now());

        let params = self.report.parameters();
        info!(
            job = %params.name(),
            execution_id = %params.execution_id(),
            batch_size = params.batch_size(),
            error_threshold = %format_error_threshold(params.error_threshold()),
            monitoring = params.monitoring_enabled(),
            batch_scanning = params.batch_scanning(),
            "job starting"
        );
        self.monitor.publish(&self.report);
    }

    fn open(&mut self) -> Result<(), JobError> {
        debug!(job = %self.report.job_name(), "opening record reader");
        self.reader.open().map_err(JobError::ReaderOpen)?;
        self.opened.reader = true;
        self.report.set_total_records(self.reader.total_records());

        debug!(job = %self.report.job_name(), "opening record writer");
        self.writer.open().map_err(JobError::WriterOpen)?;
        self.opened.writer = true;
        Ok(())
    }

    fn set_status(&mut self, status: JobStatus) {
        self.report.set_status(status);
        info!(job = %self.report.job_name(), status = %status, "job status changed");
        self.publish_progress();
    }

    fn publish_progress(&self) {
        if self.report.parameters().monitoring_enabled() {
            self.monitor.publish(&self.report);
        }
    }

    fn process_batches(&mut self) -> Result<(), JobError> {
        let batch_size = self.report.parameters().batch_size();
        loop {
            self.batch_listeners.before_batch_reading();
            let mut batch = Batch::with_capacity(batch_size);
            let mut stop = None;

            while batch.len() < batch_size {
                if self.record_limit_reached() {
                    debug!(job = %self.report.job_name(), "record limit reached");
                    stop = Some(Stop::Exhausted);
                    break;
                }
                let record = match self.read_record() {
                    Ok(Some(record)) => record,
                    Ok(None) => {
                        stop = Some(Stop::Exhausted);
                        break;
                    }
                    Err(err) => {
                        stop = Some(Stop::Abort(err));
                        break;
                    }
                };
                if let Some(accepted) = self.process_record(record) {
                    batch.push(accepted);
                }
                if let Some(breach) = self.error_threshold_breach() {
                    stop = Some(Stop::Abort(breach));
                    break;
                }
            }

            self.batch_listeners.after_batch_processing(&batch);
            if !batch.is_empty() {
                self.write_batch(batch)?;
            }

            // Records that failed a scanned write count against the threshold too.
            match (stop, self.error_threshold_breach()) {
                (Some(Stop::Abort(err)), _) => return Err(err),
                (_, Some(breach)) => return Err(breach),
                (Some(Stop::Exhausted), None) => return Ok(()),
                (None, None) => continue,
            }
        }
    }

    fn record_limit_reached(&self) -> bool {
        let pulled = self.report.metrics().pulled_count();
        self.report
            .parameters()
            .record_limit()
            .is_some_and(|limit| pulled >= limit)
    }

    fn error_threshold_breach(&self) -> Option<JobError> {
        let threshold = self.report.parameters().error_threshold()?;
        let errors = self.report.metrics().error_count();
        (errors > threshold).then_some(JobError::ErrorThresholdExceeded { threshold, errors })
    }

    fn read_record(&mut self) -> Result<Option<Record<I>>, JobError> {
        self.reader_listeners.before_record_reading();
        match self.reader.read_record() {
            Ok(record) => {
                self.reader_listeners.after_record_reading(record.as_ref());
                if record.is_some() {
                    self.report.metrics_mut().increment_pulled_count();
                }
                Ok(record)
            }
            Err(err) => {
                self.reader_listeners.on_record_reading_exception(&err);
                Err(JobError::RecordRead(err))
            }
        }
    }

    /// Run one record through the pipeline, returning it if accepted.
    fn process_record(&mut self, record: Record<I>) -> Option<Record<O>> {
        let header = record.header().clone();
        self.pipeline_listeners.before_record_processing(&record);

        let accepted = match self.pipeline.run(record) {
            Outcome::Accepted(processed) => {
                self.report.metrics_mut().increment_read_count();
                self.pipeline_listeners
                    .after_record_processing(&header, Some(&processed));
                Some(processed)
            }
            Outcome::Filtered => {
                debug!(job = %self.report.job_name(), record = header.number(), "record filtered");
                self.report.metrics_mut().increment_filter_count();
                self.pipeline_listeners.after_record_processing(&header, None);
                None
            }
            Outcome::Errored(err) => {
                let rendered = error_chain(&err);
                warn!(
                    job = %self.report.job_name(),
                    record = header.number(),
                    source = %header.source(),
                    error = %rendered,
                    "unable to process record"
                );
                self.report.metrics_mut().increment_error_count();
                self.pipeline_listeners
                    .on_record_processing_exception(&header, &err);
                self.report.set_last_error(rendered);
                None
            }
        };
        self.publish_progress();
        accepted
    }

    fn write_batch(&mut self, batch: Batch<O>) -> Result<(), JobError> {
        debug!(job = %self.report.job_name(), records = batch.len(), "writing batch");
        self.writer_listeners.before_record_writing(&batch);
        match self.writer.write_records(&batch) {
            Ok(()) => {
                self.writer_listeners.after_record_writing(&batch);
                self.batch_listeners.after_batch_writing(&batch);
                self.report
                    .metrics_mut()
                    .increment_write_count(batch.len() as u64);
                self.publish_progress();
                Ok(())
            }
            Err(err) => {
                self.writer_listeners.on_record_writing_exception(&batch, &err);
                self.batch_listeners.on_batch_writing_exception(&batch, &err);
                if !self.report.parameters().batch_scanning() {
                    return Err(JobError::BatchWrite(err));
                }
                warn!(
                    job = %self.report.job_name(),
                    records = batch.len(),
                    error = %format!("{err:#}"),
                    "unable to write batch, scanning it record by record"
                );
                self.report.set_last_error(format!("{err:#}"));
                self.scan_batch(batch);
                Ok(())
            }
        }
    }

    /// Write each record of a failed batch on its own, marked as scanned.
    fn scan_batch(&mut self, batch: Batch<O>) {
        for record in batch {
            let single = Batch::from(record.into_scanned());
            self.writer_listeners.before_record_writing(&single);
            match self.writer.write_records(&single) {
                Ok(()) => {
                    self.writer_listeners.after_record_writing(&single);
                    self.report.metrics_mut().increment_write_count(1);
                }
                Err(err) => {
                    let number = single.numbers().first().copied().unwrap_or_default();
                    warn!(
                        job = %self.report.job_name(),
                        record = number,
                        error = %format!("{err:#}"),
                        "unable to write scanned record"
                    );
                    self.writer_listeners.on_record_writing_exception(&single, &err);
                    self.report.metrics_mut().increment_error_count();
                    self.report.set_last_error(format!("{err:#}"));
                }
            }
        }
        self.publish_progress();
    }

    fn close(&mut self) {
        if self.opened.writer {
            debug!(job = %self.report.job_name(), "closing record writer");
            if let Err(err) = self.writer.close() {
                warn!(
                    job = %self.report.job_name(),
                    error = %format!("{err:#}"),
                    "unable to close record writer"
                );
                self.report.set_last_error(format!("{err:#}"));
            }
        }
        if self.opened.reader {
            debug!(job = %self.report.job_name(), "closing record reader");
            if let Err(err) = self.reader.close() {
                warn!(
                    job = %self.report.job_name(),
                    error = %format!("{err:#}"),
                    "unable to close record reader"
                );
                self.report.set_last_error(format!("{err:#}"));
            }
        }
        self.opened = Opened::default();
    }

    fn finish(&mut self, outcome: Result<(), JobError>) {
        match outcome {
            Ok(()) => self.set_status(JobStatus::Completed),
            Err(err) => {
                let rendered = error_chain(&err);
                error!(job = %self.report.job_name(), error = %rendered, "job failed");
                self.report.set_last_error(rendered);
                self.set_status(JobStatus::Failed);
            }
        }

        let metrics = self.report.metrics();
        info!(
            job = %self.report.job_name(),
            status = %self.report.status(),
            read = metrics.read_count(),
            written = metrics.write_count(),
            filtered = metrics.filter_count(),
            errors = metrics.error_count(),
            duration = %self.report.formatted_duration(),
            "job finished"
        );

        self.job_listeners.after_job_end(&mut self.report);
        self.monitor.publish(&self.report);
    }
}

impl<I: 'static, O: 'static> Job for BatchJob<I, O> {
    fn name(&self) -> &str {
        self.report.job_name()
    }

    fn call(&mut self) -> JobReport {
        self.run()
    }
}
