//! `forgebatch-engine`: the batch job engine.
//!
//! - **Collaborators**: [`RecordReader`], [`RecordWriter`] and the pipeline stage
//!   traits ([`RecordFilter`], [`RecordMapper`], [`RecordValidator`],
//!   [`RecordProcessor`]), plus in-memory and retrying implementations.
//! - **Pipeline**: [`Pipeline`] chains stages and classifies each record as an
//!   [`Outcome`].
//! - **Jobs**: [`BatchJob`] (built with [`JobBuilder`]) runs the read → process →
//!   write loop and produces a [`JobReport`]; a [`JobMonitor`] exposes it live.
//! - **Listeners**: five families observing every phase of a run.
//! - **Executor**: [`JobExecutor`] runs many jobs on a fixed thread pool.

pub mod error;
pub mod executor;
pub mod job;
pub mod listener;
pub mod pipeline;
pub mod reader;
pub mod stage;
pub mod writer;

pub use error::{JobError, RecordError, Violation};
pub use executor::{ExecutorConfig, ExecutorError, ExecutorStats, JobExecutor, JobHandle};
pub use job::{
    BatchJob, Job, JobBuilder, JobMetrics, JobMonitor, JobParameters, JobReport, JobStatus,
    MonitorSnapshot,
};
pub use listener::{
    BatchListener, CompositeListener, JobListener, PipelineListener, ProcessingTimeListener,
    RecordReaderListener, RecordWriterListener,
};
pub use pipeline::{Outcome, Pipeline};
pub use reader::{IterableRecordReader, RecordReader, RetryableRecordReader};
pub use stage::{
    RecordFilter, RecordMapper, RecordProcessor, RecordValidator, RetryableRecordProcessor,
};
pub use writer::{RecordWriter, RetryableRecordWriter, VecRecordWriter};

pub use forgebatch_core::{Batch, Header, Record, RetryPolicy};
