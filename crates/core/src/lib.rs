//! `forgebatch-core`: record model and engine-independent building blocks.
//!
//! This crate holds the data carriers that flow through a job (records, headers,
//! batches), the retry mechanism, and the formatting helpers used by reports. It
//! knows nothing about jobs, listeners or threads.

pub mod batch;
pub mod error;
pub mod format;
pub mod id;
pub mod record;
pub mod retry;

pub use batch::Batch;
pub use error::{ConfigError, ConfigResult};
pub use id::ExecutionId;
pub use record::{Header, Record};
pub use retry::{LoggingRetryListener, NoopRetryListener, Retry, RetryListener, RetryPolicy};
