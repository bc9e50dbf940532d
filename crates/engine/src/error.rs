//! Engine error model.
//!
//! Two levels of failure exist while a job runs:
//!
//! - [`RecordError`]: one record could not make it through the pipeline. The record is
//!   dropped, counted, and the job goes on.
//! - [`JobError`]: the run itself cannot go on (open failure, read failure, write
//!   failure, error threshold breach). The job ends with status `FAILED`.
//!
//! Neither escapes a job run: both end up in the [`JobReport`](crate::job::JobReport).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One constraint a record failed to satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub field: Option<String>,
    pub message: String,
}

impl Violation {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            field: None,
            message: message.into(),
        }
    }

    pub fn on_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: Some(field.into()),
            message: message.into(),
        }
    }
}

impl core::fmt::Display for Violation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{field}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Why a single record was rejected with an error.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("unable to filter record")]
    Filtering(#[source] anyhow::Error),

    #[error("unable to map record")]
    Mapping(#[source] anyhow::Error),

    #[error("record validation failed: {}", join_violations(.violations))]
    Validation { violations: Vec<Violation> },

    #[error("unable to process record")]
    Processing(#[source] anyhow::Error),
}

impl RecordError {
    pub fn is_validation(&self) -> bool {
        matches!(self, RecordError::Validation { .. })
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Why a job run ended in `FAILED`.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("unable to open record reader")]
    ReaderOpen(#[source] anyhow::Error),

    #[error("unable to open record writer")]
    WriterOpen(#[source] anyhow::Error),

    #[error("unable to read next record")]
    RecordRead(#[source] anyhow::Error),

    #[error("unable to write records")]
    BatchWrite(#[source] anyhow::Error),

    #[error("error threshold exceeded ({errors} > {threshold}), aborting execution")]
    ErrorThresholdExceeded { threshold: u64, errors: u64 },
}

/// Render an error and its whole `source()` chain on one line (`outer: inner: root`).
pub fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
