use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Counters and timings of one job run.
///
/// Mutated only by the running job. Listeners may append custom metrics once the
/// run is over, through [`JobReport::add_custom_metric`](super::JobReport::add_custom_metric).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobMetrics {
    pulled_count: u64,
    read_count: u64,
    write_count: u64,
    filter_count: u64,
    error_count: u64,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    custom_metrics: BTreeMap<String, f64>,
}

impl JobMetrics {
    /// Records accepted by the pipeline.
    pub fn read_count(&self) -> u64 {
        self.read_count
    }

    /// Records successfully handed to the writer.
    pub fn write_count(&self) -> u64 {
        self.write_count
    }

    pub fn filter_count(&self) -> u64 {
        self.filter_count
    }

    pub fn error_count(&self) -> u64 {
        self.error_count
    }

    /// Records pulled from the reader, whatever their outcome.
    ///
    /// Equals `read + filter + error` unless batch scanning counted write
    /// failures as errors.
    pub fn pulled_count(&self) -> u64 {
        self.pulled_count
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    /// Elapsed time of the run; measured up to now while it is still going.
    pub fn duration(&self) -> Option<Duration> {
        let start = self.start_time?;
        let end = self.end_time.unwrap_or_else(Utc::now);
        Some((end - start).to_std().unwrap_or_default())
    }

    pub fn custom_metrics(&self) -> &BTreeMap<String, f64> {
        &self.custom_metrics
    }

    pub fn custom_metric(&self, name: &str) -> Option<f64> {
        self.custom_metrics.get(name).copied()
    }

    pub(crate) fn increment_pulled_count(&mut self) {
        self.pulled_count += 1;
    }

    pub(crate) fn increment_read_count(&mut self) {
        self.read_count += 1;
    }

    pub(crate) fn increment_write_count(&mut self, written: u64) {
        self.write_count += written;
    }

    pub(crate) fn increment_filter_count(&mut self) {
        self.filter_count += 1;
    }

    pub(crate) fn increment_error_count(&mut self) {
        self.error_count += 1;
    }

    pub(crate) fn set_start_time(&mut self, time: DateTime<Utc>) {
        self.start_time = Some(time);
    }

    pub(crate) fn set_end_time(&mut self, time: DateTime<Utc>) {
        self.end_time = Some(time);
    }

    pub(crate) fn add_custom_metric(&mut self, name: impl Into<String>, value: f64) {
        self.custom_metrics.insert(name.into(), value);
    }

    /// Fold another run's counters into these: counts add up, the time span
    /// widens to cover both runs.
    pub(crate) fn absorb(&mut self, other: &JobMetrics) {
        self.pulled_count += other.pulled_count;
        self.read_count += other.read_count;
        self.write_count += other.write_count;
        self.filter_count += other.filter_count;
        self.error_count += other.error_count;
        self.start_time = earliest(self.start_time, other.start_time);
        self.end_time = self.end_time.max(other.end_time);
    }
}

fn earliest(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}
