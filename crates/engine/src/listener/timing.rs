use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use forgebatch_core::{Header, Record};

use super::{JobListener, PipelineListener};
use crate::error::RecordError;
use crate::job::JobReport;

/// Measures how long records spend in the pipeline and publishes the average
/// as a custom metric at the end of the run.
///
/// Register the same listener (clones share state) both as a pipeline listener
/// and as a job listener.
#[derive(Debug, Clone, Default)]
pub struct ProcessingTimeListener {
    state: Arc<Mutex<TimingState>>,
}

#[derive(Debug, Default)]
struct TimingState {
    started: Option<Instant>,
    total: Duration,
    records: u64,
}

impl ProcessingTimeListener {
    pub const METRIC: &'static str = "Average record processing time (ms)";

    pub fn new() -> Self {
        Self::default()
    }

    /// Average time per record so far, `None` before the first record.
    pub fn average(&self) -> Option<Duration> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        (state.records > 0)
            .then(|| Duration::from_secs_f64(state.total.as_secs_f64() / state.records as f64))
    }

    fn start(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.started = Some(Instant::now());
    }

    fn stop(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(started) = state.started.take() {
            state.total += started.elapsed();
            state.records += 1;
        }
    }
}

impl<I, O> PipelineListener<I, O> for ProcessingTimeListener {
    fn before_record_processing(&mut self, _record: &Record<I>) {
        self.start();
    }

    fn after_record_processing(&mut self, _input: &Header, _output: Option<&Record<O>>) {
        self.stop();
    }

    fn on_record_processing_exception(&mut self, _input: &Header, _error: &RecordError) {
        self.stop();
    }
}

impl JobListener for ProcessingTimeListener {
    fn after_job_end(&mut self, report: &mut JobReport) {
        if let Some(average) = self.average() {
            report.add_custom_metric(Self::METRIC, average.as_secs_f64() * 1_000.0);
        }
    }
}
