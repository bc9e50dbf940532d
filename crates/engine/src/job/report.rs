use std::collections::BTreeMap;
use std::fmt;

use forgebatch_core::ExecutionId;
use forgebatch_core::format::{
    NOT_APPLICABLE, format_count, format_duration, format_error_threshold, format_progress,
    format_time,
};
use serde::{Deserialize, Serialize};

use super::{JobMetrics, JobParameters};

/// Lifecycle of a job run.
///
/// `STARTING → STARTED → COMPLETED | FAILED`, or `STARTING → FAILED` when the
/// reader or writer cannot be opened. Terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Starting,
    Started,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JobStatus::Starting => "STARTING",
            JobStatus::Started => "STARTED",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        })
    }
}

/// Outcome of one job run: parameters, metrics, status and environment.
///
/// Built by the job while it runs; callers only get it finished (or as a
/// monitor snapshot). The one public mutation is
/// [`add_custom_metric`](Self::add_custom_metric), for job listeners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobReport {
    parameters: JobParameters,
    metrics: JobMetrics,
    status: JobStatus,
    last_error: Option<String>,
    /// Records the reader announced, when it knows.
    total_records: Option<u64>,
    system_properties: BTreeMap<String, String>,
}

impl JobReport {
    pub(crate) fn new(parameters: JobParameters) -> Self {
        Self {
            parameters,
            metrics: JobMetrics::default(),
            status: JobStatus::Starting,
            last_error: None,
            total_records: None,
            system_properties: system_properties(),
        }
    }

    pub fn job_name(&self) -> &str {
        self.parameters.name()
    }

    pub fn parameters(&self) -> &JobParameters {
        &self.parameters
    }

    pub fn metrics(&self) -> &JobMetrics {
        &self.metrics
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Rendered cause chain of the most recent error, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn total_records(&self) -> Option<u64> {
        self.total_records
    }

    pub fn system_properties(&self) -> &BTreeMap<String, String> {
        &self.system_properties
    }

    /// Append (or overwrite) a named custom metric.
    pub fn add_custom_metric(&mut self, name: impl Into<String>, value: f64) {
        self.metrics.add_custom_metric(name, value);
    }

    /// `"<filtered> (<pct>%)"` relative to the records pulled.
    pub fn formatted_filter_count(&self) -> String {
        format_count(self.metrics.filter_count(), self.metrics.pulled_count())
    }

    pub fn formatted_error_count(&self) -> String {
        format_count(self.metrics.error_count(), self.metrics.pulled_count())
    }

    pub fn formatted_write_count(&self) -> String {
        format_count(self.metrics.write_count(), self.metrics.pulled_count())
    }

    pub fn formatted_read_count(&self) -> String {
        format_count(self.metrics.read_count(), self.metrics.pulled_count())
    }

    /// `"<pulled>/<total> (<pct>%)"`, `"N/A"` when the total is unknown.
    pub fn formatted_progress(&self) -> String {
        format_progress(self.metrics.pulled_count(), self.total_records)
    }

    pub fn formatted_start_time(&self) -> String {
        self.metrics
            .start_time()
            .map(format_time)
            .unwrap_or_else(|| NOT_APPLICABLE.to_string())
    }

    pub fn formatted_end_time(&self) -> String {
        self.metrics
            .end_time()
            .map(format_time)
            .unwrap_or_else(|| NOT_APPLICABLE.to_string())
    }

    pub fn formatted_duration(&self) -> String {
        self.metrics
            .duration()
            .map(format_duration)
            .unwrap_or_else(|| NOT_APPLICABLE.to_string())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Consolidate the reports of partial runs (one per worker, say) into one.
    ///
    /// Counts are summed and the time span covers every partial. The status is
    /// `FAILED` if any partial failed, `COMPLETED` otherwise. Data sources are
    /// joined one per line. The merged report takes the first report's
    /// parameters under a fresh execution id. `None` when there is nothing to
    /// merge.
    pub fn merge<'a>(reports: impl IntoIterator<Item = &'a JobReport>) -> Option<JobReport> {
        let mut reports = reports.into_iter();
        let first = reports.next()?;

        let mut merged = JobReport::new(first.parameters.clone());
        merged.parameters.set_execution_id(ExecutionId::new());
        merged.status = JobStatus::Completed;
        let mut data_sources = Vec::new();
        let mut total_records = None;

        for report in std::iter::once(first).chain(reports) {
            merged.metrics.absorb(&report.metrics);
            if report.status == JobStatus::Failed {
                merged.status = JobStatus::Failed;
            }
            if let Some(error) = &report.last_error {
                merged.last_error = Some(error.clone());
            }
            if let Some(total) = report.total_records {
                total_records = Some(total_records.unwrap_or(0) + total);
            }
            data_sources.extend(report.parameters.data_source());
        }

        let data_source = (!data_sources.is_empty()).then(|| data_sources.join("\n"));
        merged.parameters.set_data_source(data_source);
        merged.total_records = total_records;
        Some(merged)
    }

    pub(crate) fn metrics_mut(&mut self) -> &mut JobMetrics {
        &mut self.metrics
    }

    pub(crate) fn set_status(&mut self, status: JobStatus) {
        self.status = status;
    }

    pub(crate) fn set_last_error(&mut self, error: String) {
        self.last_error = Some(error);
    }

    pub(crate) fn set_total_records(&mut self, total: Option<u64>) {
        self.total_records = total;
    }

    /// Forget the previous run's outcome, keeping parameters and environment.
    pub(crate) fn reset(&mut self) {
        self.metrics = JobMetrics::default();
        self.status = JobStatus::Starting;
        self.last_error = None;
        self.total_records = None;
    }
}

impl fmt::Display for JobReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params = &self.parameters;
        let metrics = &self.metrics;

        writeln!(f, "Job Report:")?;
        writeln!(f, "===========")?;
        writeln!(f, "Name: {}", params.name())?;
        writeln!(f, "Status: {}", self.status)?;
        writeln!(f, "Parameters:")?;
        writeln!(f, "\tExecution id = {}", params.execution_id())?;
        writeln!(
            f,
            "\tData source = {}",
            params.data_source().unwrap_or(NOT_APPLICABLE)
        )?;
        writeln!(f, "\tBatch size = {}", params.batch_size())?;
        writeln!(
            f,
            "\tError threshold = {}",
            format_error_threshold(params.error_threshold())
        )?;
        writeln!(f, "\tMonitoring = {}", params.monitoring_enabled())?;
        writeln!(f, "\tBatch scanning = {}", params.batch_scanning())?;
        writeln!(f, "Metrics:")?;
        writeln!(f, "\tStart time = {}", self.formatted_start_time())?;
        writeln!(f, "\tEnd time = {}", self.formatted_end_time())?;
        writeln!(f, "\tDuration = {}", self.formatted_duration())?;
        writeln!(f, "\tRead count = {}", metrics.read_count())?;
        writeln!(f, "\tWrite count = {}", metrics.write_count())?;
        writeln!(f, "\tFilter count = {}", metrics.filter_count())?;
        write!(f, "\tError count = {}", metrics.error_count())?;
        for (name, value) in metrics.custom_metrics() {
            write!(f, "\n\t{name} = {value}")?;
        }
        if let Some(error) = &self.last_error {
            write!(f, "\nLast error: {error}")?;
        }
        Ok(())
    }
}

fn system_properties() -> BTreeMap<String, String> {
    let mut props = BTreeMap::new();
    props.insert("os".to_string(), std::env::consts::OS.to_string());
    props.insert("arch".to_string(), std::env::consts::ARCH.to_string());
    props.insert("family".to_string(), std::env::consts::FAMILY.to_string());
    props.insert("pid".to_string(), std::process::id().to_string());
    props.insert(
        "forgebatch.version".to_string(),
        env!("CARGO_PKG_VERSION").to_string(),
    );
    if let Ok(dir) = std::env::current_dir() {
        props.insert("current_dir".to_string(), dir.display().to_string());
    }
    props
}
