use forgebatch_core::{ConfigError, ConfigResult, ExecutionId};
use serde::{Deserialize, Serialize};

/// Records per batch when nothing else is configured.
pub const DEFAULT_BATCH_SIZE: usize = 100;

pub const DEFAULT_JOB_NAME: &str = "job";

pub const ENV_BATCH_SIZE: &str = "FORGEBATCH_BATCH_SIZE";
pub const ENV_ERROR_THRESHOLD: &str = "FORGEBATCH_ERROR_THRESHOLD";
pub const ENV_RECORD_LIMIT: &str = "FORGEBATCH_RECORD_LIMIT";
pub const ENV_MONITORING: &str = "FORGEBATCH_MONITORING";
pub const ENV_BATCH_SCANNING: &str = "FORGEBATCH_BATCH_SCANNING";

/// Settings of one job run. Immutable once the job is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobParameters {
    name: String,
    execution_id: ExecutionId,
    batch_size: usize,
    /// `None` means unlimited.
    error_threshold: Option<u64>,
    /// `None` means read until the source is exhausted.
    record_limit: Option<u64>,
    monitoring_enabled: bool,
    batch_scanning: bool,
    data_source: Option<String>,
}

impl Default for JobParameters {
    fn default() -> Self {
        Self {
            name: DEFAULT_JOB_NAME.to_string(),
            execution_id: ExecutionId::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            error_threshold: None,
            record_limit: None,
            monitoring_enabled: false,
            batch_scanning: false,
            data_source: None,
        }
    }
}

impl JobParameters {
    pub fn new(name: impl Into<String>) -> Self {
        Self::default().with_name(name)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_execution_id(mut self, execution_id: ExecutionId) -> Self {
        self.execution_id = execution_id;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_error_threshold(mut self, threshold: u64) -> Self {
        self.error_threshold = Some(threshold);
        self
    }

    pub fn with_record_limit(mut self, limit: u64) -> Self {
        self.record_limit = Some(limit);
        self
    }

    pub fn with_monitoring(mut self, enabled: bool) -> Self {
        self.monitoring_enabled = enabled;
        self
    }

    pub fn with_batch_scanning(mut self, enabled: bool) -> Self {
        self.batch_scanning = enabled;
        self
    }

    pub fn with_data_source(mut self, data_source: impl Into<String>) -> Self {
        self.data_source = Some(data_source.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn error_threshold(&self) -> Option<u64> {
        self.error_threshold
    }

    pub fn record_limit(&self) -> Option<u64> {
        self.record_limit
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring_enabled
    }

    pub fn batch_scanning(&self) -> bool {
        self.batch_scanning
    }

    pub fn data_source(&self) -> Option<&str> {
        self.data_source.as_deref()
    }

    /// Reject values a job cannot run with.
    pub(crate) fn set_execution_id(&mut self, execution_id: ExecutionId) {
        self.execution_id = execution_id;
    }

    pub(crate) fn set_data_source(&mut self, data_source: Option<String>) {
        self.data_source = data_source;
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.batch_size < 1 {
            return Err(ConfigError::invalid_argument("batch size must be >= 1"));
        }
        if self.name.trim().is_empty() {
            return Err(ConfigError::invalid_argument("job name must not be blank"));
        }
        Ok(())
    }

    /// Override settings from `FORGEBATCH_*` environment variables.
    pub fn apply_env(self) -> ConfigResult<Self> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Override settings from the variables `lookup` returns. Unset keys keep the
    /// current value; set but unparsable keys are an error.
    pub fn apply_env_with(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> ConfigResult<Self> {
        if let Some(size) = parse_env(&lookup, ENV_BATCH_SIZE)? {
            self.batch_size = size;
        }
        if let Some(threshold) = parse_env(&lookup, ENV_ERROR_THRESHOLD)? {
            self.error_threshold = Some(threshold);
        }
        if let Some(limit) = parse_env(&lookup, ENV_RECORD_LIMIT)? {
            self.record_limit = Some(limit);
        }
        if let Some(enabled) = parse_env(&lookup, ENV_MONITORING)? {
            self.monitoring_enabled = enabled;
        }
        if let Some(enabled) = parse_env(&lookup, ENV_BATCH_SCANNING)? {
            self.batch_scanning = enabled;
        }
        self.validate()?;
        Ok(self)
    }
}

fn parse_env<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> ConfigResult<Option<T>> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::invalid_env(key, raw)),
    }
}
