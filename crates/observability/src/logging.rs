//! Tracing/logging initialization.
//!
//! Filtering follows `RUST_LOG` and defaults to `info`.

use std::str::FromStr;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub const ENV_LOG_FORMAT: &str = "FORGEBATCH_LOG_FORMAT";

/// Output format of the process subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event, for collectors.
    #[default]
    Json,
    /// Multi-line human output.
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogFormatError {
    #[error("unknown log format: {0} (expected json or pretty)")]
    Unknown(String),
}

impl LogFormat {
    /// `FORGEBATCH_LOG_FORMAT` when set and valid, JSON otherwise.
    pub fn from_env() -> Self {
        std::env::var(ENV_LOG_FORMAT)
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default()
    }
}

impl FromStr for LogFormat {
    type Err = LogFormatError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(LogFormatError::Unknown(raw.trim().to_string())),
        }
    }
}

/// Initialize JSON logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    init_with(LogFormat::Json);
}

/// Initialize logging with the given format. Later calls are no-ops.
pub fn init_with(format: LogFormat) {
    let _ = try_init(format);
}

/// Install the process subscriber, failing if one is already set.
pub fn try_init(format: LogFormat) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_timer(tracing_subscriber::fmt::time::SystemTime)
            .with_target(false)
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .pretty()
            .with_thread_names(true)
            .try_init(),
    }
}
