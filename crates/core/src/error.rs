//! Configuration error model.

use thiserror::Error;

/// Result type used when building or loading configuration values.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Invalid configuration.
///
/// Raised eagerly while parameters, policies and executors are being built, never
/// while a job is running.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A value was out of its accepted range (e.g. a batch size of zero).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An environment variable was set but could not be parsed.
    #[error("invalid value {value:?} for environment variable {key}")]
    InvalidEnv { key: String, value: String },
}

impl ConfigError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn invalid_env(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidEnv {
            key: key.into(),
            value: value.into(),
        }
    }
}
