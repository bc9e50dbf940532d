//! Process-wide logging setup shared by batch launchers.

pub mod logging;

pub use logging::{ENV_LOG_FORMAT, LogFormat, LogFormatError, init, init_with, try_init};
