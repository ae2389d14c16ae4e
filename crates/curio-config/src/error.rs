//! Error types for config loading.

use thiserror::Error;

/// Errors returned when loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Config file could not be parsed.
    #[error("parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    /// Config carried a value outside its allowed range.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// Dotted path of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}
