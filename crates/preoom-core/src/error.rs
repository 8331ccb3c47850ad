//! Error types for supervisor configuration

use thiserror::Error;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Reasons a [`Config`](crate::Config) is rejected
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// No command to supervise
    #[error("a command to run is required")]
    EmptyCommand,

    /// Threshold percentage outside the open interval (0, 100)
    #[error("threshold percentage must be between 0 and 100 (exclusive), got {0}")]
    PercentOutOfRange(f64),

    /// Threshold percentage could not be parsed
    #[error("invalid threshold percentage {0:?}")]
    InvalidPercent(String),

    /// Polling cadence of zero would spin
    #[error("poll interval must be > 0")]
    ZeroPollInterval,

    /// A hook was configured with an empty shell line
    #[error("{0} hook must not be empty")]
    EmptyHook(&'static str),
}
