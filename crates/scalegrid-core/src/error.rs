//! Configuration error types.

use thiserror::Error;

/// Result type alias for configuration loading and validation.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors detected while loading the controller configuration.
///
/// All of these are fatal at load time; none can occur once the
/// reconcile loops are running.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid replica bounds: min {min} > max {max}")]
    InvalidBounds { min: u32, max: u32 },

    #[error("workload {workload}: {message}")]
    InvalidTarget { workload: String, message: String },

    #[error("invalid duration {value:?} for {field}")]
    InvalidDuration { field: String, value: String },

    #[error("invalid listen address: {0}")]
    InvalidListen(String),

    #[error("duplicate workload id: {0}")]
    DuplicateWorkload(String),

    #[error("invalid workload id {0:?}: must be non-empty and must not contain '/'")]
    InvalidWorkloadId(String),

    #[error("no workloads configured")]
    NoWorkloads,

    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}
