//! Reconciler error types.

use std::time::Duration;

use thiserror::Error;

use crate::platform::PlatformError;

/// Errors raised by reconcile loops and the supervisor.
///
/// Inside a loop every variant is recovered locally by deferring to the
/// next cycle; only supervisor calls hand them back to a caller.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("no metric samples available for {0}")]
    MetricsUnavailable(String),

    #[error("platform rejected command for {workload}: {source}")]
    PlatformRejected {
        workload: String,
        #[source]
        source: PlatformError,
    },

    #[error("command for {workload} timed out after {timeout:?}")]
    CommandTimeout { workload: String, timeout: Duration },

    #[error("unknown workload: {0}")]
    UnknownWorkload(String),

    #[error("workload already running: {0}")]
    AlreadyRunning(String),

    #[error("rollout already in progress for {0}")]
    RolloutInProgress(String),

    #[error("no rollout for {0}")]
    NoRollout(String),

    #[error("reconciler for {0} has stopped")]
    Stopped(String),
}

pub type ControllerResult<T> = Result<T, ControllerError>;
