//! Workload platform interface.
//!
//! The reconciler only talks to the outside world through this trait.
//! Provisioning, networking, and credentials stay behind it.

use async_trait::async_trait;
use thiserror::Error;

use scalegrid_core::MetricSample;

/// Errors reported by a workload platform.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PlatformError {
    #[error("workload not found: {0}")]
    UnknownWorkload(String),

    #[error("capacity exhausted: requested {requested} replicas, capacity {capacity}")]
    CapacityExhausted { requested: u32, capacity: u32 },

    #[error("command rejected: {0}")]
    Rejected(String),

    #[error("platform unavailable: {0}")]
    Unavailable(String),
}

pub type PlatformResult<T> = Result<T, PlatformError>;

/// The declarative workload API the controller drives.
#[async_trait]
pub trait WorkloadPlatform: Send + Sync {
    /// Replicas currently running.
    async fn get_current_replica_count(&self, workload_id: &str) -> PlatformResult<u32>;

    /// Ask the platform to run exactly `count` replicas.
    async fn set_replica_count(&self, workload_id: &str, count: u32) -> PlatformResult<()>;

    /// Latest utilization samples, one or more per replica.
    async fn get_metric_samples(&self, workload_id: &str) -> PlatformResult<Vec<MetricSample>>;

    /// Replace up to `count` replicas not yet on `revision` with new ones.
    ///
    /// Returns how many replicas were actually replaced; fewer than
    /// `count` means no outdated replicas remain.
    async fn replace_replicas(
        &self,
        workload_id: &str,
        revision: &str,
        count: u32,
    ) -> PlatformResult<u32>;
}
