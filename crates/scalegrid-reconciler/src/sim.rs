//! Simulated platform — an in-memory `WorkloadPlatform`.
//!
//! Utilization is derived from a demand expressed in replica units:
//! every replica reports `demand / replicas`. Scale commands can be
//! capped by a capacity ceiling, delayed by an observation lag, or
//! rejected on purpose to exercise the retry path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use scalegrid_core::{epoch_millis, MetricSample, ResourceKind, SimulationSpec};

use crate::platform::{PlatformError, PlatformResult, WorkloadPlatform};

const INITIAL_REVISION: &str = "initial";

#[derive(Debug, Clone)]
struct SimReplica {
    id: String,
    revision: String,
}

#[derive(Debug)]
struct SimWorkload {
    replicas: Vec<SimReplica>,
    revision: String,
    cpu_demand: f64,
    memory_demand: f64,
    capacity: Option<u32>,
    metrics_available: bool,
    /// Commands still to reject.
    failures: u32,
    /// Count observations before a command takes effect.
    observation_lag: u32,
    pending: Option<(u32, u32)>,
    next_id: u64,
}

impl SimWorkload {
    fn new(initial_replicas: u32) -> Self {
        let mut workload = Self {
            replicas: Vec::new(),
            revision: INITIAL_REVISION.to_string(),
            cpu_demand: 0.0,
            memory_demand: 0.0,
            capacity: None,
            metrics_available: true,
            failures: 0,
            observation_lag: 0,
            pending: None,
            next_id: 0,
        };
        workload.resize(initial_replicas);
        workload
    }

    fn new_replica(&mut self) -> SimReplica {
        let id = format!("replica-{}", self.next_id);
        self.next_id += 1;
        SimReplica {
            id,
            revision: self.revision.clone(),
        }
    }

    fn resize(&mut self, count: u32) {
        let count = count as usize;
        while self.replicas.len() < count {
            let replica = self.new_replica();
            self.replicas.push(replica);
        }
        if self.replicas.len() > count {
            // Oldest replicas go first.
            let excess = self.replicas.len() - count;
            self.replicas.drain(..excess);
        }
    }

    fn utilization(&self, kind: ResourceKind) -> f64 {
        let demand = match kind {
            ResourceKind::Cpu => self.cpu_demand,
            ResourceKind::Memory => self.memory_demand,
        };
        demand / self.replicas.len() as f64
    }
}

/// In-memory platform used by the daemon's simulation mode and in tests.
#[derive(Debug, Default)]
pub struct SimulatedPlatform {
    workloads: Mutex<HashMap<String, SimWorkload>>,
    /// Fixed sample clock in epoch millis; 0 means wall clock.
    clock: AtomicU64,
}

impl SimulatedPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a workload with `initial_replicas` running.
    pub async fn add_workload(&self, workload_id: &str, initial_replicas: u32) {
        let mut workloads = self.workloads.lock().await;
        workloads.insert(workload_id.to_string(), SimWorkload::new(initial_replicas));
        debug!(workload = %workload_id, initial_replicas, "simulated workload added");
    }

    /// Register a workload from its configured load profile.
    pub async fn add_from_spec(&self, workload_id: &str, spec: &SimulationSpec) {
        self.add_workload(workload_id, spec.initial_replicas).await;
        let mut workloads = self.workloads.lock().await;
        if let Some(w) = workloads.get_mut(workload_id) {
            w.cpu_demand = spec.cpu_demand;
            w.memory_demand = spec.memory_demand;
            w.capacity = spec.capacity;
        }
    }

    /// Set total demand for one resource, in replica units.
    pub async fn set_demand(&self, workload_id: &str, kind: ResourceKind, demand: f64) {
        self.with_workload(workload_id, |w| match kind {
            ResourceKind::Cpu => w.cpu_demand = demand,
            ResourceKind::Memory => w.memory_demand = demand,
        })
        .await;
    }

    pub async fn set_capacity(&self, workload_id: &str, capacity: Option<u32>) {
        self.with_workload(workload_id, |w| w.capacity = capacity).await;
    }

    pub async fn set_metrics_available(&self, workload_id: &str, available: bool) {
        self.with_workload(workload_id, |w| w.metrics_available = available)
            .await;
    }

    /// Reject the next `count` scale or replace commands.
    pub async fn fail_next_commands(&self, workload_id: &str, count: u32) {
        self.with_workload(workload_id, |w| w.failures = count).await;
    }

    /// Delay commands until the replica count was observed `lag` times.
    pub async fn set_observation_lag(&self, workload_id: &str, lag: u32) {
        self.with_workload(workload_id, |w| w.observation_lag = lag)
            .await;
    }

    /// Pin the timestamp stamped on generated samples.
    pub fn set_time(&self, millis: u64) {
        self.clock.store(millis, Ordering::Relaxed);
    }

    /// Revisions of the running replicas, oldest first.
    pub async fn replica_revisions(&self, workload_id: &str) -> Vec<String> {
        let workloads = self.workloads.lock().await;
        workloads
            .get(workload_id)
            .map(|w| w.replicas.iter().map(|r| r.revision.clone()).collect())
            .unwrap_or_default()
    }

    async fn with_workload(&self, workload_id: &str, f: impl FnOnce(&mut SimWorkload)) {
        let mut workloads = self.workloads.lock().await;
        if let Some(w) = workloads.get_mut(workload_id) {
            f(w);
        }
    }

    fn now(&self) -> u64 {
        match self.clock.load(Ordering::Relaxed) {
            0 => epoch_millis(),
            t => t,
        }
    }
}

fn unknown(workload_id: &str) -> PlatformError {
    PlatformError::UnknownWorkload(workload_id.to_string())
}

#[async_trait]
impl WorkloadPlatform for SimulatedPlatform {
    async fn get_current_replica_count(&self, workload_id: &str) -> PlatformResult<u32> {
        let mut workloads = self.workloads.lock().await;
        let w = workloads.get_mut(workload_id).ok_or_else(|| unknown(workload_id))?;

        if let Some((count, remaining)) = w.pending {
            if remaining <= 1 {
                w.pending = None;
                w.resize(count);
            } else {
                w.pending = Some((count, remaining - 1));
            }
        }

        Ok(w.replicas.len() as u32)
    }

    async fn set_replica_count(&self, workload_id: &str, count: u32) -> PlatformResult<()> {
        let mut workloads = self.workloads.lock().await;
        let w = workloads.get_mut(workload_id).ok_or_else(|| unknown(workload_id))?;

        if w.failures > 0 {
            w.failures -= 1;
            return Err(PlatformError::Rejected("injected failure".to_string()));
        }
        if let Some(capacity) = w.capacity
            && count > capacity
        {
            return Err(PlatformError::CapacityExhausted {
                requested: count,
                capacity,
            });
        }

        if w.observation_lag == 0 {
            w.resize(count);
        } else {
            w.pending = Some((count, w.observation_lag));
        }
        debug!(workload = %workload_id, count, "simulated scale command accepted");
        Ok(())
    }

    async fn get_metric_samples(&self, workload_id: &str) -> PlatformResult<Vec<MetricSample>> {
        let now = self.now();
        let workloads = self.workloads.lock().await;
        let w = workloads.get(workload_id).ok_or_else(|| unknown(workload_id))?;

        if !w.metrics_available || w.replicas.is_empty() {
            return Ok(Vec::new());
        }

        let mut samples = Vec::with_capacity(w.replicas.len() * 2);
        for replica in &w.replicas {
            for kind in ResourceKind::ALL {
                samples.push(MetricSample::new(kind, w.utilization(kind), &replica.id, now));
            }
        }
        Ok(samples)
    }

    async fn replace_replicas(
        &self,
        workload_id: &str,
        revision: &str,
        count: u32,
    ) -> PlatformResult<u32> {
        let mut workloads = self.workloads.lock().await;
        let w = workloads.get_mut(workload_id).ok_or_else(|| unknown(workload_id))?;

        if w.failures > 0 {
            w.failures -= 1;
            return Err(PlatformError::Rejected("injected failure".to_string()));
        }

        w.revision = revision.to_string();
        let mut replaced = 0;
        for i in 0..w.replicas.len() {
            if replaced == count {
                break;
            }
            if w.replicas[i].revision != revision {
                let replica = w.new_replica();
                w.replicas[i] = replica;
                replaced += 1;
            }
        }
        debug!(workload = %workload_id, %revision, replaced, "simulated replicas replaced");
        Ok(replaced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn utilization_spreads_demand() {
        let sim = SimulatedPlatform::new();
        sim.add_workload("api", 2).await;
        sim.set_demand("api", ResourceKind::Cpu, 1.9).await;

        let samples = sim.get_metric_samples("api").await.unwrap();
        assert_eq!(samples.len(), 4);
        let cpu: Vec<_> = samples
            .iter()
            .filter(|s| s.resource_kind == ResourceKind::Cpu)
            .collect();
        assert_eq!(cpu.len(), 2);
        assert!((cpu[0].utilization_ratio - 0.95).abs() < 1e-9);
    }

    #[tokio::test]
    async fn scale_changes_count() {
        let sim = SimulatedPlatform::new();
        sim.add_workload("api", 2).await;
        sim.set_replica_count("api", 5).await.unwrap();
        assert_eq!(sim.get_current_replica_count("api").await.unwrap(), 5);
        sim.set_replica_count("api", 1).await.unwrap();
        assert_eq!(sim.get_current_replica_count("api").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn capacity_rejects_scale_up() {
        let sim = SimulatedPlatform::new();
        sim.add_workload("api", 2).await;
        sim.set_capacity("api", Some(3)).await;
        let err = sim.set_replica_count("api", 4).await.unwrap_err();
        assert_eq!(
            err,
            PlatformError::CapacityExhausted {
                requested: 4,
                capacity: 3
            }
        );
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let sim = SimulatedPlatform::new();
        sim.add_workload("api", 1).await;
        sim.fail_next_commands("api", 1).await;
        assert!(sim.set_replica_count("api", 2).await.is_err());
        assert!(sim.set_replica_count("api", 2).await.is_ok());
    }

    #[tokio::test]
    async fn observation_lag_delays_commands() {
        let sim = SimulatedPlatform::new();
        sim.add_workload("api", 2).await;
        sim.set_observation_lag("api", 2).await;
        sim.set_replica_count("api", 4).await.unwrap();
        assert_eq!(sim.get_current_replica_count("api").await.unwrap(), 2);
        assert_eq!(sim.get_current_replica_count("api").await.unwrap(), 4);
    }

    #[tokio::test]
    async fn replace_only_outdated_replicas() {
        let sim = SimulatedPlatform::new();
        sim.add_workload("api", 3).await;
        assert_eq!(sim.replace_replicas("api", "v2", 2).await.unwrap(), 2);
        assert_eq!(sim.replace_replicas("api", "v2", 2).await.unwrap(), 1);
        assert_eq!(sim.replace_replicas("api", "v2", 2).await.unwrap(), 0);
        assert!(sim.replica_revisions("api").await.iter().all(|r| r == "v2"));
    }

    #[tokio::test]
    async fn unknown_workload_errors() {
        let sim = SimulatedPlatform::new();
        assert_eq!(
            sim.get_current_replica_count("nope").await.unwrap_err(),
            PlatformError::UnknownWorkload("nope".to_string())
        );
    }

    #[tokio::test]
    async fn pinned_clock_stamps_samples() {
        let sim = SimulatedPlatform::new();
        sim.add_workload("api", 1).await;
        sim.set_time(42_000);
        let samples = sim.get_metric_samples("api").await.unwrap();
        assert!(samples.iter().all(|s| s.timestamp == 42_000));
    }
}
