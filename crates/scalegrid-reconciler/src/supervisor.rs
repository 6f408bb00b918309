//! Supervisor — owns one reconcile loop per managed workload.
//!
//! Each loop runs as its own task with a shutdown signal and a command
//! channel. Status queries read the latest published snapshot and never
//! wait on a running cycle.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use scalegrid_core::{ControllerSettings, ReplicaStatus, WorkloadSpec};

use crate::error::{ControllerError, ControllerResult};
use crate::platform::WorkloadPlatform;
use crate::reconciler::{Command, Reconciler};

const COMMAND_BUFFER: usize = 16;

/// Per-workload loop state.
struct ReconcilerSlot {
    handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<ReplicaStatus>,
}

/// Runs and tracks the reconcile loops of all managed workloads.
pub struct Supervisor {
    platform: Arc<dyn WorkloadPlatform>,
    settings: ControllerSettings,
    /// Active loops: workload_id → slot.
    slots: RwLock<HashMap<String, ReconcilerSlot>>,
}

impl Supervisor {
    pub fn new(platform: Arc<dyn WorkloadPlatform>, settings: ControllerSettings) -> Self {
        Self {
            platform,
            settings,
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// Start a reconcile loop for `spec`.
    pub async fn spawn(&self, spec: WorkloadSpec) -> ControllerResult<()> {
        let mut slots = self.slots.write().await;
        if slots.contains_key(&spec.id) {
            return Err(ControllerError::AlreadyRunning(spec.id));
        }

        let workload_id = spec.id.clone();
        let reconciler = Reconciler::new(spec, self.settings.clone(), self.platform.clone());
        let status = reconciler.subscribe();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (commands, commands_rx) = mpsc::channel(COMMAND_BUFFER);

        let handle = tokio::spawn(reconciler.run(commands_rx, shutdown_rx));
        slots.insert(
            workload_id.clone(),
            ReconcilerSlot {
                handle,
                shutdown_tx,
                commands,
                status,
            },
        );

        info!(workload = %workload_id, "reconcile loop spawned");
        Ok(())
    }

    /// Latest status snapshot for one workload.
    pub async fn status(&self, workload_id: &str) -> ControllerResult<ReplicaStatus> {
        let slots = self.slots.read().await;
        let slot = slots
            .get(workload_id)
            .ok_or_else(|| ControllerError::UnknownWorkload(workload_id.to_string()))?;
        let status = slot.status.borrow().clone();
        Ok(status)
    }

    /// Status snapshots of every workload, ordered by workload id.
    pub async fn statuses(&self) -> Vec<ReplicaStatus> {
        let slots = self.slots.read().await;
        let mut statuses: Vec<ReplicaStatus> =
            slots.values().map(|s| s.status.borrow().clone()).collect();
        statuses.sort_by(|a, b| a.workload_id().cmp(b.workload_id()));
        statuses
    }

    pub async fn workload_ids(&self) -> Vec<String> {
        let slots = self.slots.read().await;
        let mut ids: Vec<String> = slots.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn start_rollout(&self, workload_id: &str, revision: &str) -> ControllerResult<()> {
        let revision = revision.to_string();
        self.request(workload_id, |reply| Command::StartRollout { revision, reply })
            .await
    }

    pub async fn pause_rollout(&self, workload_id: &str) -> ControllerResult<()> {
        self.request(workload_id, |reply| Command::PauseRollout { reply })
            .await
    }

    pub async fn resume_rollout(&self, workload_id: &str) -> ControllerResult<()> {
        self.request(workload_id, |reply| Command::ResumeRollout { reply })
            .await
    }

    /// Send a command to a loop and wait for its answer.
    ///
    /// The loop answers between cycles, so this may wait for one cycle
    /// to finish.
    async fn request(
        &self,
        workload_id: &str,
        build: impl FnOnce(oneshot::Sender<ControllerResult<()>>) -> Command,
    ) -> ControllerResult<()> {
        let commands = {
            let slots = self.slots.read().await;
            slots
                .get(workload_id)
                .map(|s| s.commands.clone())
                .ok_or_else(|| ControllerError::UnknownWorkload(workload_id.to_string()))?
        };

        let stopped = || ControllerError::Stopped(workload_id.to_string());
        let (reply, answer) = oneshot::channel();
        commands.send(build(reply)).await.map_err(|_| stopped())?;
        answer.await.map_err(|_| stopped())?
    }

    /// Stop one loop. A cycle already running finishes first.
    pub async fn teardown(&self, workload_id: &str) -> ControllerResult<()> {
        let slot = self
            .slots
            .write()
            .await
            .remove(workload_id)
            .ok_or_else(|| ControllerError::UnknownWorkload(workload_id.to_string()))?;

        let _ = slot.shutdown_tx.send(true);
        if let Err(e) = slot.handle.await {
            warn!(workload = %workload_id, error = %e, "reconcile task ended abnormally");
        }
        info!(workload = %workload_id, "reconcile loop torn down");
        Ok(())
    }

    /// Stop every loop (for graceful shutdown).
    pub async fn shutdown_all(&self) {
        let drained: Vec<(String, ReconcilerSlot)> = self.slots.write().await.drain().collect();

        for (_, slot) in &drained {
            let _ = slot.shutdown_tx.send(true);
        }
        for (id, slot) in drained {
            if let Err(e) = slot.handle.await {
                warn!(workload = %id, error = %e, "reconcile task ended abnormally");
            }
            debug!(workload = %id, "reconcile loop stopped");
        }
        info!("all reconcile loops stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use scalegrid_core::*;

    use crate::sim::SimulatedPlatform;

    fn settings() -> ControllerSettings {
        ControllerSettings {
            cycle: Duration::from_millis(20),
            command_timeout: Duration::from_millis(200),
            stabilization_window: Duration::from_secs(300),
            listen: None,
        }
    }

    fn spec(id: &str) -> WorkloadSpec {
        WorkloadSpec {
            id: id.to_string(),
            bounds: ReplicaBounds::new(1, 10).unwrap(),
            targets: ScalingTargets {
                cpu: Some(0.70),
                memory: None,
                tolerance: 0.1,
            },
            budget: DisruptionBudget::min_available(1),
            rollout_batch_size: 1,
            simulation: None,
        }
    }

    async fn supervisor(ids: &[&str]) -> (Supervisor, Arc<SimulatedPlatform>) {
        let sim = Arc::new(SimulatedPlatform::new());
        for id in ids {
            sim.add_workload(id, 2).await;
            sim.set_demand(id, ResourceKind::Cpu, 1.4).await;
        }
        let supervisor = Supervisor::new(sim.clone(), settings());
        for id in ids {
            supervisor.spawn(spec(id)).await.unwrap();
        }
        (supervisor, sim)
    }

    async fn wait_for_cycle(supervisor: &Supervisor, id: &str) {
        for _ in 0..100 {
            if supervisor.status(id).await.unwrap().cycles > 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("no cycle completed for {id}");
    }

    #[tokio::test]
    async fn spawn_and_query_status() {
        let (supervisor, _sim) = supervisor(&["b", "a"]).await;
        wait_for_cycle(&supervisor, "a").await;
        wait_for_cycle(&supervisor, "b").await;

        let statuses = supervisor.statuses().await;
        let ids: Vec<&str> = statuses.iter().map(|s| s.workload_id()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(statuses[0].replica_set.current_count, 2);
        assert_eq!(statuses[0].phase, ReconcilePhase::Stable);

        supervisor.shutdown_all().await;
        assert!(supervisor.workload_ids().await.is_empty());
    }

    #[tokio::test]
    async fn duplicate_spawn_rejected() {
        let (supervisor, _sim) = supervisor(&["api"]).await;
        assert!(matches!(
            supervisor.spawn(spec("api")).await,
            Err(ControllerError::AlreadyRunning(_))
        ));
        supervisor.shutdown_all().await;
    }

    #[tokio::test]
    async fn unknown_workload_errors() {
        let (supervisor, _sim) = supervisor(&[]).await;
        assert!(matches!(
            supervisor.status("nope").await,
            Err(ControllerError::UnknownWorkload(_))
        ));
        assert!(matches!(
            supervisor.start_rollout("nope", "v2").await,
            Err(ControllerError::UnknownWorkload(_))
        ));
        assert!(matches!(
            supervisor.teardown("nope").await,
            Err(ControllerError::UnknownWorkload(_))
        ));
    }

    #[tokio::test]
    async fn rollout_commands_reach_loop() {
        let (supervisor, _sim) = supervisor(&["api"]).await;
        wait_for_cycle(&supervisor, "api").await;

        assert!(matches!(
            supervisor.resume_rollout("api").await,
            Err(ControllerError::NoRollout(_))
        ));
        supervisor.start_rollout("api", "v2").await.unwrap();
        let rollout = supervisor.status("api").await.unwrap().rollout.unwrap();
        assert_eq!(rollout.revision, "v2");

        supervisor.shutdown_all().await;
    }

    #[tokio::test]
    async fn teardown_removes_loop() {
        let (supervisor, _sim) = supervisor(&["a", "b"]).await;
        supervisor.teardown("a").await.unwrap();
        assert_eq!(supervisor.workload_ids().await, vec!["b".to_string()]);
        supervisor.shutdown_all().await;
    }
}
