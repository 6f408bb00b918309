//! Reconciler — the per-workload observe → decide → act loop.
//!
//! Each cycle reads the replica count and utilization samples from the
//! platform, evaluates the scaling policy, passes the proposal through the
//! stabilization window, and issues at most one command. Scale-downs and
//! rollout batches are cut to what the disruption budget allows; the rest
//! waits for later cycles.
//!
//! ```text
//! Stable ──(admitted target != current)──▶ Scaling
//! Scaling ──(command accepted)──▶ Converging
//! Converging ──(observed == target)──▶ Stable
//! Converging ──(deferred removals / new target)──▶ Scaling
//! ```

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use scalegrid_autoscale::{evaluate, StabilizationWindow};
use scalegrid_core::*;
use scalegrid_metrics::SampleWindow;
use scalegrid_rollout::{authorize_removal, BatchAction, RollingUpdate};

use crate::error::{ControllerError, ControllerResult};
use crate::platform::{PlatformError, WorkloadPlatform};

/// Requests delivered to a running loop between cycles.
#[derive(Debug)]
pub enum Command {
    StartRollout {
        revision: String,
        reply: oneshot::Sender<ControllerResult<()>>,
    },
    PauseRollout {
        reply: oneshot::Sender<ControllerResult<()>>,
    },
    ResumeRollout {
        reply: oneshot::Sender<ControllerResult<()>>,
    },
}

/// What a single cycle ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing to do this cycle.
    Idle,
    /// The replica count could not be read; nothing else was attempted.
    Unobservable,
    /// A scale command for `count` replicas was accepted.
    Scaled { count: u32 },
    /// Every requested removal was deferred by the disruption budget.
    RemovalsDeferred,
    /// A command failed and will be retried next cycle.
    CommandFailed,
    /// A rollout batch replaced `count` replicas.
    RolloutBatch { count: u32 },
    /// The disruption budget blocked the next rollout batch.
    RolloutBlocked,
}

/// Drives one replica set towards its desired count.
pub struct Reconciler {
    spec: WorkloadSpec,
    settings: ControllerSettings,
    platform: Arc<dyn WorkloadPlatform>,
    stabilizer: StabilizationWindow,
    samples: SampleWindow,
    /// Raw policy proposals within the stabilization horizon.
    history: Vec<ScalingDecision>,
    status: ReplicaStatus,
    /// Count sent with the last accepted scale command.
    commanded: Option<u32>,
    /// The last scale command failed; retry the same target.
    retrying: bool,
    observed: bool,
    rollout: Option<RollingUpdate>,
    status_tx: watch::Sender<ReplicaStatus>,
}

impl Reconciler {
    pub fn new(
        spec: WorkloadSpec,
        settings: ControllerSettings,
        platform: Arc<dyn WorkloadPlatform>,
    ) -> Self {
        let status = ReplicaStatus::new(ReplicaSet::new(&spec.id, 0, spec.bounds));
        let (status_tx, _) = watch::channel(status.clone());
        Self {
            stabilizer: StabilizationWindow::new(settings.stabilization_window),
            samples: SampleWindow::new(settings.stabilization_window),
            history: Vec::new(),
            status,
            commanded: None,
            retrying: false,
            observed: false,
            rollout: None,
            status_tx,
            spec,
            settings,
            platform,
        }
    }

    /// Receiver for consistent status snapshots, updated after every cycle.
    pub fn subscribe(&self) -> watch::Receiver<ReplicaStatus> {
        self.status_tx.subscribe()
    }

    pub fn status(&self) -> &ReplicaStatus {
        &self.status
    }

    pub fn workload_id(&self) -> &str {
        &self.spec.id
    }

    /// Run the loop until `shutdown` fires.
    ///
    /// Shutdown and commands are only observed between cycles, so a cycle
    /// that has started always runs to completion.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(
            workload = %self.spec.id,
            cycle_ms = self.settings.cycle.as_millis() as u64,
            min = self.spec.bounds.min(),
            max = self.spec.bounds.max(),
            "reconciler started"
        );

        let mut ticker = tokio::time::interval(self.settings.cycle);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    break;
                }
                // The first tick is immediate, so commands always see an
                // observed replica set.
                _ = ticker.tick() => {
                    self.reconcile_once(epoch_millis()).await;
                }
                Some(command) = commands.recv() => {
                    self.handle_command(command);
                }
            }
        }

        info!(workload = %self.spec.id, cycles = self.status.cycles, "reconciler stopped");
    }

    /// Run exactly one cycle at time `now` (epoch millis).
    pub async fn reconcile_once(&mut self, now: u64) -> CycleOutcome {
        self.status.cycles += 1;
        let outcome = self.run_cycle(now).await;
        self.status.updated_at = now;
        self.publish();
        debug!(workload = %self.spec.id, ?outcome, phase = %self.status.phase, "cycle finished");
        outcome
    }

    async fn run_cycle(&mut self, now: u64) -> CycleOutcome {
        // ── Observe ────────────────────────────────────────────
        let current = match self.platform.get_current_replica_count(&self.spec.id).await {
            Ok(count) => count,
            Err(e) => {
                warn!(workload = %self.spec.id, error = %e, "failed to read replica count");
                self.status.last_error = Some(e.to_string());
                return CycleOutcome::Unobservable;
            }
        };
        self.observe_count(current);
        let fresh = self.collect_samples(now).await;

        if self.status.phase == ReconcilePhase::Converging {
            let target = self.status.replica_set.desired_count;
            if current == target {
                info!(workload = %self.spec.id, count = current, "converged");
                self.status.phase = ReconcilePhase::Stable;
                self.commanded = None;
                self.status.replica_set.in_flight_removals = 0;
            } else if self.commanded == Some(current) {
                // The platform did what we asked; deferred removals remain.
                self.status.phase = ReconcilePhase::Scaling;
            }
        }

        // ── Decide ─────────────────────────────────────────────
        if !fresh {
            let reason = ControllerError::MetricsUnavailable(self.spec.id.clone());
            debug!(workload = %self.spec.id, %reason, "deferring scaling decision");
        } else {
            let raw = evaluate(
                current,
                &self.samples.samples(),
                &self.spec.targets,
                &self.spec.bounds,
                now,
            );
            let admitted = self.stabilizer.admit(raw.clone(), &self.history);
            self.history.push(raw);
            self.stabilizer.prune(&mut self.history, now);
            self.apply_decision(admitted, current);
        }

        // ── Act ────────────────────────────────────────────────
        match self.status.phase {
            ReconcilePhase::Scaling => self.issue_scale(current).await,
            ReconcilePhase::Stable => self.advance_rollout().await,
            ReconcilePhase::Converging => CycleOutcome::Idle,
        }
    }

    fn observe_count(&mut self, current: u32) {
        let rs = &mut self.status.replica_set;
        rs.current_count = current;
        rs.in_flight_removals = match self.commanded {
            Some(commanded) => current.saturating_sub(commanded),
            None => 0,
        };
        if !self.observed {
            self.observed = true;
            rs.desired_count = current;
            debug!(workload = %self.spec.id, current, "initial replica count observed");
        }
    }

    /// Record this cycle's samples. Returns false when the platform
    /// reported none, in which case no decision may be made.
    ///
    /// Only `(replica, kind)` pairs reported this cycle stay in the window,
    /// so a replica that stopped reporting no longer feeds the average.
    async fn collect_samples(&mut self, now: u64) -> bool {
        let fresh = match self.platform.get_metric_samples(&self.spec.id).await {
            Ok(samples) if !samples.is_empty() => {
                self.samples.retain_reported(&samples);
                self.samples.record(samples);
                true
            }
            Ok(_) => false,
            Err(e) => {
                warn!(workload = %self.spec.id, error = %e, "failed to read metric samples");
                false
            }
        };
        self.samples.prune(now);
        fresh
    }

    fn apply_decision(&mut self, decision: ScalingDecision, current: u32) {
        let target = decision.target_count;
        let reason = decision.reason;
        self.status.last_decision = Some(decision);

        if self.retrying {
            debug!(
                workload = %self.spec.id,
                proposed = target,
                target = self.status.replica_set.desired_count,
                "retry pending; keeping previous target"
            );
            return;
        }

        let changed = target != self.status.replica_set.desired_count;
        self.status.replica_set.desired_count = target;

        if target == current {
            if self.status.phase != ReconcilePhase::Stable {
                info!(
                    workload = %self.spec.id,
                    count = current,
                    %reason,
                    "target matches current count"
                );
            }
            self.status.phase = ReconcilePhase::Stable;
            self.commanded = None;
        } else if self.status.phase == ReconcilePhase::Stable || changed {
            info!(
                workload = %self.spec.id,
                from = current,
                to = target,
                %reason,
                "scaling"
            );
            self.status.phase = ReconcilePhase::Scaling;
        }
    }

    async fn issue_scale(&mut self, current: u32) -> CycleOutcome {
        let target = self.status.replica_set.desired_count;
        let in_flight = self.status.replica_set.in_flight_removals;
        let effective = current.saturating_sub(in_flight);

        let next = if target >= effective {
            target
        } else {
            let requested = effective - target;
            let authorized =
                authorize_removal(&self.status.replica_set, requested, &self.spec.budget);
            if authorized == 0 {
                info!(
                    workload = %self.spec.id,
                    current,
                    target,
                    min_available = self.spec.budget.min_available,
                    "scale-down deferred by disruption budget"
                );
                return CycleOutcome::RemovalsDeferred;
            }
            if authorized < requested {
                info!(
                    workload = %self.spec.id,
                    authorized,
                    deferred = requested - authorized,
                    "scale-down partially deferred by disruption budget"
                );
            }
            effective - authorized
        };

        let timeout = self.settings.command_timeout;
        let result = tokio::time::timeout(
            timeout,
            self.platform.set_replica_count(&self.spec.id, next),
        )
        .await;

        match result {
            Ok(Ok(())) => {
                info!(
                    workload = %self.spec.id,
                    from = current,
                    to = next,
                    target,
                    "scale command issued"
                );
                self.commanded = Some(next);
                self.status.replica_set.in_flight_removals = current.saturating_sub(next);
                self.status.phase = ReconcilePhase::Converging;
                self.status.last_error = None;
                self.retrying = false;
                CycleOutcome::Scaled { count: next }
            }
            Ok(Err(source)) => {
                self.retrying = true;
                self.record_failure(self.rejected(source));
                CycleOutcome::CommandFailed
            }
            Err(_) => {
                self.retrying = true;
                self.record_failure(ControllerError::CommandTimeout {
                    workload: self.spec.id.clone(),
                    timeout,
                });
                CycleOutcome::CommandFailed
            }
        }
    }

    async fn advance_rollout(&mut self) -> CycleOutcome {
        let Some(rollout) = self.rollout.as_mut() else {
            return CycleOutcome::Idle;
        };
        let action = rollout.advance(&self.status.replica_set, &self.spec.budget);
        let revision = rollout.revision.clone();

        let outcome = match action {
            None => CycleOutcome::Idle,
            Some(BatchAction::Blocked) => CycleOutcome::RolloutBlocked,
            Some(BatchAction::Replace { count }) => {
                let timeout = self.settings.command_timeout;
                let result = tokio::time::timeout(
                    timeout,
                    self.platform.replace_replicas(&self.spec.id, &revision, count),
                )
                .await;

                match result {
                    Ok(Ok(replaced)) => {
                        if let Some(rollout) = self.rollout.as_mut() {
                            rollout.record_batch(count, replaced);
                        }
                        self.status.last_error = None;
                        CycleOutcome::RolloutBatch { count: replaced }
                    }
                    Ok(Err(source)) => {
                        self.record_failure(self.rejected(source));
                        CycleOutcome::CommandFailed
                    }
                    Err(_) => {
                        self.record_failure(ControllerError::CommandTimeout {
                            workload: self.spec.id.clone(),
                            timeout,
                        });
                        CycleOutcome::CommandFailed
                    }
                }
            }
        };

        self.status.rollout = self.rollout.as_ref().map(RollingUpdate::status);
        outcome
    }

    fn rejected(&self, source: PlatformError) -> ControllerError {
        ControllerError::PlatformRejected {
            workload: self.spec.id.clone(),
            source,
        }
    }

    fn record_failure(&mut self, error: ControllerError) {
        warn!(
            workload = %self.spec.id,
            target = self.status.replica_set.desired_count,
            error = %error,
            "command failed; retrying next cycle"
        );
        self.status.failed_commands += 1;
        self.status.last_error = Some(error.to_string());
    }

    /// Apply a command from the supervisor.
    pub fn handle_command(&mut self, command: Command) {
        match command {
            Command::StartRollout { revision, reply } => {
                let _ = reply.send(self.start_rollout(&revision));
            }
            Command::PauseRollout { reply } => {
                let _ = reply.send(self.with_rollout(RollingUpdate::pause));
            }
            Command::ResumeRollout { reply } => {
                let _ = reply.send(self.with_rollout(RollingUpdate::resume));
            }
        }
        self.publish();
    }

    /// Begin a rolling update of every current replica to `revision`.
    pub fn start_rollout(&mut self, revision: &str) -> ControllerResult<()> {
        if let Some(existing) = &self.rollout
            && !existing.is_completed()
        {
            return Err(ControllerError::RolloutInProgress(self.spec.id.clone()));
        }
        let mut rollout = RollingUpdate::new(&self.spec.id, revision, self.spec.rollout_batch_size);
        rollout.start(self.status.replica_set.current_count);
        self.status.rollout = Some(rollout.status());
        self.rollout = Some(rollout);
        Ok(())
    }

    fn with_rollout(&mut self, f: impl FnOnce(&mut RollingUpdate)) -> ControllerResult<()> {
        let rollout = self
            .rollout
            .as_mut()
            .ok_or_else(|| ControllerError::NoRollout(self.spec.id.clone()))?;
        f(rollout);
        self.status.rollout = Some(rollout.status());
        Ok(())
    }

    fn publish(&self) {
        self.status_tx.send_replace(self.status.clone());
    }
}
