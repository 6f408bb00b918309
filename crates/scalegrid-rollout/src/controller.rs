//! Rolling update controller — replaces replicas batch by batch.
//!
//! Each batch is sized by `batch_size` and then cut down by the
//! disruption budget guard, so a rollout never takes more replicas away
//! than the budget allows. Batches that the budget blocks entirely are
//! simply retried on the next cycle.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use scalegrid_core::{DisruptionBudget, ReplicaSet, RolloutStatus, WorkloadId};

use crate::budget::authorize_removal;

/// Current phase of a rolling update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum RolloutPhase {
    /// Rollout not started.
    Pending,
    /// Replacing replicas: `replaced` of `total` done.
    Progressing { replaced: u32, total: u32 },
    /// Paused by operator.
    Paused,
    /// Every replica runs the new revision.
    Completed,
}

/// Action to take for the next rollout step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchAction {
    /// Replace `count` old replicas with new-revision replicas.
    Replace { count: u32 },
    /// The disruption budget allows no replacement this cycle.
    Blocked,
}

/// A rolling update in progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollingUpdate {
    pub workload_id: WorkloadId,
    pub revision: String,
    pub batch_size: u32,
    pub phase: RolloutPhase,
    replaced: u32,
    total: u32,
}

impl RollingUpdate {
    /// Create a new rollout towards `revision`.
    pub fn new(workload_id: &str, revision: &str, batch_size: u32) -> Self {
        Self {
            workload_id: workload_id.to_string(),
            revision: revision.to_string(),
            batch_size: batch_size.max(1),
            phase: RolloutPhase::Pending,
            replaced: 0,
            total: 0,
        }
    }

    /// Start the rollout over `total` replicas.
    pub fn start(&mut self, total: u32) {
        self.total = total;
        self.replaced = 0;
        if total == 0 {
            self.phase = RolloutPhase::Completed;
            info!(workload = %self.workload_id, revision = %self.revision, "nothing to roll out");
            return;
        }
        self.phase = RolloutPhase::Progressing { replaced: 0, total };
        info!(
            workload = %self.workload_id,
            revision = %self.revision,
            total,
            batch_size = self.batch_size,
            "started rolling update"
        );
    }

    pub fn replaced(&self) -> u32 {
        self.replaced
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase, RolloutPhase::Progressing { .. })
    }

    pub fn is_completed(&self) -> bool {
        self.phase == RolloutPhase::Completed
    }

    /// Summary for status queries.
    pub fn status(&self) -> RolloutStatus {
        let state = match self.phase {
            RolloutPhase::Pending => "pending",
            RolloutPhase::Progressing { .. } => "progressing",
            RolloutPhase::Paused => "paused",
            RolloutPhase::Completed => "completed",
        };
        RolloutStatus {
            revision: self.revision.clone(),
            replaced: self.replaced,
            total: self.total,
            state: state.to_string(),
        }
    }

    /// Plan the next batch against the current replica set.
    ///
    /// Returns `None` unless the rollout is progressing.
    pub fn advance(
        &mut self,
        replica_set: &ReplicaSet,
        budget: &DisruptionBudget,
    ) -> Option<BatchAction> {
        if !self.is_active() {
            return None;
        }

        // Replicas added by a scale-up since the start also need replacing.
        self.total = self.total.max(replica_set.current_count);
        let remaining = self.total.saturating_sub(self.replaced);
        if remaining == 0 {
            self.complete();
            return None;
        }

        let step = self.batch_size.min(remaining);
        let authorized = authorize_removal(replica_set, step, budget);
        if authorized == 0 {
            debug!(
                workload = %self.workload_id,
                remaining,
                "rollout batch blocked by disruption budget"
            );
            return Some(BatchAction::Blocked);
        }

        Some(BatchAction::Replace { count: authorized })
    }

    /// Record the outcome of a `Replace` batch.
    ///
    /// `replaced` is what the platform actually swapped. Fewer than
    /// `requested` means no old replicas were left.
    pub fn record_batch(&mut self, requested: u32, replaced: u32) {
        if !self.is_active() {
            return;
        }
        self.replaced = self.replaced.saturating_add(replaced);

        if replaced < requested || self.replaced >= self.total {
            self.complete();
        } else {
            self.phase = RolloutPhase::Progressing {
                replaced: self.replaced,
                total: self.total,
            };
            debug!(
                workload = %self.workload_id,
                replaced = self.replaced,
                total = self.total,
                "rollout batch applied"
            );
        }
    }

    /// Pause the rollout.
    pub fn pause(&mut self) {
        if self.is_active() {
            info!(workload = %self.workload_id, "pausing rollout");
            self.phase = RolloutPhase::Paused;
        }
    }

    /// Resume a paused rollout where it left off.
    pub fn resume(&mut self) {
        if self.phase == RolloutPhase::Paused {
            info!(workload = %self.workload_id, "resuming rollout");
            self.phase = RolloutPhase::Progressing {
                replaced: self.replaced,
                total: self.total,
            };
        }
    }

    fn complete(&mut self) {
        self.phase = RolloutPhase::Completed;
        info!(
            workload = %self.workload_id,
            revision = %self.revision,
            replaced = self.replaced,
            "rolling update completed"
        );
    }
}
