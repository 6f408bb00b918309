//! Status snapshots published by each reconcile loop.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{ReplicaSet, ScalingDecision};

/// Reconciler state for one replica set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReconcilePhase {
    /// Observed count matches the target.
    Stable,
    /// A new target was admitted; the scale command is pending or being retried.
    Scaling,
    /// The command was accepted; waiting to observe the new count.
    Converging,
}

impl ReconcilePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcilePhase::Stable => "stable",
            ReconcilePhase::Scaling => "scaling",
            ReconcilePhase::Converging => "converging",
        }
    }
}

impl fmt::Display for ReconcilePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of a rolling update for status queries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RolloutStatus {
    pub revision: String,
    pub replaced: u32,
    pub total: u32,
    pub state: String,
}

/// Consistent snapshot of one reconcile loop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReplicaStatus {
    pub replica_set: ReplicaSet,
    pub phase: ReconcilePhase,
    pub last_decision: Option<ScalingDecision>,
    /// Most recent recoverable error, cleared once a command succeeds.
    pub last_error: Option<String>,
    pub failed_commands: u64,
    pub cycles: u64,
    /// Unix timestamp (milliseconds) of the last completed cycle.
    pub updated_at: u64,
    pub rollout: Option<RolloutStatus>,
}

impl ReplicaStatus {
    pub fn new(replica_set: ReplicaSet) -> Self {
        Self {
            replica_set,
            phase: ReconcilePhase::Stable,
            last_decision: None,
            last_error: None,
            failed_commands: 0,
            cycles: 0,
            updated_at: 0,
            rollout: None,
        }
    }

    pub fn workload_id(&self) -> &str {
        &self.replica_set.workload_id
    }
}
