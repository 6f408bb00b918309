//! Domain types shared by every scalegrid crate.
//!
//! These types describe replica sets, metric observations, scaling
//! decisions, and disruption budgets. All of them are serializable so
//! they can be exposed through the status API unchanged.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Identifier of a workload managed by the controller.
pub type WorkloadId = String;

/// Identifier of a single replica within a workload.
pub type ReplicaId = String;

// ── Metrics ────────────────────────────────────────────────────────

/// Resource a utilization sample refers to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Cpu,
    Memory,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 2] = [ResourceKind::Cpu, ResourceKind::Memory];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Cpu => "cpu",
            ResourceKind::Memory => "memory",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One utilization observation for one replica.
///
/// `utilization_ratio` is consumption divided by the requested amount,
/// so `1.0` means the replica uses exactly what it asked for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricSample {
    pub resource_kind: ResourceKind,
    pub utilization_ratio: f64,
    pub replica_id: ReplicaId,
    /// Unix timestamp (milliseconds) when the sample was taken.
    pub timestamp: u64,
}

impl MetricSample {
    pub fn new(
        resource_kind: ResourceKind,
        utilization_ratio: f64,
        replica_id: &str,
        timestamp: u64,
    ) -> Self {
        Self {
            resource_kind,
            utilization_ratio,
            replica_id: replica_id.to_string(),
            timestamp,
        }
    }
}

// ── Replica sets ───────────────────────────────────────────────────

/// Inclusive min/max replica bounds. `min <= max` holds by construction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplicaBounds {
    min: u32,
    max: u32,
}

impl ReplicaBounds {
    pub fn new(min: u32, max: u32) -> ConfigResult<Self> {
        if min > max {
            return Err(ConfigError::InvalidBounds { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> u32 {
        self.min
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn clamp(&self, count: u32) -> u32 {
        count.clamp(self.min, self.max)
    }

    pub fn contains(&self, count: u32) -> bool {
        (self.min..=self.max).contains(&count)
    }
}

/// Logical grouping of identical workload replicas.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReplicaSet {
    pub workload_id: WorkloadId,
    /// Replicas the platform reports as running.
    pub current_count: u32,
    /// Replicas the controller wants running.
    pub desired_count: u32,
    pub bounds: ReplicaBounds,
    /// Removals already commanded but not yet observed.
    pub in_flight_removals: u32,
}

impl ReplicaSet {
    pub fn new(workload_id: &str, current_count: u32, bounds: ReplicaBounds) -> Self {
        Self {
            workload_id: workload_id.to_string(),
            current_count,
            desired_count: current_count,
            bounds,
            in_flight_removals: 0,
        }
    }

    /// Whether the steady-state invariant `min <= current <= max` holds.
    pub fn within_bounds(&self) -> bool {
        self.bounds.contains(self.current_count)
    }
}

// ── Decisions ──────────────────────────────────────────────────────

/// Why a scaling decision picked its target.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    ScaleUp,
    ScaleDown,
    NoChange,
    /// The proposal fell outside the replica bounds.
    Clamped,
    /// A scale-down was held back by the stabilization window.
    Stabilized,
}

impl DecisionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionReason::ScaleUp => "scale_up",
            DecisionReason::ScaleDown => "scale_down",
            DecisionReason::NoChange => "no_change",
            DecisionReason::Clamped => "clamped",
            DecisionReason::Stabilized => "stabilized",
        }
    }
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of one policy evaluation. Never mutated once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScalingDecision {
    pub target_count: u32,
    /// Replica count the decision was evaluated against.
    pub current_count: u32,
    pub reason: DecisionReason,
    /// Unix timestamp (milliseconds) of the evaluation.
    pub evaluated_at: u64,
    /// Average CPU utilization ratio observed, if any samples existed.
    pub cpu_utilization: Option<f64>,
    /// Average memory utilization ratio observed, if any samples existed.
    pub memory_utilization: Option<f64>,
}

impl ScalingDecision {
    pub fn is_scale_up(&self) -> bool {
        self.target_count > self.current_count
    }

    pub fn is_scale_down(&self) -> bool {
        self.target_count < self.current_count
    }
}

/// Per-resource utilization targets. At least one is set once validated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ScalingTargets {
    pub cpu: Option<f64>,
    pub memory: Option<f64>,
    /// Relative deviation from the target that is treated as on-target.
    pub tolerance: f64,
}

impl ScalingTargets {
    pub fn target_for(&self, kind: ResourceKind) -> Option<f64> {
        match kind {
            ResourceKind::Cpu => self.cpu,
            ResourceKind::Memory => self.memory,
        }
    }
}

/// Floor on available replicas during voluntary disruptions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DisruptionBudget {
    pub min_available: u32,
    /// Optional cap on replicas unavailable at the same time.
    pub max_unavailable: Option<u32>,
}

impl DisruptionBudget {
    pub fn min_available(min_available: u32) -> Self {
        Self {
            min_available,
            max_unavailable: None,
        }
    }
}

/// Current Unix time in milliseconds.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_reject_inverted_range() {
        let err = ReplicaBounds::new(5, 2).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBounds { min: 5, max: 2 }));
    }

    #[test]
    fn bounds_clamp_and_contain() {
        let bounds = ReplicaBounds::new(2, 10).unwrap();
        assert_eq!(bounds.clamp(0), 2);
        assert_eq!(bounds.clamp(7), 7);
        assert_eq!(bounds.clamp(40), 10);
        assert!(bounds.contains(2));
        assert!(!bounds.contains(11));
    }

    #[test]
    fn replica_set_starts_converged() {
        let rs = ReplicaSet::new("api", 3, ReplicaBounds::new(2, 10).unwrap());
        assert_eq!(rs.desired_count, 3);
        assert_eq!(rs.in_flight_removals, 0);
        assert!(rs.within_bounds());
    }

    #[test]
    fn decision_direction() {
        let decision = ScalingDecision {
            target_count: 3,
            current_count: 2,
            reason: DecisionReason::ScaleUp,
            evaluated_at: 0,
            cpu_utilization: Some(0.95),
            memory_utilization: None,
        };
        assert!(decision.is_scale_up());
        assert!(!decision.is_scale_down());
    }

    #[test]
    fn reason_serializes_snake_case() {
        let json = serde_json::to_string(&DecisionReason::ScaleDown).unwrap();
        assert_eq!(json, "\"scale_down\"");
    }
}
