//! Scaling policy — maps observed utilization to a desired replica count.
//!
//! The policy holds no state: the same inputs always produce the same
//! decision. Cooldowns and smoothing live in the stabilization window.

use std::collections::BTreeMap;

use tracing::debug;

use scalegrid_core::*;

/// Subtracted before rounding up so that exact ratios such as
/// `2 * 0.7 / 0.7` do not round up on floating noise.
const CEIL_EPSILON: f64 = 1e-9;

/// Evaluate the policy for one replica set.
///
/// Each resource kind with a configured target proposes
/// `ceil(current * observed / target)`; the largest proposal wins and is
/// clamped into `bounds`. With no usable samples the decision is
/// `NoChange` (clamped into bounds if the current count lies outside).
pub fn evaluate(
    current_count: u32,
    samples: &[MetricSample],
    targets: &ScalingTargets,
    bounds: &ReplicaBounds,
    now: u64,
) -> ScalingDecision {
    let latest = latest_per_replica(samples);
    let cpu_utilization = average_utilization(&latest, ResourceKind::Cpu);
    let memory_utilization = average_utilization(&latest, ResourceKind::Memory);

    let mut proposal: Option<u32> = None;
    for (kind, observed) in [
        (ResourceKind::Cpu, cpu_utilization),
        (ResourceKind::Memory, memory_utilization),
    ] {
        let (Some(target), Some(observed)) = (targets.target_for(kind), observed) else {
            continue;
        };
        let desired = desired_for(current_count, observed, target, targets.tolerance);
        debug!(
            %kind,
            observed,
            target,
            current = current_count,
            desired,
            "resource proposal"
        );
        proposal = Some(proposal.map_or(desired, |p| p.max(desired)));
    }

    let (target_count, reason) = match proposal {
        None => {
            // Never scale on absent data; only pull the count back into bounds.
            let target = bounds.clamp(current_count);
            let reason = if target == current_count {
                DecisionReason::NoChange
            } else {
                DecisionReason::Clamped
            };
            (target, reason)
        }
        Some(raw) => {
            let target = bounds.clamp(raw);
            let reason = if target == current_count {
                DecisionReason::NoChange
            } else if target != raw {
                DecisionReason::Clamped
            } else if target > current_count {
                DecisionReason::ScaleUp
            } else {
                DecisionReason::ScaleDown
            };
            (target, reason)
        }
    };

    ScalingDecision {
        target_count,
        current_count,
        reason,
        evaluated_at: now,
        cpu_utilization,
        memory_utilization,
    }
}

/// Keep only the most recent sample per `(replica, resource kind)`.
///
/// Samples with a negative or non-finite ratio are dropped. The result is
/// ordered by replica id so that averaging is deterministic.
pub fn latest_per_replica(samples: &[MetricSample]) -> Vec<&MetricSample> {
    let mut latest: BTreeMap<(&str, ResourceKind), &MetricSample> = BTreeMap::new();

    for sample in samples {
        if !(sample.utilization_ratio.is_finite() && sample.utilization_ratio >= 0.0) {
            debug!(
                replica = %sample.replica_id,
                ratio = sample.utilization_ratio,
                "dropping invalid sample"
            );
            continue;
        }
        let key = (sample.replica_id.as_str(), sample.resource_kind);
        match latest.get(&key) {
            Some(existing) if existing.timestamp > sample.timestamp => {}
            _ => {
                latest.insert(key, sample);
            }
        }
    }

    latest.into_values().collect()
}

fn average_utilization(latest: &[&MetricSample], kind: ResourceKind) -> Option<f64> {
    let (sum, count) = latest
        .iter()
        .filter(|s| s.resource_kind == kind)
        .fold((0.0, 0u32), |(sum, count), s| (sum + s.utilization_ratio, count + 1));

    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

fn desired_for(current: u32, observed: f64, target: f64, tolerance: f64) -> u32 {
    let ratio = observed / target;
    if (ratio - 1.0).abs() <= tolerance {
        return current;
    }
    let raw = (current as f64 * ratio - CEIL_EPSILON).ceil();
    if raw <= 0.0 {
        0
    } else if raw >= u32::MAX as f64 {
        u32::MAX
    } else {
        raw as u32
    }
}
