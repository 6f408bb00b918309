//! Disruption budget guard.

use tracing::debug;

use scalegrid_core::{DisruptionBudget, ReplicaSet};

/// Number of removals that may be carried out now, out of `requested`.
///
/// The result never drives the available replicas
/// (`current - in_flight - authorized`) below `budget.min_available`, and
/// never pushes the number of unavailable replicas past
/// `budget.max_unavailable` when one is set. Removals that are not
/// authorized are the caller's to retry on a later cycle.
pub fn authorize_removal(
    replica_set: &ReplicaSet,
    requested: u32,
    budget: &DisruptionBudget,
) -> u32 {
    let available = replica_set
        .current_count
        .saturating_sub(replica_set.in_flight_removals);
    let mut authorized = requested.min(available.saturating_sub(budget.min_available));

    if let Some(max_unavailable) = budget.max_unavailable {
        authorized = authorized.min(max_unavailable.saturating_sub(replica_set.in_flight_removals));
    }

    if authorized < requested {
        debug!(
            workload = %replica_set.workload_id,
            requested,
            authorized,
            current = replica_set.current_count,
            in_flight = replica_set.in_flight_removals,
            min_available = budget.min_available,
            "disruption budget limited removals"
        );
    }

    authorized
}
