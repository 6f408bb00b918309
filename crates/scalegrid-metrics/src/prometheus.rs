//! Prometheus text exposition format.
//!
//! Renders reconciler status snapshots into the Prometheus text
//! exposition format for scraping by a Prometheus server.

use std::fmt::Write;

use scalegrid_core::{ReconcilePhase, ReplicaStatus};

/// Render status snapshots into Prometheus text format.
///
/// Produces GAUGE and COUNTER metrics with `workload` labels.
pub fn render_prometheus(statuses: &[ReplicaStatus]) -> String {
    let mut out = String::new();

    gauge(
        &mut out,
        "scalegrid_current_replicas",
        "Replicas the platform reports as running.",
        statuses,
        |s| Some(s.replica_set.current_count.to_string()),
    );
    gauge(
        &mut out,
        "scalegrid_desired_replicas",
        "Replicas the controller is driving towards.",
        statuses,
        |s| Some(s.replica_set.desired_count.to_string()),
    );
    gauge(
        &mut out,
        "scalegrid_min_replicas",
        "Configured lower replica bound.",
        statuses,
        |s| Some(s.replica_set.bounds.min().to_string()),
    );
    gauge(
        &mut out,
        "scalegrid_max_replicas",
        "Configured upper replica bound.",
        statuses,
        |s| Some(s.replica_set.bounds.max().to_string()),
    );
    gauge(
        &mut out,
        "scalegrid_cpu_utilization_ratio",
        "Average CPU utilization ratio at the last decision.",
        statuses,
        |s| {
            s.last_decision
                .as_ref()
                .and_then(|d| d.cpu_utilization)
                .map(|v| format!("{v:.4}"))
        },
    );
    gauge(
        &mut out,
        "scalegrid_memory_utilization_ratio",
        "Average memory utilization ratio at the last decision.",
        statuses,
        |s| {
            s.last_decision
                .as_ref()
                .and_then(|d| d.memory_utilization)
                .map(|v| format!("{v:.4}"))
        },
    );

    out.push_str(
        "# HELP scalegrid_reconcile_phase Current reconciler phase (1 for the active phase).\n",
    );
    out.push_str("# TYPE scalegrid_reconcile_phase gauge\n");
    for s in statuses {
        for phase in [
            ReconcilePhase::Stable,
            ReconcilePhase::Scaling,
            ReconcilePhase::Converging,
        ] {
            let _ = writeln!(
                out,
                "scalegrid_reconcile_phase{{workload=\"{}\",phase=\"{}\"}} {}",
                s.workload_id(),
                phase,
                u8::from(s.phase == phase)
            );
        }
    }

    out.push_str("# HELP scalegrid_failed_commands_total Scale commands rejected or timed out.\n");
    out.push_str("# TYPE scalegrid_failed_commands_total counter\n");
    for s in statuses {
        let _ = writeln!(
            out,
            "scalegrid_failed_commands_total{{workload=\"{}\"}} {}",
            s.workload_id(),
            s.failed_commands
        );
    }

    out
}

fn gauge(
    out: &mut String,
    name: &str,
    help: &str,
    statuses: &[ReplicaStatus],
    value: impl Fn(&ReplicaStatus) -> Option<String>,
) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} gauge");
    for s in statuses {
        if let Some(v) = value(s) {
            let _ = writeln!(out, "{name}{{workload=\"{}\"}} {v}", s.workload_id());
        }
    }
}
