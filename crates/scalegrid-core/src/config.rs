//! scalegrid.toml configuration parser.
//!
//! The file is deserialized into raw structs that mirror the TOML layout,
//! then validated once into [`ControllerConfig`]. Nothing downstream reads
//! the raw form or the environment.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, ConfigResult};
use crate::types::{DisruptionBudget, ReplicaBounds, ScalingTargets, WorkloadId};

pub const DEFAULT_CYCLE: &str = "15s";
pub const DEFAULT_COMMAND_TIMEOUT: &str = "5s";
pub const DEFAULT_STABILIZATION_WINDOW: &str = "5m";
pub const DEFAULT_TOLERANCE: f64 = 0.1;

// ── Raw (file) representation ──────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawConfig {
    #[serde(default)]
    pub controller: RawControllerSettings,
    #[serde(default, rename = "workload")]
    pub workloads: Vec<RawWorkload>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawControllerSettings {
    pub cycle: Option<String>,
    pub command_timeout: Option<String>,
    pub stabilization_window: Option<String>,
    pub listen: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawWorkload {
    pub id: String,
    pub min_replicas: u32,
    pub max_replicas: u32,
    pub target_cpu: Option<f64>,
    pub target_memory: Option<f64>,
    pub tolerance: Option<f64>,
    pub min_available: Option<u32>,
    pub max_unavailable: Option<u32>,
    pub rollout_batch_size: Option<u32>,
    pub simulation: Option<SimulationSpec>,
}

/// Load profile for the in-memory platform used by `scalegridd run`.
///
/// Demands are expressed in replica units: a CPU demand of `1.9` spread
/// across two replicas yields a per-replica utilization of `0.95`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationSpec {
    pub initial_replicas: u32,
    #[serde(default)]
    pub cpu_demand: f64,
    #[serde(default)]
    pub memory_demand: f64,
    /// Largest replica count the simulated platform accepts.
    pub capacity: Option<u32>,
}

// ── Validated representation ───────────────────────────────────────

/// Validated controller configuration, passed explicitly at startup.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub controller: ControllerSettings,
    pub workloads: Vec<WorkloadSpec>,
}

/// Loop timing shared by every reconciler.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerSettings {
    pub cycle: Duration,
    pub command_timeout: Duration,
    pub stabilization_window: Duration,
    pub listen: Option<SocketAddr>,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            cycle: Duration::from_secs(15),
            command_timeout: Duration::from_secs(5),
            stabilization_window: Duration::from_secs(300),
            listen: None,
        }
    }
}

/// One autoscaled workload.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadSpec {
    pub id: WorkloadId,
    pub bounds: ReplicaBounds,
    pub targets: ScalingTargets,
    pub budget: DisruptionBudget,
    pub rollout_batch_size: u32,
    pub simulation: Option<SimulationSpec>,
}

impl ControllerConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let raw: RawConfig = toml::from_str(content)?;
        raw.validate()
    }
}

impl RawConfig {
    /// Validate once, producing the typed configuration.
    pub fn validate(self) -> ConfigResult<ControllerConfig> {
        let controller = self.controller.validate()?;

        if self.workloads.is_empty() {
            return Err(ConfigError::NoWorkloads);
        }

        let mut seen = HashSet::new();
        let mut workloads = Vec::with_capacity(self.workloads.len());
        for raw in self.workloads {
            if !seen.insert(raw.id.clone()) {
                return Err(ConfigError::DuplicateWorkload(raw.id));
            }
            workloads.push(raw.validate()?);
        }

        Ok(ControllerConfig {
            controller,
            workloads,
        })
    }
}

impl RawControllerSettings {
    fn validate(self) -> ConfigResult<ControllerSettings> {
        let cycle = parse_duration_field("cycle", self.cycle.as_deref().unwrap_or(DEFAULT_CYCLE))?;
        let command_timeout = parse_duration_field(
            "command_timeout",
            self.command_timeout
                .as_deref()
                .unwrap_or(DEFAULT_COMMAND_TIMEOUT),
        )?;
        let stabilization_window = parse_duration_field(
            "stabilization_window",
            self.stabilization_window
                .as_deref()
                .unwrap_or(DEFAULT_STABILIZATION_WINDOW),
        )?;

        for (field, value) in [("cycle", cycle), ("command_timeout", command_timeout)] {
            if value.is_zero() {
                return Err(ConfigError::InvalidDuration {
                    field: field.to_string(),
                    value: "0".to_string(),
                });
            }
        }

        let listen = match self.listen {
            Some(addr) => Some(
                addr.parse::<SocketAddr>()
                    .map_err(|_| ConfigError::InvalidListen(addr.clone()))?,
            ),
            None => None,
        };

        Ok(ControllerSettings {
            cycle,
            command_timeout,
            stabilization_window,
            listen,
        })
    }
}

impl RawWorkload {
    fn validate(self) -> ConfigResult<WorkloadSpec> {
        if self.id.is_empty() || self.id.contains('/') {
            return Err(ConfigError::InvalidWorkloadId(self.id));
        }

        let bounds = ReplicaBounds::new(self.min_replicas, self.max_replicas)?;

        if self.target_cpu.is_none() && self.target_memory.is_none() {
            return Err(invalid_target(
                &self.id,
                "at least one of target_cpu or target_memory is required",
            ));
        }
        for (name, value) in [
            ("target_cpu", self.target_cpu),
            ("target_memory", self.target_memory),
        ] {
            if let Some(v) = value
                && !(v.is_finite() && v > 0.0)
            {
                return Err(invalid_target(
                    &self.id,
                    &format!("{name} must be a positive ratio, got {v}"),
                ));
            }
        }

        let tolerance = self.tolerance.unwrap_or(DEFAULT_TOLERANCE);
        if !(tolerance.is_finite() && tolerance >= 0.0) {
            return Err(invalid_target(
                &self.id,
                &format!("tolerance must be >= 0, got {tolerance}"),
            ));
        }

        let budget = DisruptionBudget {
            min_available: self.min_available.unwrap_or(0),
            max_unavailable: self.max_unavailable,
        };
        if budget.min_available > bounds.min() {
            warn!(
                workload = %self.id,
                min_available = budget.min_available,
                min_replicas = bounds.min(),
                "min_available exceeds min_replicas; scale-down will stop at min_available"
            );
        }

        let rollout_batch_size = self.rollout_batch_size.unwrap_or(1);
        if rollout_batch_size == 0 {
            return Err(invalid_target(&self.id, "rollout_batch_size must be at least 1"));
        }

        Ok(WorkloadSpec {
            id: self.id,
            bounds,
            targets: ScalingTargets {
                cpu: self.target_cpu,
                memory: self.target_memory,
                tolerance,
            },
            budget,
            rollout_batch_size,
            simulation: self.simulation,
        })
    }
}

fn invalid_target(workload: &str, message: &str) -> ConfigError {
    ConfigError::InvalidTarget {
        workload: workload.to_string(),
        message: message.to_string(),
    }
}

fn parse_duration_field(field: &str, value: &str) -> ConfigResult<Duration> {
    parse_duration(value).ok_or_else(|| ConfigError::InvalidDuration {
        field: field.to_string(),
        value: value.to_string(),
    })
}

/// Parse a duration string like "250ms", "30s", "5m", "1h".
///
/// A bare number is read as seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.trim().parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else if let Some(hours) = s.strip_suffix('h') {
        hours.trim().parse::<u64>().ok().map(|h| Duration::from_secs(h * 3600))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
[controller]
cycle = "15s"
command_timeout = "5s"
stabilization_window = "5m"
listen = "127.0.0.1:9090"

[[workload]]
id = "rf-classifier"
min_replicas = 2
max_replicas = 10
target_cpu = 0.70
target_memory = 0.80
min_available = 2

[workload.simulation]
initial_replicas = 2
cpu_demand = 1.9
capacity = 8
"#;

    #[test]
    fn parse_full_config() {
        let config = ControllerConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.controller.cycle, Duration::from_secs(15));
        assert_eq!(config.controller.stabilization_window, Duration::from_secs(300));
        assert_eq!(
            config.controller.listen,
            Some("127.0.0.1:9090".parse().unwrap())
        );

        let w = &config.workloads[0];
        assert_eq!(w.id, "rf-classifier");
        assert_eq!(w.bounds.min(), 2);
        assert_eq!(w.bounds.max(), 10);
        assert_eq!(w.targets.cpu, Some(0.70));
        assert_eq!(w.targets.tolerance, DEFAULT_TOLERANCE);
        assert_eq!(w.budget.min_available, 2);
        assert_eq!(w.rollout_batch_size, 1);

        let sim = w.simulation.as_ref().unwrap();
        assert_eq!(sim.initial_replicas, 2);
        assert_eq!(sim.memory_demand, 0.0);
        assert_eq!(sim.capacity, Some(8));
    }

    #[test]
    fn controller_section_defaults() {
        let config = ControllerConfig::from_toml_str(
            r#"
[[workload]]
id = "api"
min_replicas = 1
max_replicas = 3
target_cpu = 0.5
"#,
        )
        .unwrap();
        assert_eq!(config.controller, ControllerSettings::default());
    }

    #[test]
    fn inverted_bounds_are_fatal() {
        let err = ControllerConfig::from_toml_str(
            r#"
[[workload]]
id = "api"
min_replicas = 5
max_replicas = 2
target_cpu = 0.5
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBounds { min: 5, max: 2 }));
    }

    #[test]
    fn missing_targets_rejected() {
        let err = ControllerConfig::from_toml_str(
            r#"
[[workload]]
id = "api"
min_replicas = 1
max_replicas = 2
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTarget { .. }));
    }

    #[test]
    fn zero_target_rejected() {
        let err = ControllerConfig::from_toml_str(
            r#"
[[workload]]
id = "api"
min_replicas = 1
max_replicas = 2
target_cpu = 0.0
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTarget { .. }));
    }

    #[test]
    fn duplicate_ids_rejected() {
        let err = ControllerConfig::from_toml_str(
            r#"
[[workload]]
id = "api"
min_replicas = 1
max_replicas = 2
target_cpu = 0.5

[[workload]]
id = "api"
min_replicas = 1
max_replicas = 2
target_cpu = 0.5
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateWorkload(id) if id == "api"));
    }

    #[test]
    fn slash_in_id_rejected() {
        let err = ControllerConfig::from_toml_str(
            r#"
[[workload]]
id = "default/api"
min_replicas = 1
max_replicas = 2
target_cpu = 0.5
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidWorkloadId(_)));
    }

    #[test]
    fn empty_config_rejected() {
        let err = ControllerConfig::from_toml_str("").unwrap_err();
        assert!(matches!(err, ConfigError::NoWorkloads));
    }

    #[test]
    fn bad_duration_rejected() {
        let err = ControllerConfig::from_toml_str(
            r#"
[controller]
cycle = "soon"

[[workload]]
id = "api"
min_replicas = 1
max_replicas = 2
target_cpu = 0.5
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDuration { field, .. } if field == "cycle"));
    }

    #[test]
    fn zero_command_timeout_rejected() {
        let err = ControllerConfig::from_toml_str(
            r#"
[controller]
command_timeout = "0s"

[[workload]]
id = "api"
min_replicas = 1
max_replicas = 2
target_cpu = 0.5
"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidDuration { field, .. } if field == "command_timeout"
        ));
    }

    #[test]
    fn zero_stabilization_window_allowed() {
        let cfg = ControllerConfig::from_toml_str(
            r#"
[controller]
stabilization_window = "0s"

[[workload]]
id = "api"
min_replicas = 1
max_replicas = 2
target_cpu = 0.5
"#,
        )
        .unwrap();
        assert_eq!(cfg.controller.stabilization_window, Duration::ZERO);
    }

    #[test]
    fn parse_duration_values() {
        assert_eq!(parse_duration("250ms"), Some(Duration::from_millis(250)));
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("5m"), Some(Duration::from_secs(300)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration("45"), Some(Duration::from_secs(45)));
        assert_eq!(parse_duration("invalid"), None);
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = ControllerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.workloads.len(), 1);
    }
}
