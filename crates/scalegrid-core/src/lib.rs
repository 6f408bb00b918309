//! scalegrid-core — shared types and configuration for the scalegrid
//! autoscaling controller.
//!
//! # Components
//!
//! - **`types`** — replica sets, metric samples, scaling decisions, budgets
//! - **`status`** — per-loop status snapshots for status queries
//! - **`config`** — `scalegrid.toml` parsing and one-shot validation
//! - **`error`** — configuration errors (`InvalidBounds` and friends)

pub mod config;
pub mod error;
pub mod status;
pub mod types;

pub use config::{ControllerConfig, ControllerSettings, SimulationSpec, WorkloadSpec};
pub use error::{ConfigError, ConfigResult};
pub use status::{ReconcilePhase, ReplicaStatus, RolloutStatus};
pub use types::*;
