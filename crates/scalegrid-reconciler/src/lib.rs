//! scalegrid-reconciler — per-workload reconcile loops.
//!
//! A `Reconciler` owns one replica set and repeatedly observes it through
//! a `WorkloadPlatform`, asks the scaling policy for a target, filters the
//! target through the stabilization window and issues at most one command
//! per cycle. Scale-downs and rollout batches go through the disruption
//! budget guard first.
//!
//! The `Supervisor` spawns one loop per configured workload and serves
//! status snapshots and rollout commands to the API layer.
//!
//! `SimulatedPlatform` is an in-memory platform used by the daemon's
//! simulation mode and by tests.

pub mod error;
pub mod platform;
pub mod reconciler;
pub mod sim;
pub mod supervisor;

pub use error::{ControllerError, ControllerResult};
pub use platform::{PlatformError, PlatformResult, WorkloadPlatform};
pub use reconciler::{Command, CycleOutcome, Reconciler};
pub use sim::SimulatedPlatform;
pub use supervisor::Supervisor;
