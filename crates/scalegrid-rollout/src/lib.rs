//! scalegrid-rollout — disruption budgets and rolling updates.
//!
//! Every voluntary removal of a replica, whether caused by a scale-down
//! or by replacing an old revision, is authorized by the disruption
//! budget guard first.
//!
//! # Components
//!
//! - **`budget`** — `authorize_removal`, the disruption budget guard
//! - **`controller`** — rolling update state machine (advance, pause, resume)

pub mod budget;
pub mod controller;

pub use budget::authorize_removal;
pub use controller::{BatchAction, RollingUpdate, RolloutPhase};
