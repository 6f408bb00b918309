//! scalegrid-autoscale — utilization-driven replica scaling.
//!
//! The scaling policy is a pure function from observed utilization to a
//! desired replica count; the stabilization window smooths its output so
//! the controller scales up fast and scales down slowly.
//!
//! # Scaling Algorithm
//!
//! ```text
//! for each resource kind with a target:
//!     avg     = mean(latest sample per replica)
//!     ratio   = avg / target
//!     desired = |ratio - 1| <= tolerance ? current : ceil(current * ratio)
//!
//! proposal = clamp(max(desired over kinds), min, max)
//!
//! admit:
//!     proposal > current          -> admitted as-is
//!     otherwise                   -> max(proposal, proposals in trailing window)
//! ```

pub mod policy;
pub mod stabilization;

pub use policy::{evaluate, latest_per_replica};
pub use stabilization::StabilizationWindow;
