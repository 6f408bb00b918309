//! Stabilization window — fast scale-up, slow scale-down.
//!
//! Scale-up proposals pass straight through. Any other proposal is
//! raised to the largest proposal seen in the trailing window, so a
//! replica count only drops once every recent proposal agrees.

use std::time::Duration;

use tracing::debug;

use scalegrid_core::{DecisionReason, ScalingDecision};

/// Trailing window of policy proposals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilizationWindow {
    horizon: Duration,
}

impl Default for StabilizationWindow {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

impl StabilizationWindow {
    pub fn new(horizon: Duration) -> Self {
        Self { horizon }
    }

    pub fn horizon(&self) -> Duration {
        self.horizon
    }

    fn horizon_millis(&self) -> u64 {
        self.horizon.as_millis().min(u64::MAX as u128) as u64
    }

    /// Admit a raw policy decision against the proposals in `history`.
    ///
    /// `history` holds earlier raw proposals; entries outside the horizon
    /// relative to `decision.evaluated_at` are ignored.
    pub fn admit(&self, decision: ScalingDecision, history: &[ScalingDecision]) -> ScalingDecision {
        if decision.is_scale_up() {
            return decision;
        }

        let floor = decision.evaluated_at.saturating_sub(self.horizon_millis());
        let window_max = history
            .iter()
            .filter(|d| d.evaluated_at >= floor && d.evaluated_at <= decision.evaluated_at)
            .map(|d| d.target_count)
            .max();

        match window_max {
            Some(max) if max > decision.target_count => {
                debug!(
                    proposed = decision.target_count,
                    window_max = max,
                    current = decision.current_count,
                    "scale-down held by stabilization window"
                );
                let reason = if max == decision.current_count {
                    DecisionReason::NoChange
                } else {
                    DecisionReason::Stabilized
                };
                ScalingDecision {
                    target_count: max,
                    reason,
                    ..decision
                }
            }
            _ => decision,
        }
    }

    /// Drop proposals that fell out of the window as of `now`.
    pub fn prune(&self, history: &mut Vec<ScalingDecision>, now: u64) {
        let floor = now.saturating_sub(self.horizon_millis());
        history.retain(|d| d.evaluated_at >= floor);
    }
}
