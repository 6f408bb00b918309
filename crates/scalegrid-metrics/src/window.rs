//! Sample window — keeps metric samples only within the lookback horizon.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use tracing::debug;

use scalegrid_core::{MetricSample, ResourceKind};

/// Retains recorded samples for at most `horizon`.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    horizon: Duration,
    samples: VecDeque<MetricSample>,
}

impl SampleWindow {
    pub fn new(horizon: Duration) -> Self {
        Self {
            horizon,
            samples: VecDeque::new(),
        }
    }

    /// Append samples. Samples are never modified after recording.
    pub fn record(&mut self, samples: impl IntoIterator<Item = MetricSample>) {
        self.samples.extend(samples);
    }

    /// Discard samples older than the horizon as of `now` (epoch millis).
    pub fn prune(&mut self, now: u64) -> usize {
        let floor = now.saturating_sub(self.horizon.as_millis().min(u64::MAX as u128) as u64);
        let before = self.samples.len();
        self.samples.retain(|s| s.timestamp >= floor);
        let dropped = before - self.samples.len();
        if dropped > 0 {
            debug!(dropped, retained = self.samples.len(), "pruned expired samples");
        }
        dropped
    }

    /// Keep only `(replica, kind)` pairs that appear in `reported`.
    ///
    /// Replicas that were removed or stopped reporting a resource drop out
    /// of the window instead of feeding their last value forward.
    pub fn retain_reported(&mut self, reported: &[MetricSample]) {
        let keys: HashSet<(&str, ResourceKind)> = reported
            .iter()
            .map(|s| (s.replica_id.as_str(), s.resource_kind))
            .collect();
        let before = self.samples.len();
        self.samples
            .retain(|s| keys.contains(&(s.replica_id.as_str(), s.resource_kind)));
        let dropped = before - self.samples.len();
        if dropped > 0 {
            debug!(dropped, "dropped samples of replicas no longer reporting");
        }
    }

    pub fn samples(&self) -> Vec<MetricSample> {
        self.samples.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
