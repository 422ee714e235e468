use parking_lot::RwLock;
use std::collections::VecDeque;

use crate::models::MetricSample;

/// Bounded, insertion-ordered log of trend samples.
///
/// Appending at capacity evicts the oldest sample under the same write lock,
/// so readers never observe more than `capacity` entries.
pub struct RollingHistory {
    samples: RwLock<VecDeque<MetricSample>>,
    capacity: usize,
}

impl RollingHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn push(&self, sample: MetricSample) {
        let mut samples = self.samples.write();
        while samples.len() >= self.capacity {
            samples.pop_front();
        }
        samples.push_back(sample);
    }

    /// Oldest first
    pub fn snapshot(&self) -> Vec<MetricSample> {
        self.samples.read().iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<MetricSample> {
        self.samples.read().back().cloned()
    }

    pub fn len(&self) -> usize {
        self.samples.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.read().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
