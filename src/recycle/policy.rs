//! Recycling threshold.

use crate::config::RecyclingConfig;

/// Decides when a connection has served enough requests to be recycled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecyclePolicy {
    max_requests: u64,
}

impl RecyclePolicy {
    pub fn new(max_requests: u64) -> Self {
        Self { max_requests }
    }

    pub fn from_config(config: &RecyclingConfig) -> Self {
        Self::new(config.requests_per_conn)
    }

    /// Configured request threshold.
    pub fn threshold(&self) -> u64 {
        self.max_requests
    }

    /// True once `served` has reached the threshold. Counters only grow, so
    /// this never flips back to false for the same connection.
    pub fn should_recycle(&self, served: u64) -> bool {
        served >= self.max_requests
    }
}
