//! Fan-out configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fan-out configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FanOutConfig {
    /// Deadline shared by every member of one job (milliseconds).
    pub job_timeout_ms: u64,
    /// Deepest nested group level that may still dispatch. The top group is 0.
    pub max_depth: u8,
    /// Leaf dispatches allowed in flight across all jobs.
    pub max_concurrent_dispatches: usize,
}

impl Default for FanOutConfig {
    fn default() -> Self {
        Self {
            job_timeout_ms: 10_000,
            max_depth: 3,
            max_concurrent_dispatches: 16,
        }
    }
}

impl FanOutConfig {
    /// Creates a minimal config for testing.
    pub fn for_testing() -> Self {
        Self {
            job_timeout_ms: 1_000,
            max_depth: 2,
            max_concurrent_dispatches: 4,
        }
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_millis(self.job_timeout_ms)
    }
}
