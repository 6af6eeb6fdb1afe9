//! Polling channel configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Polling channel configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Server ceiling for one poll (milliseconds). A caller hint may shorten it.
    pub max_poll_wait_ms: u64,
    /// Submitter wait when the caller gives none (milliseconds).
    pub default_response_wait_ms: u64,
    /// Longest a request may sit in a mailbox (milliseconds).
    pub request_ttl_ms: u64,
    /// Maximum queued requests per target.
    pub mailbox_capacity: usize,
    /// Interval of the expired-entry sweeper (milliseconds).
    pub sweep_interval_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            max_poll_wait_ms: 30_000,
            default_response_wait_ms: 10_000,
            request_ttl_ms: 60_000,
            mailbox_capacity: 256,
            sweep_interval_ms: 1_000,
        }
    }
}

impl PollingConfig {
    /// Creates a minimal config for testing.
    pub fn for_testing() -> Self {
        Self {
            max_poll_wait_ms: 500,
            default_response_wait_ms: 500,
            request_ttl_ms: 2_000,
            mailbox_capacity: 8,
            sweep_interval_ms: 50,
        }
    }

    pub fn max_poll_wait(&self) -> Duration {
        Duration::from_millis(self.max_poll_wait_ms)
    }

    pub fn default_response_wait(&self) -> Duration {
        Duration::from_millis(self.default_response_wait_ms)
    }

    pub fn request_ttl(&self) -> Duration {
        Duration::from_millis(self.request_ttl_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// Effective poll wait: the hint may shorten the ceiling, never lengthen it.
    pub fn effective_poll_wait(&self, hint: Option<Duration>) -> Duration {
        let ceiling = self.max_poll_wait();
        hint.map_or(ceiling, |h| h.min(ceiling))
    }
}
