//! # CSE Configuration
//!
//! Loaded in three layers: defaults, an optional JSON file named by
//! `CSE_CONFIG`, then individual `CSE_*` environment overrides. The result is
//! validated before any service is built.
//!
//! | Variable | Field |
//! |----------|-------|
//! | `CSE_ID` | `cse_id` |
//! | `CSE_ALLOW_ALL` | `allow_all_access` |
//! | `CSE_MAX_POLL_WAIT_MS` | `polling.max_poll_wait_ms` |
//! | `CSE_RESPONSE_WAIT_MS` | `polling.default_response_wait_ms` |
//! | `CSE_REQUEST_TTL_MS` | `polling.request_ttl_ms` |
//! | `CSE_MAILBOX_CAPACITY` | `polling.mailbox_capacity` |
//! | `CSE_SWEEP_INTERVAL_MS` | `polling.sweep_interval_ms` |
//! | `CSE_FANOUT_TIMEOUT_MS` | `fanout.job_timeout_ms` |
//! | `CSE_FANOUT_MAX_DEPTH` | `fanout.max_depth` |
//! | `CSE_FANOUT_WORKERS` | `fanout.max_concurrent_dispatches` |

use cse_01_polling_channel::PollingConfig;
use cse_02_group_fanout::FanOutConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Complete CSE delivery configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CseConfig {
    /// Identity this CSE answers with.
    pub cse_id: String,
    /// Grant every originator everything. Development only.
    pub allow_all_access: bool,
    pub polling: PollingConfig,
    pub fanout: FanOutConfig,
}

impl Default for CseConfig {
    fn default() -> Self {
        Self {
            cse_id: "CSE-in".to_string(),
            allow_all_access: false,
            polling: PollingConfig::default(),
            fanout: FanOutConfig::default(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Invalid value '{value}' for {var}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl CseConfig {
    /// Creates a minimal config for testing.
    pub fn for_testing() -> Self {
        Self {
            cse_id: "CSE-test".to_string(),
            allow_all_access: false,
            polling: PollingConfig::for_testing(),
            fanout: FanOutConfig::for_testing(),
        }
    }

    /// Load from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Load, reading variables through `lookup`.
    pub fn load_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = match lookup("CSE_CONFIG") {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_env(&lookup)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    fn apply_env(&mut self, lookup: &impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(id) = lookup("CSE_ID") {
            self.cse_id = id;
        }
        if let Some(flag) = lookup("CSE_ALLOW_ALL") {
            self.allow_all_access = flag.eq_ignore_ascii_case("true") || flag == "1";
        }

        let polling = &mut self.polling;
        override_with(lookup, "CSE_MAX_POLL_WAIT_MS", &mut polling.max_poll_wait_ms)?;
        override_with(lookup, "CSE_RESPONSE_WAIT_MS", &mut polling.default_response_wait_ms)?;
        override_with(lookup, "CSE_REQUEST_TTL_MS", &mut polling.request_ttl_ms)?;
        override_with(lookup, "CSE_MAILBOX_CAPACITY", &mut polling.mailbox_capacity)?;
        override_with(lookup, "CSE_SWEEP_INTERVAL_MS", &mut polling.sweep_interval_ms)?;

        let fanout = &mut self.fanout;
        override_with(lookup, "CSE_FANOUT_TIMEOUT_MS", &mut fanout.job_timeout_ms)?;
        override_with(lookup, "CSE_FANOUT_MAX_DEPTH", &mut fanout.max_depth)?;
        override_with(lookup, "CSE_FANOUT_WORKERS", &mut fanout.max_concurrent_dispatches)?;
        Ok(())
    }

    /// Reject settings the services cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cse_id.trim().is_empty() {
            return Err(invalid("cse_id", "must not be empty"));
        }

        let polling = &self.polling;
        for (field, value) in [
            ("polling.max_poll_wait_ms", polling.max_poll_wait_ms),
            ("polling.default_response_wait_ms", polling.default_response_wait_ms),
            ("polling.request_ttl_ms", polling.request_ttl_ms),
            ("polling.sweep_interval_ms", polling.sweep_interval_ms),
            ("fanout.job_timeout_ms", self.fanout.job_timeout_ms),
        ] {
            if value == 0 {
                return Err(invalid(field, "must be greater than zero"));
            }
        }
        if polling.mailbox_capacity == 0 {
            return Err(invalid("polling.mailbox_capacity", "must be greater than zero"));
        }
        if self.fanout.max_concurrent_dispatches == 0 {
            return Err(invalid(
                "fanout.max_concurrent_dispatches",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

fn override_with<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    slot: &mut T,
) -> Result<(), ConfigError> {
    if let Some(value) = lookup(var) {
        *slot = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidEnv { var, value })?;
    }
    Ok(())
}
