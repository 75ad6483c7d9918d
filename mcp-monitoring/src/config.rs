//! Monitoring configuration

use crate::error::{MonitorError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Largest accepted event bus capacity
pub const MAX_EVENT_BUFFER: usize = 1 << 16;

/// Monitoring configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Maximum number of activity records retained (oldest evicted first)
    pub activity_capacity: usize,
    /// Number of activity records embedded in every snapshot
    pub snapshot_activity_len: usize,
    /// Records returned by the activity feed when no limit is given
    pub default_activity_limit: usize,
    /// Maximum characters kept from a parameter or result summary
    pub summary_max_chars: usize,
    /// Latency samples retained per call group
    pub latency_sample_limit: usize,
    /// Interval between periodic snapshots pushed to live subscribers
    pub snapshot_interval_ms: u64,
    /// Capacity of the in-process event bus, at most [`MAX_EVENT_BUFFER`]
    pub event_buffer: usize,
    /// Distinct endpoints tracked before further ones share [`OVERFLOW_ENDPOINT`]
    ///
    /// [`OVERFLOW_ENDPOINT`]: crate::metrics::OVERFLOW_ENDPOINT
    pub endpoint_limit: usize,
    /// Health components registered as `unknown` at start and after reset
    pub components: Vec<String>,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            activity_capacity: 100,
            snapshot_activity_len: 20,
            default_activity_limit: 50,
            summary_max_chars: 200,
            latency_sample_limit: 1000,
            snapshot_interval_ms: 2000,
            event_buffer: 1024,
            endpoint_limit: 100,
            components: vec!["app".to_string(), "mcp".to_string(), "model".to_string()],
        }
    }
}

impl MonitoringConfig {
    /// Build a configuration from `MONITOR_*` environment variables,
    /// falling back to the defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let components = env::var("MONITOR_COMPONENTS")
            .ok()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|names| !names.is_empty())
            .unwrap_or(defaults.components);

        Self {
            activity_capacity: env_or("MONITOR_ACTIVITY_CAPACITY", defaults.activity_capacity),
            snapshot_activity_len: env_or(
                "MONITOR_SNAPSHOT_ACTIVITY",
                defaults.snapshot_activity_len,
            ),
            default_activity_limit: env_or(
                "MONITOR_ACTIVITY_LIMIT",
                defaults.default_activity_limit,
            ),
            summary_max_chars: env_or("MONITOR_SUMMARY_MAX_CHARS", defaults.summary_max_chars),
            latency_sample_limit: env_or(
                "MONITOR_LATENCY_SAMPLES",
                defaults.latency_sample_limit,
            ),
            snapshot_interval_ms: env_or(
                "MONITOR_SNAPSHOT_INTERVAL_MS",
                defaults.snapshot_interval_ms,
            ),
            event_buffer: env_or("MONITOR_EVENT_BUFFER", defaults.event_buffer),
            endpoint_limit: env_or("MONITOR_ENDPOINT_LIMIT", defaults.endpoint_limit),
            components,
        }
    }

    /// Reject settings that would make the stores or timers degenerate
    pub fn validate(&self) -> Result<()> {
        if self.activity_capacity == 0 {
            return Err(MonitorError::config("activity_capacity must be at least 1"));
        }
        if self.snapshot_interval_ms == 0 {
            return Err(MonitorError::config("snapshot_interval_ms must be at least 1"));
        }
        if self.event_buffer == 0 {
            return Err(MonitorError::config("event_buffer must be at least 1"));
        }
        if self.event_buffer > MAX_EVENT_BUFFER {
            return Err(MonitorError::config(format!(
                "event_buffer must be at most {MAX_EVENT_BUFFER}"
            )));
        }
        if self.endpoint_limit == 0 {
            return Err(MonitorError::config("endpoint_limit must be at least 1"));
        }
        Ok(())
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
