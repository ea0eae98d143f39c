//! Watch loop configuration
//!
//! ```toml
//! [watch]
//! version_period_ms = 10000   # 0 disables versioned watching
//! idle_poll_ms = 1000
//! event_buffer_size = 16
//! fetch_timeout_ms = 0        # 0 means no timeout
//! failure_policy = "halt_all" # or "isolate_path"
//! ```

use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// What the watch loop does when a fetch fails.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Any fetch error stops all watching.
    #[default]
    HaltAll,
    /// Drop only the failing path and keep watching the others.
    /// Systemic backend errors still stop the loop.
    IsolatePath,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct WatchConfig {
    /// How often versioned secrets are polled for a higher version
    ///
    /// Constant across all versioned paths. `0` disables versioned watching
    /// entirely: versioned paths are loaded once but never enqueued.
    ///
    /// Default: 0
    #[serde(default)]
    pub version_period_ms: u64,

    /// Bounded wait of the idle state (empty queue)
    ///
    /// The loop also wakes up early when a new path is registered.
    ///
    /// Range: 10-60000
    /// Default: 1000
    #[serde(default = "default_idle_poll_ms")]
    pub idle_poll_ms: u64,

    /// Capacity of the subscriber event channel
    ///
    /// When full, the loop blocks until the subscriber catches up.
    ///
    /// Default: 16
    #[serde(default = "default_event_buffer_size")]
    pub event_buffer_size: usize,

    /// Upper bound for a single backend fetch (`0` = no timeout)
    ///
    /// A timed out fetch is treated like any other fetch error.
    #[serde(default)]
    pub fetch_timeout_ms: u64,

    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

fn default_idle_poll_ms() -> u64 {
    1000
}

fn default_event_buffer_size() -> usize {
    16
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            version_period_ms: 0,
            idle_poll_ms: default_idle_poll_ms(),
            event_buffer_size: default_event_buffer_size(),
            fetch_timeout_ms: 0,
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl WatchConfig {
    pub fn versioned_enabled(&self) -> bool {
        self.version_period_ms != 0
    }

    pub fn version_period(&self) -> Duration {
        Duration::from_millis(self.version_period_ms)
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        (self.fetch_timeout_ms != 0).then(|| Duration::from_millis(self.fetch_timeout_ms))
    }

    /// Validates configuration parameters
    ///
    /// Returns error if:
    /// - `version_period_ms` is neither 0 nor at least 10
    /// - `idle_poll_ms` is out of range (10-60000)
    /// - `event_buffer_size` is 0
    pub fn validate(&self) -> Result<()> {
        if self.version_period_ms != 0 && self.version_period_ms < 10 {
            return Err(Error::Config(ConfigError::Message(format!(
                "version_period_ms must be 0 (disabled) or at least 10, got {}",
                self.version_period_ms
            ))));
        }

        if !(10..=60_000).contains(&self.idle_poll_ms) {
            return Err(Error::Config(ConfigError::Message(format!(
                "idle_poll_ms must be between 10 and 60000, got {}",
                self.idle_poll_ms
            ))));
        }

        // tokio mpsc panics on a zero capacity
        if self.event_buffer_size == 0 {
            return Err(Error::Config(ConfigError::Message(
                "event_buffer_size must be at least 1".to_string(),
            )));
        }

        Ok(())
    }
}
