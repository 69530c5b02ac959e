//! Configuration schema types.
//!
//! This module defines the structure of the nested configuration sections.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry policy section.
///
/// Delays grow as `initial_delay_ms * multiplier^attempt`, capped at
/// `max_delay_ms`, then spread by up to `±jitter` of themselves.
///
/// # Example
///
/// ```
/// use storefront_config::RetryConfig;
///
/// let config = RetryConfig::default();
/// assert_eq!(config.max_retries, 3);
/// assert_eq!(config.initial_delay().as_millis(), 100);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Retries after the first attempt. 0 disables retrying.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Upper bound for any delay, in milliseconds.
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Growth factor between retries.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Random spread as a fraction of the delay (0.0..=1.0).
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl RetryConfig {
    /// Returns the initial delay.
    #[must_use]
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Returns the maximum delay.
    #[must_use]
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            multiplier: default_multiplier(),
            jitter: default_jitter(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay() -> u64 {
    100
}

fn default_max_delay() -> u64 {
    5_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_jitter() -> f64 {
    0.2
}

/// Telemetry section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TelemetrySection {
    /// Record per-call telemetry.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Background flush interval in milliseconds. 0 disables it.
    #[serde(default)]
    pub flush_interval_ms: u64,
}

impl TelemetrySection {
    /// Returns the flush interval, or `None` when disabled.
    #[must_use]
    pub fn flush_interval(&self) -> Option<Duration> {
        (self.flush_interval_ms > 0).then(|| Duration::from_millis(self.flush_interval_ms))
    }
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            enabled: true,
            flush_interval_ms: 0,
        }
    }
}

/// Session section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Refresh a user token that expires within this many seconds.
    #[serde(default = "default_refresh_threshold")]
    pub refresh_threshold_secs: u64,

    /// Refresh token lifetime with "remember me", in seconds.
    #[serde(default = "default_remember_me_max_age")]
    pub remember_me_max_age_secs: u64,

    /// Refresh token lifetime otherwise, in seconds.
    #[serde(default = "default_max_age")]
    pub default_max_age_secs: u64,
}

impl SessionConfig {
    /// Returns the refresh threshold.
    #[must_use]
    pub fn refresh_threshold(&self) -> Duration {
        Duration::from_secs(self.refresh_threshold_secs)
    }

    /// Returns the max-age for the given login policy.
    #[must_use]
    pub fn max_age(&self, remember_me: bool) -> Duration {
        if remember_me {
            Duration::from_secs(self.remember_me_max_age_secs)
        } else {
            Duration::from_secs(self.default_max_age_secs)
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_threshold_secs: default_refresh_threshold(),
            remember_me_max_age_secs: default_remember_me_max_age(),
            default_max_age_secs: default_max_age(),
        }
    }
}

fn default_refresh_threshold() -> u64 {
    60
}

fn default_remember_me_max_age() -> u64 {
    30 * 24 * 60 * 60
}

fn default_max_age() -> u64 {
    24 * 60 * 60
}

fn default_true() -> bool {
    true
}
