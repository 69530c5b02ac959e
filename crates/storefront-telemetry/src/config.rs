//! Telemetry configuration.

use crate::logging::LogConfig;
use std::time::Duration;

/// Configuration for the collector and logging setup.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Whether per-call telemetry is recorded.
    pub enabled: bool,

    /// Interval of the background flush. `None` disables it.
    pub flush_interval: Option<Duration>,

    /// Logging configuration.
    pub logging: LogConfig,
}

impl TelemetryConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> TelemetryConfigBuilder {
        TelemetryConfigBuilder::new()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            flush_interval: None,
            logging: LogConfig::default(),
        }
    }
}

/// Builder for [`TelemetryConfig`].
#[derive(Debug, Default)]
pub struct TelemetryConfigBuilder {
    enabled: Option<bool>,
    flush_interval: Option<Duration>,
    logging: Option<LogConfig>,
}

impl TelemetryConfigBuilder {
    /// Creates a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables collection.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    /// Sets the background flush interval. A zero interval disables it.
    #[must_use]
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = Some(interval);
        self
    }

    /// Sets the logging configuration.
    #[must_use]
    pub fn logging(mut self, config: LogConfig) -> Self {
        self.logging = Some(config);
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> TelemetryConfig {
        let defaults = TelemetryConfig::default();
        TelemetryConfig {
            enabled: self.enabled.unwrap_or(defaults.enabled),
            flush_interval: self.flush_interval.filter(|d| !d.is_zero()),
            logging: self.logging.unwrap_or(defaults.logging),
        }
    }
}
