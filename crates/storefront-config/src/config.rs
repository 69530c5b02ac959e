//! Main configuration types.
//!
//! This module provides the top-level [`ClientConfig`] struct and its builder.

use serde::{Deserialize, Serialize};
use storefront_core::LogLevel;

use crate::{ConfigError, RetryConfig, SessionConfig, TelemetrySection};

/// Default backend endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:4000/graphql";

/// Default per-call timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: i64 = 30_000;

/// Complete SDK client configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load configuration from files
/// and environment variables.
///
/// # Example
///
/// ```
/// use storefront_config::ClientConfig;
///
/// let config = ClientConfig::default();
/// assert_eq!(config.timeout_ms, 30_000);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Backend endpoint URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Version reported in `x-sdk-version`.
    #[serde(default = "default_sdk_version")]
    pub sdk_version: String,

    /// Per-call timeout in milliseconds. Zero or negative disables it.
    #[serde(default = "default_timeout")]
    pub timeout_ms: i64,

    /// Minimum level for request logging.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Retry policy.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Telemetry settings.
    #[serde(default)]
    pub telemetry: TelemetrySection,

    /// Session settings.
    #[serde(default)]
    pub session: SessionConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            sdk_version: default_sdk_version(),
            timeout_ms: default_timeout(),
            log_level: LogLevel::default(),
            retry: RetryConfig::default(),
            telemetry: TelemetrySection::default(),
            session: SessionConfig::default(),
        }
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_sdk_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_timeout() -> i64 {
    DEFAULT_TIMEOUT_MS
}

impl ClientConfig {
    /// Create a new configuration builder.
    ///
    /// # Example
    ///
    /// ```
    /// use storefront_config::ClientConfig;
    ///
    /// let config = ClientConfig::builder()
    ///     .endpoint("https://shop.example.com/graphql")
    ///     .timeout_ms(5_000)
    ///     .build();
    ///
    /// assert_eq!(config.endpoint, "https://shop.example.com/graphql");
    /// ```
    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - The endpoint is not an absolute http(s) URL
    /// - The SDK version is empty
    /// - The retry multiplier is below 1.0 or jitter is outside 0.0..=1.0
    /// - The initial retry delay exceeds the maximum delay
    pub fn validate(&self) -> Result<(), ConfigError> {
        let uri: http::Uri = self.endpoint.parse().map_err(|e| {
            ConfigError::invalid_value("endpoint", format!("invalid URL {}: {e}", self.endpoint))
        })?;
        match uri.scheme_str() {
            Some("http" | "https") => {}
            _ => {
                return Err(ConfigError::invalid_value(
                    "endpoint",
                    format!("expected an http or https URL: {}", self.endpoint),
                ))
            }
        }
        if uri.host().is_none() {
            return Err(ConfigError::invalid_value(
                "endpoint",
                format!("missing host: {}", self.endpoint),
            ));
        }

        if self.sdk_version.trim().is_empty() {
            return Err(ConfigError::invalid_value("sdk_version", "must not be empty"));
        }

        if !self.retry.multiplier.is_finite() || self.retry.multiplier < 1.0 {
            return Err(ConfigError::invalid_value(
                "retry.multiplier",
                "must be at least 1.0",
            ));
        }

        if !(0.0..=1.0).contains(&self.retry.jitter) {
            return Err(ConfigError::invalid_value(
                "retry.jitter",
                "must be between 0.0 and 1.0",
            ));
        }

        if self.retry.initial_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::invalid_value(
                "retry.initial_delay_ms",
                "must not exceed retry.max_delay_ms",
            ));
        }

        Ok(())
    }

    /// Create a development configuration preset.
    ///
    /// Debug request logging and no retries, so failures surface at once.
    ///
    /// # Example
    ///
    /// ```
    /// use storefront_config::ClientConfig;
    /// use storefront_core::LogLevel;
    ///
    /// let config = ClientConfig::development();
    /// assert_eq!(config.log_level, LogLevel::Debug);
    /// ```
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.log_level = LogLevel::Debug;
        config.retry.max_retries = 0;
        config
    }

    /// Create a production configuration preset.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.log_level = LogLevel::Error;
        config.telemetry.flush_interval_ms = 60_000;
        config
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    endpoint: Option<String>,
    sdk_version: Option<String>,
    timeout_ms: Option<i64>,
    log_level: Option<LogLevel>,
    retry: Option<RetryConfig>,
    telemetry: Option<TelemetrySection>,
    session: Option<SessionConfig>,
}

impl ClientConfigBuilder {
    /// Create a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the endpoint URL.
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the reported SDK version.
    #[must_use]
    pub fn sdk_version(mut self, version: impl Into<String>) -> Self {
        self.sdk_version = Some(version.into());
        self
    }

    /// Set the per-call timeout in milliseconds.
    #[must_use]
    pub fn timeout_ms(mut self, timeout_ms: i64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Set the request log level.
    #[must_use]
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = Some(level);
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Set the telemetry section.
    #[must_use]
    pub fn telemetry(mut self, telemetry: TelemetrySection) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Set the session section.
    #[must_use]
    pub fn session(mut self, session: SessionConfig) -> Self {
        self.session = Some(session);
        self
    }

    /// Build the configuration.
    ///
    /// Any unset fields use their default values.
    #[must_use]
    pub fn build(self) -> ClientConfig {
        let defaults = ClientConfig::default();
        ClientConfig {
            endpoint: self.endpoint.unwrap_or(defaults.endpoint),
            sdk_version: self.sdk_version.unwrap_or(defaults.sdk_version),
            timeout_ms: self.timeout_ms.unwrap_or(defaults.timeout_ms),
            log_level: self.log_level.unwrap_or(defaults.log_level),
            retry: self.retry.unwrap_or(defaults.retry),
            telemetry: self.telemetry.unwrap_or(defaults.telemetry),
            session: self.session.unwrap_or(defaults.session),
        }
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if validation fails.
    pub fn build_validated(self) -> Result<ClientConfig, ConfigError> {
        let config = self.build();
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.log_level, LogLevel::Warn);
        assert!(!config.sdk_version.is_empty());
        assert!(config.telemetry.enabled);
    }

    #[test]
    fn test_builder_overrides() {
        let config = ClientConfig::builder()
            .endpoint("https://api.example.com/graphql")
            .sdk_version("9.9.9")
            .timeout_ms(0)
            .log_level(LogLevel::Info)
            .build();

        assert_eq!(config.endpoint, "https://api.example.com/graphql");
        assert_eq!(config.sdk_version, "9.9.9");
        assert_eq!(config.timeout_ms, 0);
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.retry, RetryConfig::default());
    }

    #[test]
    fn test_validate_default() {
        assert!(ClientConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_endpoint() {
        for endpoint in ["not a url", "ftp://example.com/graphql", "/graphql"] {
            let result = ClientConfig::builder().endpoint(endpoint).build_validated();
            assert!(result.is_err(), "{endpoint} should be rejected");
        }
    }

    #[test]
    fn test_validate_rejects_bad_retry() {
        let result = ClientConfig::builder()
            .retry(RetryConfig {
                multiplier: 0.5,
                ..Default::default()
            })
            .build_validated();
        assert!(result.is_err());

        let result = ClientConfig::builder()
            .retry(RetryConfig {
                jitter: 1.5,
                ..Default::default()
            })
            .build_validated();
        assert!(result.is_err());

        let result = ClientConfig::builder()
            .retry(RetryConfig {
                initial_delay_ms: 10_000,
                ..Default::default()
            })
            .build_validated();
        assert!(result.is_err());
    }

    #[test]
    fn test_presets() {
        assert_eq!(ClientConfig::development().retry.max_retries, 0);
        assert_eq!(ClientConfig::production().log_level, LogLevel::Error);
        assert!(ClientConfig::production().validate().is_ok());
    }
}
