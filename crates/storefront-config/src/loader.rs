//! Configuration loader with layered approach.
//!
//! This module provides the [`ConfigLoader`] for loading configuration from
//! multiple sources: defaults, files, and environment variables.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;

use crate::{ClientConfig, ConfigError};

/// Default environment variable prefix.
pub const DEFAULT_ENV_PREFIX: &str = "STOREFRONT";

/// Configuration loader with layered approach.
///
/// The loader applies configuration in layers, with later layers overriding
/// earlier ones field by field:
/// 1. Default values (built into the code)
/// 2. Configuration files or strings (TOML or JSON), in the order added
/// 3. Environment variables
///
/// # Example
///
/// ```no_run
/// use storefront_config::ConfigLoader;
///
/// # fn main() -> Result<(), storefront_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_defaults()
///     .with_file("storefront.toml")?
///     .with_env_prefix("STOREFRONT")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: ClientConfig,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            env_prefix: None,
        }
    }

    /// Start with default configuration values.
    ///
    /// This is called automatically by `new()`, but can be chained for clarity.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.config = ClientConfig::default();
        self
    }

    /// Start with development preset configuration.
    ///
    /// # Example
    ///
    /// ```
    /// use storefront_config::ConfigLoader;
    /// use storefront_core::LogLevel;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_development()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.log_level, LogLevel::Debug);
    /// ```
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = ClientConfig::development();
        self
    }

    /// Start with production preset configuration.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = ClientConfig::production();
        self
    }

    /// Load configuration from a file.
    ///
    /// Supports TOML (.toml) and JSON (.json) formats, chosen by extension.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - The file does not exist
    /// - The file cannot be read
    /// - The file contains invalid TOML/JSON
    /// - The file contains unknown fields (strict mode)
    pub fn with_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;

        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .ok_or_else(|| {
                ConfigError::validation_error(format!(
                    "unsupported configuration file format: {}",
                    path.display()
                ))
            })?;

        self.with_string(&content, &format)
    }

    /// Load configuration from an optional file.
    ///
    /// If the file exists, loads it. If not, silently continues.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be loaded.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration from a string.
    ///
    /// Fields present in `content` override the current values; absent
    /// fields keep them.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if parsing fails or the format is unsupported.
    ///
    /// # Example
    ///
    /// ```
    /// use storefront_config::ConfigLoader;
    ///
    /// let toml = r#"
    ///     endpoint = "https://shop.example.com/graphql"
    ///
    ///     [retry]
    ///     max_retries = 5
    /// "#;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string(toml, "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.endpoint, "https://shop.example.com/graphql");
    /// assert_eq!(config.retry.max_retries, 5);
    /// assert_eq!(config.retry.initial_delay_ms, 100);
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        let layer: serde_json::Value = match format.to_lowercase().as_str() {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            _ => {
                return Err(ConfigError::validation_error(format!(
                    "unsupported configuration format: {format}"
                )))
            }
        };

        self.merge_layer(layer)?;
        Ok(self)
    }

    /// Set environment variable prefix for overrides.
    ///
    /// Environment variables use the format `PREFIX__SECTION__KEY`.
    /// For example, with prefix "STOREFRONT":
    /// - `STOREFRONT__ENDPOINT=https://shop.example.com/graphql`
    /// - `STOREFRONT__RETRY__MAX_RETRIES=5`
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Load a `.env` file for environment variables.
    ///
    /// A missing `.env` file is not an error.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be parsed.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => Ok(self),
            Err(e) if e.not_found() => Ok(self),
            Err(e) => Err(ConfigError::validation_error(format!(
                "failed to load .env file: {e}"
            ))),
        }
    }

    /// Finalize and return the loaded configuration.
    ///
    /// Applies environment variable overrides (if a prefix was set) and
    /// validates the final configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Environment variable parsing fails
    /// - Configuration validation fails
    pub fn load(mut self) -> Result<ClientConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            self.apply_env_overrides(&prefix)?;
        }

        self.config.validate()?;

        Ok(self.config)
    }

    /// Finalize without validation.
    #[must_use]
    pub fn load_unvalidated(self) -> ClientConfig {
        self.config
    }

    // Merge a parsed layer over the current config
    fn merge_layer(&mut self, layer: serde_json::Value) -> Result<(), ConfigError> {
        let mut base = serde_json::to_value(&self.config)?;
        merge_values(&mut base, layer);
        self.config = serde_json::from_value(base)?;
        Ok(())
    }

    // Apply environment variable overrides
    fn apply_env_overrides(&mut self, prefix: &str) -> Result<(), ConfigError> {
        let env_vars: BTreeMap<String, String> = env::vars()
            .filter(|(k, _)| k.starts_with(prefix))
            .collect();

        for (key, value) in env_vars {
            self.apply_env_var(&key, &value, prefix)?;
        }

        Ok(())
    }

    // Apply a single environment variable
    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let Some(key_without_prefix) = key.strip_prefix(prefix).and_then(|k| k.strip_prefix("__"))
        else {
            // Shares the prefix but not the separator (e.g. STOREFRONTX).
            return Ok(());
        };

        let parts: Vec<&str> = key_without_prefix.split("__").collect();
        let config = &mut self.config;

        match parts.as_slice() {
            ["ENDPOINT"] => config.endpoint = value.to_string(),
            ["SDK_VERSION"] => config.sdk_version = value.to_string(),
            ["TIMEOUT_MS"] => config.timeout_ms = parse_number(key, value)?,
            ["LOG_LEVEL"] => {
                config.log_level = value
                    .parse()
                    .map_err(|e: String| ConfigError::env_parse_error(key, e))?;
            }

            // Retry section
            ["RETRY", "MAX_RETRIES"] => config.retry.max_retries = parse_number(key, value)?,
            ["RETRY", "INITIAL_DELAY_MS"] => {
                config.retry.initial_delay_ms = parse_number(key, value)?;
            }
            ["RETRY", "MAX_DELAY_MS"] => config.retry.max_delay_ms = parse_number(key, value)?,
            ["RETRY", "MULTIPLIER"] => config.retry.multiplier = parse_float(key, value)?,
            ["RETRY", "JITTER"] => config.retry.jitter = parse_float(key, value)?,

            // Telemetry section
            ["TELEMETRY", "ENABLED"] => {
                config.telemetry.enabled = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
            }
            ["TELEMETRY", "FLUSH_INTERVAL_MS"] => {
                config.telemetry.flush_interval_ms = parse_number(key, value)?;
            }

            // Session section
            ["SESSION", "REFRESH_THRESHOLD_SECS"] => {
                config.session.refresh_threshold_secs = parse_number(key, value)?;
            }
            ["SESSION", "REMEMBER_ME_MAX_AGE_SECS"] => {
                config.session.remember_me_max_age_secs = parse_number(key, value)?;
            }
            ["SESSION", "DEFAULT_MAX_AGE_SECS"] => {
                config.session.default_max_age_secs = parse_number(key, value)?;
            }

            // Unknown key - ignore
            _ => {}
        }

        Ok(())
    }
}

/// Recursively overlays `layer` onto `base`. Objects merge; anything else
/// replaces.
fn merge_values(base: &mut serde_json::Value, layer: serde_json::Value) {
    match (base, layer) {
        (serde_json::Value::Object(base), serde_json::Value::Object(layer)) => {
            for (key, value) in layer {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, layer) => *base = layer,
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::env_parse_error(key, "expected integer"))
}

fn parse_float(key: &str, value: &str) -> Result<f64, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::env_parse_error(key, "expected float"))
}

/// Parse a boolean from a string.
fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
