//! Typed configuration for the Storefront SDK.
//!
//! This crate provides a strongly-typed configuration system with support for:
//! - TOML and JSON configuration files
//! - Environment variable overrides
//! - Strict validation (fails on unknown fields)
//! - Layered configuration (defaults → file → env)
//!
//! # Overview
//!
//! [`ClientConfig`] holds every client option:
//!
//! - `endpoint`, `sdk_version`, `timeout_ms`, `log_level` - top-level call settings
//! - [`RetryConfig`] - Backoff policy for transient failures
//! - [`TelemetrySection`] - Collector on/off and flush interval
//! - [`SessionConfig`] - Token refresh threshold and max-age policies
//!
//! # Example
//!
//! ```no_run
//! use storefront_config::ConfigLoader;
//!
//! # fn main() -> Result<(), storefront_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_optional_file("storefront.toml")?
//!     .with_dotenv()?
//!     .with_env_prefix("STOREFRONT")
//!     .load()?;
//!
//! println!("Calling {}", config.endpoint);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! endpoint = "https://shop.example.com/graphql"
//! timeout_ms = 10000
//! log_level = "info"
//!
//! [retry]
//! max_retries = 3
//! initial_delay_ms = 100
//! max_delay_ms = 5000
//! multiplier = 2.0
//! jitter = 0.2
//!
//! [telemetry]
//! enabled = true
//! flush_interval_ms = 60000
//!
//! [session]
//! refresh_threshold_secs = 60
//! remember_me_max_age_secs = 2592000
//! default_max_age_secs = 86400
//! ```
//!
//! # Environment Variable Overrides
//!
//! Values can be overridden via environment variables using the format
//! `PREFIX__SECTION__KEY`. For example:
//!
//! - `STOREFRONT__ENDPOINT=https://staging.example.com/graphql`
//! - `STOREFRONT__RETRY__MAX_RETRIES=5`
//! - `STOREFRONT__TELEMETRY__ENABLED=false`

#![warn(missing_docs)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::*;
pub use error::ConfigError;
pub use loader::{ConfigLoader, DEFAULT_ENV_PREFIX};
pub use schema::*;

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
