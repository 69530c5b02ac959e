//! Telemetry for the Storefront SDK.
//!
//! - **Collector**: in-process call statistics with periodic flush
//! - **Metrics**: mirrors every record into the `metrics` facade
//! - **Logging**: optional `tracing-subscriber` setup for hosts
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `storefront_requests_total` | Counter | `outcome` | Settled operations |
//! | `storefront_request_duration_seconds` | Histogram | `outcome` | Operation latency |
//! | `storefront_retries_total` | Counter | - | Retry attempts |
//! | `storefront_in_flight_requests` | Gauge | - | Operations currently running |
//!
//! # Example
//!
//! ```rust,ignore
//! use storefront_telemetry::{init_telemetry, TelemetryCollector, TelemetryConfig};
//! use std::time::Duration;
//!
//! let config = TelemetryConfig::builder()
//!     .flush_interval(Duration::from_secs(60))
//!     .build();
//! init_telemetry(&config)?;
//!
//! let collector = TelemetryCollector::builder()
//!     .flush_interval(Duration::from_secs(60))
//!     .on_flush(|snapshot| tracing::info!(?snapshot, "telemetry"))
//!     .build();
//! ```

#![warn(missing_docs)]

pub mod collector;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;

pub use collector::{FlushCallback, TelemetryCollector, TelemetryCollectorBuilder, TelemetrySnapshot};
pub use config::{TelemetryConfig, TelemetryConfigBuilder};
pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Initializes logging and registers metric descriptions.
///
/// # Errors
///
/// Returns `TelemetryError` if logging fails to initialize.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryResult<()> {
    init_logging(&config.logging)?;
    metrics::describe_metrics();
    Ok(())
}
