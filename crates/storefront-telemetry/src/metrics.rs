//! `metrics` facade emission.
//!
//! The collector mirrors every record into the global `metrics` recorder.
//! Installing an exporter is left to the host; without one these calls are
//! no-ops.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `storefront_requests_total` | Counter | `outcome` | Settled operations |
//! | `storefront_request_duration_seconds` | Histogram | `outcome` | Operation latency |
//! | `storefront_retries_total` | Counter | - | Retry attempts |
//! | `storefront_in_flight_requests` | Gauge | - | Operations currently running |

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Duration;

/// Settled call outcome, used as the `outcome` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// The call succeeded.
    Success,
    /// The call failed with a non-timeout error.
    Error,
    /// The call timed out.
    Timeout,
}

impl Outcome {
    /// Returns the label value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Timeout => "timeout",
        }
    }
}

/// Registers descriptions for all standard metrics.
///
/// Call once after installing a recorder.
pub fn describe_metrics() {
    describe_counter!(
        "storefront_requests_total",
        "Total number of SDK operations settled, by outcome"
    );
    describe_histogram!(
        "storefront_request_duration_seconds",
        "SDK operation duration in seconds"
    );
    describe_counter!(
        "storefront_retries_total",
        "Total number of retry attempts"
    );
    describe_gauge!(
        "storefront_in_flight_requests",
        "Number of SDK operations currently running"
    );
}

/// Records a settled operation.
pub fn record_request(outcome: Outcome, duration: Duration) {
    counter!("storefront_requests_total", "outcome" => outcome.as_str()).increment(1);
    histogram!("storefront_request_duration_seconds", "outcome" => outcome.as_str())
        .record(duration.as_secs_f64());
}

/// Records one retry attempt.
pub fn record_retry() {
    counter!("storefront_retries_total").increment(1);
}

/// Guard that tracks an in-flight operation until dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    _private: (),
}

impl InFlightGuard {
    /// Creates a new guard and increments the in-flight gauge.
    #[must_use]
    pub fn new() -> Self {
        gauge!("storefront_in_flight_requests").increment(1.0);
        Self { _private: () }
    }
}

impl Default for InFlightGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!("storefront_in_flight_requests").decrement(1.0);
    }
}
