//! Telemetry middleware.
//!
//! Records the duration and outcome of every settled call in a shared
//! [`TelemetryCollector`], and keeps the in-flight gauge current.
//!
//! ## Outcomes
//!
//! | Result | Collector call |
//! |--------|----------------|
//! | `Ok` | `record_success(elapsed)` |
//! | `Err` (timeout) | `record_error(elapsed, true)` |
//! | `Err` (other) | `record_error(elapsed, false)` |
//! | dropped before settling | `record_error(elapsed, true)` |
//!
//! The last row covers the timeout stage abandoning the wait: the call never
//! settles here, but it did time out from the caller's point of view.

use crate::middleware::{BoxFuture, Middleware, Next};
use std::sync::Arc;
use std::time::Instant;
use storefront_core::{Operation, OperationContext, Response, SdkResult};
use storefront_telemetry::metrics::InFlightGuard;
use storefront_telemetry::TelemetryCollector;

/// Middleware that feeds a [`TelemetryCollector`].
#[derive(Debug, Clone)]
pub struct TelemetryMiddleware {
    collector: Arc<TelemetryCollector>,
}

impl TelemetryMiddleware {
    /// Creates a telemetry middleware recording into `collector`.
    #[must_use]
    pub fn new(collector: Arc<TelemetryCollector>) -> Self {
        Self { collector }
    }

    /// Returns the collector.
    #[must_use]
    pub fn collector(&self) -> &Arc<TelemetryCollector> {
        &self.collector
    }
}

/// Records an abandoned call as a timeout if dropped unsettled.
struct SettleGuard<'c> {
    collector: &'c TelemetryCollector,
    started_at: Instant,
    settled: bool,
}

impl Drop for SettleGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.collector.record_error(self.started_at.elapsed(), true);
        }
    }
}

impl Middleware for TelemetryMiddleware {
    fn name(&self) -> &'static str {
        "telemetry"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut OperationContext,
        operation: &'a Operation,
        next: Next<'a>,
    ) -> BoxFuture<'a, SdkResult<Response>> {
        Box::pin(async move {
            let _in_flight = InFlightGuard::new();
            let mut settle = SettleGuard {
                collector: &self.collector,
                started_at: ctx.started_at(),
                settled: false,
            };

            let result = next.run(ctx, operation).await;

            let elapsed = ctx.elapsed();
            match &result {
                Ok(_) => self.collector.record_success(elapsed),
                Err(e) => self.collector.record_error(elapsed, e.is_timeout()),
            }
            settle.settled = true;

            result
        })
    }
}
