//! Per-call timeout middleware.
//!
//! Races the rest of the chain against a timer. If the timer fires first the
//! caller gets [`SdkError::Timeout`]; the inner future is dropped, which
//! abandons the wait but not a request already handed to a detached
//! transport task.

use crate::middleware::{BoxFuture, Middleware, Next};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use storefront_core::{Operation, OperationContext, Response, SdkError, SdkResult};

/// Middleware that fails calls exceeding a fixed duration.
///
/// A `timeout_ms` of zero or less disables the stage.
///
/// # Example
///
/// ```
/// use storefront_middleware::stages::TimeoutMiddleware;
///
/// assert!(TimeoutMiddleware::new(0).is_disabled());
/// assert!(!TimeoutMiddleware::new(5_000).is_disabled());
/// ```
#[derive(Debug, Clone)]
pub struct TimeoutMiddleware {
    timeout_ms: i64,
    active: Arc<AtomicUsize>,
}

impl TimeoutMiddleware {
    /// Creates a timeout middleware.
    #[must_use]
    pub fn new(timeout_ms: i64) -> Self {
        Self {
            timeout_ms,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Returns `true` if the stage is a pass-through.
    #[must_use]
    pub const fn is_disabled(&self) -> bool {
        self.timeout_ms <= 0
    }

    /// Number of timers currently armed.
    #[must_use]
    pub fn active_timers(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

/// Decrements the armed-timer count when the call settles or is dropped.
struct TimerGuard(Arc<AtomicUsize>);

impl TimerGuard {
    fn arm(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Middleware for TimeoutMiddleware {
    fn name(&self) -> &'static str {
        "timeout"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut OperationContext,
        operation: &'a Operation,
        next: Next<'a>,
    ) -> BoxFuture<'a, SdkResult<Response>> {
        if self.is_disabled() {
            return next.run(ctx, operation);
        }

        let timeout_ms = self.timeout_ms.unsigned_abs();
        Box::pin(async move {
            let _guard = TimerGuard::arm(&self.active);
            let request_id = ctx.request_id();

            match tokio::time::timeout(Duration::from_millis(timeout_ms), next.run(ctx, operation))
                .await
            {
                Ok(result) => result,
                Err(_) => {
                    tracing::debug!(%request_id, timeout_ms, "operation timed out");
                    Err(SdkError::timeout(request_id, timeout_ms))
                }
            }
        })
    }
}
