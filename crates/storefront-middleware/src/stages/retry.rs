//! Retry middleware with exponential backoff.
//!
//! Re-runs the rest of the chain when it fails with a retryable error
//! (see [`SdkError::is_retryable`]). The delay before retry `n` (zero-based)
//! is `initial_delay * multiplier^n`, capped at `max_delay`, then spread by
//! a random factor in `1 ± jitter`. A rate-limited response's
//! `retry_after_seconds` wins when it is longer.
//!
//! When every attempt fails with a retryable error the last one is wrapped in
//! [`SdkError::RetryExhausted`].

use crate::middleware::{BoxFuture, Middleware, Next};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use storefront_config::RetryConfig;
use storefront_core::{Operation, OperationContext, Response, SdkError, SdkResult};
use storefront_telemetry::logging::fields;
use storefront_telemetry::TelemetryCollector;

/// Backoff parameters.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use storefront_middleware::stages::RetryPolicy;
///
/// let policy = RetryPolicy::default().with_jitter(0.0);
/// assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
/// assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(800));
/// assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(5));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Growth factor per retry.
    pub multiplier: f64,
    /// Random spread as a fraction of the delay, `0.0..=1.0`.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    /// Builds a policy from configuration.
    #[must_use]
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: config.initial_delay(),
            max_delay: config.max_delay(),
            multiplier: config.multiplier,
            jitter: config.jitter,
        }
    }

    /// Returns a copy with a different jitter fraction.
    #[must_use]
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    /// Returns the un-jittered delay before retry `attempt` (zero-based).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let millis = self.initial_delay.as_secs_f64() * 1000.0 * self.multiplier.powi(exponent);
        let max_millis = self.max_delay.as_secs_f64() * 1000.0;
        if !millis.is_finite() || millis >= max_millis {
            return self.max_delay;
        }
        Duration::from_secs_f64(millis.max(0.0) / 1000.0)
    }

    /// Returns the delay before retry `attempt` with jitter applied.
    #[must_use]
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let base = self.delay_for_attempt(attempt);
        let jitter = self.jitter.clamp(0.0, 1.0);
        if jitter == 0.0 {
            return base;
        }
        let factor = 1.0 + rand::thread_rng().gen_range(-jitter..=jitter);
        base.mul_f64(factor.max(0.0))
    }

    /// Returns the delay to wait after `error` before retry `attempt`.
    #[must_use]
    pub fn delay_after(&self, error: &SdkError, attempt: u32) -> Duration {
        let computed = self.jittered_delay(attempt);
        match error {
            SdkError::RateLimited {
                retry_after_seconds: Some(seconds),
                ..
            } => computed.max(Duration::from_secs(*seconds)),
            _ => computed,
        }
    }
}

/// Middleware that retries retryable failures.
#[derive(Debug, Clone)]
pub struct RetryMiddleware {
    policy: RetryPolicy,
    collector: Option<Arc<TelemetryCollector>>,
}

impl RetryMiddleware {
    /// Creates a retry middleware.
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            collector: None,
        }
    }

    /// Counts each retry in `collector`.
    #[must_use]
    pub fn with_collector(mut self, collector: Arc<TelemetryCollector>) -> Self {
        self.collector = Some(collector);
        self
    }

    /// Returns the policy.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl Middleware for RetryMiddleware {
    fn name(&self) -> &'static str {
        "retry"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut OperationContext,
        operation: &'a Operation,
        next: Next<'a>,
    ) -> BoxFuture<'a, SdkResult<Response>> {
        Box::pin(async move {
            let mut attempt = 0;
            loop {
                let error = match next.run(ctx, operation).await {
                    Ok(response) => return Ok(response),
                    Err(e) => e,
                };

                if !error.is_retryable() {
                    return Err(error);
                }
                if attempt >= self.policy.max_retries {
                    if self.policy.max_retries == 0 {
                        return Err(error);
                    }
                    return Err(SdkError::retry_exhausted(ctx.request_id(), attempt + 1, error));
                }

                let delay = self.policy.delay_after(&error, attempt);
                attempt += 1;
                ctx.increment_retry();
                if let Some(collector) = &self.collector {
                    collector.record_retry();
                }
                tracing::debug!(
                    { fields::REQUEST_ID } = %ctx.request_id(),
                    { fields::RETRY_COUNT } = attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    { fields::ERROR } = %error,
                    "retrying operation"
                );

                tokio::time::sleep(delay).await;
            }
        })
    }
}
