//! Ordered middleware pipeline.
//!
//! A [`Pipeline`] is an ordered list of middleware ending in a [`Transport`].
//! The first registered stage wraps all the others, so it sees the operation
//! first on the way in and the outcome last on the way out.
//!
//! ## Standard Stages
//!
//! [`Pipeline::standard`] assembles the reference order:
//!
//! 1. **Identity** - Fresh request ID, `x-request-id` and `x-sdk-version`
//! 2. **Idempotency** - `x-idempotency-key` on mutations
//! 3. **Logging** - Starting/completed/failed lines
//! 4. **Interceptor** - User `on_request`/`on_response`/`on_error` hooks
//! 5. **Timeout** - Caps the wait for everything below it
//! 6. **Telemetry** - Records duration and outcome (when a collector is given)
//! 7. **Retry** - Re-runs the transport on retryable failures (when enabled)
//!
//! Idempotency sits outside retry, so every attempt of one call carries the
//! same key.

use crate::middleware::{BoxedMiddleware, Middleware, Next, Transport};
use crate::stages::{
    IdempotencyMiddleware, IdentityMiddleware, Interceptors, InterceptorMiddleware,
    LoggingMiddleware, RetryMiddleware, RetryPolicy, TelemetryMiddleware, TimeoutMiddleware,
};
use std::sync::Arc;
use storefront_config::ClientConfig;
use storefront_core::{Operation, OperationContext, Response, SdkResult};
use storefront_telemetry::TelemetryCollector;

/// An ordered middleware chain with its terminal transport.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use storefront_core::{Operation, Response};
/// use storefront_middleware::{FnTransport, Pipeline};
/// use storefront_middleware::stages::IdentityMiddleware;
///
/// let pipeline = Pipeline::builder()
///     .stage(IdentityMiddleware::new("1.0.0"))
///     .build(FnTransport::new(|_ctx, _op| async { Ok(Response::new(json!({}))) }));
///
/// assert_eq!(pipeline.stage_names(), vec!["identity"]);
/// ```
pub struct Pipeline {
    stages: Vec<BoxedMiddleware>,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Builds the standard stage order from a client configuration.
    ///
    /// The telemetry stage is added only when a collector is supplied, and
    /// the retry stage only when `config.retry.max_retries > 0`.
    pub fn standard(
        config: &ClientConfig,
        interceptors: Interceptors,
        collector: Option<Arc<TelemetryCollector>>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let mut builder = Self::builder()
            .stage(IdentityMiddleware::new(config.sdk_version.clone()))
            .stage(IdempotencyMiddleware)
            .stage(LoggingMiddleware::new(config.log_level))
            .stage(InterceptorMiddleware::new(interceptors))
            .stage(TimeoutMiddleware::new(config.timeout_ms));

        if let Some(collector) = &collector {
            builder = builder.stage(TelemetryMiddleware::new(Arc::clone(collector)));
        }

        if config.retry.max_retries > 0 {
            let policy = RetryPolicy::from_config(&config.retry);
            let retry = match collector {
                Some(collector) => RetryMiddleware::new(policy).with_collector(collector),
                None => RetryMiddleware::new(policy),
            };
            builder = builder.stage(retry);
        }

        builder.build_arc(transport)
    }

    /// Executes an operation through the whole chain with a fresh context.
    ///
    /// # Errors
    ///
    /// Returns whatever error the first failing stage or the transport
    /// produced.
    pub async fn execute(&self, operation: &Operation) -> SdkResult<Response> {
        let mut ctx = OperationContext::new(operation);
        self.execute_with(&mut ctx, operation).await
    }

    /// Executes an operation with a caller-owned context.
    ///
    /// Useful when the caller wants to inspect headers or the retry count
    /// after the call settles.
    ///
    /// # Errors
    ///
    /// Same as [`execute`](Self::execute).
    pub async fn execute_with(
        &self,
        ctx: &mut OperationContext,
        operation: &Operation,
    ) -> SdkResult<Response> {
        Next::new(&self.stages, self.transport.as_ref())
            .run(ctx, operation)
            .await
    }

    /// Returns the names of all stages in order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|m| m.name()).collect()
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

/// Builder for creating a [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    stages: Vec<BoxedMiddleware>,
}

impl PipelineBuilder {
    /// Creates a new, empty pipeline builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage. Earlier stages wrap later ones.
    #[must_use]
    pub fn stage<M: Middleware>(mut self, middleware: M) -> Self {
        self.stages.push(Arc::new(middleware));
        self
    }

    /// Appends an already shared stage.
    #[must_use]
    pub fn stage_arc(mut self, middleware: BoxedMiddleware) -> Self {
        self.stages.push(middleware);
        self
    }

    /// Builds the pipeline ending in `transport`.
    #[must_use]
    pub fn build<T: Transport>(self, transport: T) -> Pipeline {
        self.build_arc(Arc::new(transport))
    }

    /// Builds the pipeline ending in a shared transport.
    #[must_use]
    pub fn build_arc(self, transport: Arc<dyn Transport>) -> Pipeline {
        Pipeline {
            stages: self.stages,
            transport,
        }
    }
}

/// Standard pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Stage 1: Request ID and SDK version headers
    Identity,
    /// Stage 2: Idempotency key for mutations
    Idempotency,
    /// Stage 3: Request logging
    Logging,
    /// Stage 4: User hooks
    Interceptor,
    /// Stage 5: Per-call timeout
    Timeout,
    /// Stage 6: Duration and outcome recording
    Telemetry,
    /// Stage 7: Backoff and retry
    Retry,
}

impl Stage {
    /// Returns the name of this stage, as reported by its middleware.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Idempotency => "idempotency",
            Self::Logging => "logging",
            Self::Interceptor => "interceptor",
            Self::Timeout => "timeout",
            Self::Telemetry => "telemetry",
            Self::Retry => "retry",
        }
    }

    /// Returns all stages in reference order.
    #[must_use]
    pub const fn all() -> [Stage; 7] {
        [
            Self::Identity,
            Self::Idempotency,
            Self::Logging,
            Self::Interceptor,
            Self::Timeout,
            Self::Telemetry,
            Self::Retry,
        ]
    }
}
