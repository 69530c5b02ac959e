//! Standard middleware stages.
//!
//! In reference order, outermost first:
//!
//! 1. [`identity`] - Request ID and SDK version headers
//! 2. [`idempotency`] - Idempotency key for mutations
//! 3. [`logging`] - Start/completion lines
//! 4. [`interceptor`] - User hooks
//! 5. [`timeout`] - Per-call timeout
//! 6. [`telemetry`] - Duration and outcome recording
//! 7. [`retry`] - Exponential backoff

pub mod idempotency;
pub mod identity;
pub mod interceptor;
pub mod logging;
pub mod retry;
pub mod telemetry;
pub mod timeout;

// Re-export main types
pub use idempotency::IdempotencyMiddleware;
pub use identity::IdentityMiddleware;
pub use interceptor::{InterceptorMiddleware, Interceptors, OnRequest};
pub use logging::{LogRecord, LogSink, LoggingMiddleware};
pub use retry::{RetryMiddleware, RetryPolicy};
pub use telemetry::TelemetryMiddleware;
pub use timeout::TimeoutMiddleware;

#[cfg(test)]
pub(crate) mod test_support {
    use crate::middleware::{FnTransport, Middleware, Next, Transport};
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;
    use storefront_core::{Headers, Operation, OperationContext, Response, SdkResult};

    /// A transport that succeeds and records the headers of every call.
    pub(crate) fn recording_transport() -> (impl Transport, Arc<Mutex<Vec<Headers>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let transport = FnTransport::new(move |ctx: &OperationContext, _op: &Operation| {
            sink.lock().push(ctx.headers().clone());
            async { Ok(Response::new(json!({}))) }
        });
        (transport, seen)
    }

    /// Runs a single stage in front of `transport` with a fresh context.
    pub(crate) async fn run_stage<M: Middleware>(
        stage: &M,
        operation: &Operation,
        transport: &dyn Transport,
    ) -> (SdkResult<Response>, OperationContext) {
        let mut ctx = OperationContext::new(operation);
        let result = stage
            .process(&mut ctx, operation, Next::new(&[], transport))
            .await;
        (result, ctx)
    }
}
