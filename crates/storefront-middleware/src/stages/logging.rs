//! Request logging middleware.
//!
//! Emits one line before the call is forwarded and one after it settles:
//!
//! ```text
//! [3f2c...] GetCart starting                       (debug)
//! [3f2c...] GetCart completed in 42ms              (info)
//! [3f2c...] GetCart failed after 42ms: timed out   (error)
//! ```
//!
//! Lines below the configured [`LogLevel`] are dropped; `LogLevel::None`
//! silences the stage entirely. By default lines become `tracing` events
//! with `request_id`, `operation` and `duration_ms` fields. A custom sink
//! can replace that.

use crate::middleware::{BoxFuture, Middleware, Next};
use std::sync::Arc;
use storefront_core::{LogLevel, Operation, OperationContext, RequestId, Response, SdkResult};
use storefront_telemetry::logging::fields;

/// A single log line produced by [`LoggingMiddleware`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Severity of the line.
    pub level: LogLevel,
    /// The call's request ID.
    pub request_id: RequestId,
    /// Name of the operation.
    pub operation: String,
    /// Elapsed milliseconds, present on completion lines.
    pub duration_ms: Option<u64>,
    /// Rendered line.
    pub message: String,
}

/// Destination for log records.
pub type LogSink = Arc<dyn Fn(&LogRecord) + Send + Sync>;

/// Middleware that logs call start and completion.
#[derive(Clone)]
pub struct LoggingMiddleware {
    level: LogLevel,
    sink: LogSink,
}

impl std::fmt::Debug for LoggingMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggingMiddleware")
            .field("level", &self.level)
            .finish_non_exhaustive()
    }
}

impl LoggingMiddleware {
    /// Creates a logging middleware that writes `tracing` events.
    #[must_use]
    pub fn new(level: LogLevel) -> Self {
        Self::with_sink(level, Arc::new(emit_tracing))
    }

    /// Creates a logging middleware with a custom sink.
    #[must_use]
    pub fn with_sink(level: LogLevel, sink: LogSink) -> Self {
        Self { level, sink }
    }

    /// Returns the configured minimum level.
    #[must_use]
    pub const fn level(&self) -> LogLevel {
        self.level
    }

    fn log(&self, ctx: &OperationContext, level: LogLevel, duration_ms: Option<u64>, tail: &str) {
        if !self.level.allows(level) {
            return;
        }
        let record = LogRecord {
            level,
            request_id: ctx.request_id(),
            operation: ctx.operation_name().to_string(),
            duration_ms,
            message: format!("[{}] {} {tail}", ctx.request_id(), ctx.operation_name()),
        };
        (self.sink)(&record);
    }
}

fn emit_tracing(record: &LogRecord) {
    let request_id = record.request_id.to_string();
    let duration_ms = record.duration_ms.unwrap_or_default();
    match record.level {
        LogLevel::Error => tracing::error!(
            { fields::REQUEST_ID } = %request_id,
            { fields::OPERATION } = %record.operation,
            { fields::DURATION_MS } = duration_ms,
            "{}",
            record.message
        ),
        LogLevel::Warn => tracing::warn!(
            { fields::REQUEST_ID } = %request_id,
            { fields::OPERATION } = %record.operation,
            { fields::DURATION_MS } = duration_ms,
            "{}",
            record.message
        ),
        LogLevel::Info => tracing::info!(
            { fields::REQUEST_ID } = %request_id,
            { fields::OPERATION } = %record.operation,
            { fields::DURATION_MS } = duration_ms,
            "{}",
            record.message
        ),
        LogLevel::Debug => tracing::debug!(
            { fields::REQUEST_ID } = %request_id,
            { fields::OPERATION } = %record.operation,
            "{}",
            record.message
        ),
        LogLevel::None => {}
    }
}

impl Middleware for LoggingMiddleware {
    fn name(&self) -> &'static str {
        "logging"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut OperationContext,
        operation: &'a Operation,
        next: Next<'a>,
    ) -> BoxFuture<'a, SdkResult<Response>> {
        Box::pin(async move {
            self.log(ctx, LogLevel::Debug, None, "starting");

            let result = next.run(ctx, operation).await;

            let elapsed = ctx.elapsed_ms();
            match &result {
                Ok(_) => self.log(
                    ctx,
                    LogLevel::Info,
                    Some(elapsed),
                    &format!("completed in {elapsed}ms"),
                ),
                Err(e) => self.log(
                    ctx,
                    LogLevel::Error,
                    Some(elapsed),
                    &format!("failed after {elapsed}ms: {e}"),
                ),
            }

            result
        })
    }
}
