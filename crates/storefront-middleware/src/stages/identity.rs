//! Request identity middleware.
//!
//! Stamps every outgoing call with a fresh request ID and the SDK version.
//!
//! ## Headers
//!
//! - `x-request-id`: UUID v4, also stored on the [`OperationContext`]
//! - `x-sdk-version`: the configured SDK version string

use crate::middleware::{BoxFuture, Middleware, Next};
use storefront_core::{Operation, OperationContext, RequestId, Response, SdkResult};

/// Header carrying the per-call request ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Header carrying the SDK version.
pub const SDK_VERSION_HEADER: &str = "x-sdk-version";

/// Middleware that assigns a request ID and reports the SDK version.
///
/// A new ID is generated for every call, replacing whatever the context was
/// created with, so stages further in all see the same value the server
/// receives.
///
/// # Example
///
/// ```
/// use storefront_middleware::stages::IdentityMiddleware;
/// use storefront_middleware::Middleware;
///
/// let middleware = IdentityMiddleware::new("1.4.0");
/// assert_eq!(middleware.name(), "identity");
/// assert_eq!(middleware.sdk_version(), "1.4.0");
/// ```
#[derive(Debug, Clone)]
pub struct IdentityMiddleware {
    sdk_version: String,
}

impl IdentityMiddleware {
    /// Creates a new identity middleware reporting `sdk_version`.
    #[must_use]
    pub fn new(sdk_version: impl Into<String>) -> Self {
        Self {
            sdk_version: sdk_version.into(),
        }
    }

    /// Returns the reported SDK version.
    #[must_use]
    pub fn sdk_version(&self) -> &str {
        &self.sdk_version
    }
}

impl Middleware for IdentityMiddleware {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut OperationContext,
        operation: &'a Operation,
        next: Next<'a>,
    ) -> BoxFuture<'a, SdkResult<Response>> {
        Box::pin(async move {
            let request_id = RequestId::new();
            ctx.set_request_id(request_id);
            ctx.set_header(REQUEST_ID_HEADER, request_id.to_string());
            ctx.set_header(SDK_VERSION_HEADER, self.sdk_version.clone());

            next.run(ctx, operation).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::test_support::{recording_transport, run_stage};

    fn query() -> Operation {
        Operation::new("Products", "query Products { products { id } }")
    }

    #[tokio::test]
    async fn test_sets_request_id_and_version() {
        let middleware = IdentityMiddleware::new("2.0.1");
        let (transport, seen) = recording_transport();

        let (result, ctx) = run_stage(&middleware, &query(), &transport).await;
        assert!(result.is_ok());

        let headers = seen.lock()[0].clone();
        assert_eq!(headers[SDK_VERSION_HEADER], "2.0.1");
        assert_eq!(headers[REQUEST_ID_HEADER], ctx.request_id().to_string());
    }

    #[tokio::test]
    async fn test_request_id_is_uuid_v4() {
        let middleware = IdentityMiddleware::new("1.0.0");
        let (transport, _seen) = recording_transport();

        let (_, ctx) = run_stage(&middleware, &query(), &transport).await;
        assert_eq!(ctx.request_id().as_uuid().get_version_num(), 4);
    }

    #[tokio::test]
    async fn test_fresh_id_per_call() {
        let middleware = IdentityMiddleware::new("1.0.0");
        let (transport, _seen) = recording_transport();

        let (_, first) = run_stage(&middleware, &query(), &transport).await;
        let (_, second) = run_stage(&middleware, &query(), &transport).await;
        assert_ne!(first.request_id(), second.request_id());
    }

    #[tokio::test]
    async fn test_replaces_initial_context_id() {
        let middleware = IdentityMiddleware::new("1.0.0");
        let (transport, _seen) = recording_transport();
        let op = query();

        let mut ctx = OperationContext::new(&op);
        let initial = ctx.request_id();
        middleware
            .process(&mut ctx, &op, Next::new(&[], &transport))
            .await
            .unwrap();
        assert_ne!(ctx.request_id(), initial);
    }

    #[test]
    fn test_middleware_name() {
        assert_eq!(IdentityMiddleware::new("1.0.0").name(), "identity");
    }
}
