//! User interceptor hooks.
//!
//! Three optional hooks observe every call:
//!
//! - `on_request` (sync or async) sees a [`RequestContext`] and may add or
//!   replace headers; its changes are merged into the outgoing call. If it
//!   fails or panics the call is aborted before anything is sent.
//! - `on_response` sees a [`ResponseContext`] after success.
//! - `on_error` sees an [`ErrorContext`] after failure.
//!
//! Failures in `on_response` and `on_error` are logged at debug level and
//! discarded; the caller always receives the original outcome.

use crate::middleware::{BoxFuture, Middleware, Next};
use futures_util::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use storefront_core::{
    ErrorContext, HookError, Operation, OperationContext, RequestContext, Response,
    ResponseContext, SdkError, SdkResult,
};

/// Synchronous request hook.
pub type RequestHook = Arc<dyn Fn(&mut RequestContext) -> Result<(), HookError> + Send + Sync>;

/// Asynchronous request hook. Returns the (possibly modified) context.
pub type AsyncRequestHook = Arc<
    dyn Fn(RequestContext) -> BoxFuture<'static, Result<RequestContext, HookError>> + Send + Sync,
>;

/// Hook called after a successful call.
pub type ResponseHook = Arc<dyn Fn(&ResponseContext) -> Result<(), HookError> + Send + Sync>;

/// Hook called after a failed call.
pub type ErrorHook = Arc<dyn Fn(&ErrorContext) -> Result<(), HookError> + Send + Sync>;

/// A request hook in either flavour.
#[derive(Clone)]
pub enum OnRequest {
    /// Runs inline.
    Sync(RequestHook),
    /// Awaited before the call is forwarded.
    Async(AsyncRequestHook),
}

/// The set of user hooks for a client.
///
/// # Example
///
/// ```
/// use storefront_middleware::stages::Interceptors;
///
/// let interceptors = Interceptors::new()
///     .on_request(|ctx| {
///         ctx.headers.insert("x-tenant".into(), "acme".into());
///         Ok(())
///     })
///     .on_error(|ctx| {
///         eprintln!("{} failed: {}", ctx.operation_name, ctx.error);
///         Ok(())
///     });
///
/// assert!(!interceptors.is_empty());
/// ```
#[derive(Clone, Default)]
pub struct Interceptors {
    on_request: Option<OnRequest>,
    on_response: Option<ResponseHook>,
    on_error: Option<ErrorHook>,
}

impl std::fmt::Debug for Interceptors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interceptors")
            .field("on_request", &self.on_request.is_some())
            .field("on_response", &self.on_response.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

impl Interceptors {
    /// Creates an empty hook set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a synchronous `on_request` hook.
    #[must_use]
    pub fn on_request<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut RequestContext) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.on_request = Some(OnRequest::Sync(Arc::new(hook)));
        self
    }

    /// Sets an asynchronous `on_request` hook.
    #[must_use]
    pub fn on_request_async<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<RequestContext, HookError>> + Send + 'static,
    {
        self.on_request = Some(OnRequest::Async(Arc::new(move |ctx| {
            Box::pin(hook(ctx)) as BoxFuture<'static, _>
        })));
        self
    }

    /// Sets the `on_response` hook.
    #[must_use]
    pub fn on_response<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ResponseContext) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.on_response = Some(Arc::new(hook));
        self
    }

    /// Sets the `on_error` hook.
    #[must_use]
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ErrorContext) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(hook));
        self
    }

    /// Returns `true` if no hook is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.on_request.is_none() && self.on_response.is_none() && self.on_error.is_none()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> HookError {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    HookError::new(format!("hook panicked: {detail}"))
}

fn call_guarded<T>(hook: impl FnOnce() -> Result<T, HookError>) -> Result<T, HookError> {
    catch_unwind(AssertUnwindSafe(hook)).unwrap_or_else(|payload| Err(panic_message(&*payload)))
}

/// Middleware that runs the user's [`Interceptors`].
#[derive(Debug, Clone, Default)]
pub struct InterceptorMiddleware {
    interceptors: Interceptors,
}

impl InterceptorMiddleware {
    /// Creates the middleware from a hook set.
    #[must_use]
    pub fn new(interceptors: Interceptors) -> Self {
        Self { interceptors }
    }

    async fn before(&self, request: RequestContext) -> Result<RequestContext, HookError> {
        match &self.interceptors.on_request {
            None => Ok(request),
            Some(OnRequest::Sync(hook)) => {
                let mut request = request;
                call_guarded(|| hook(&mut request))?;
                Ok(request)
            }
            Some(OnRequest::Async(hook)) => {
                let future = call_guarded(|| Ok(hook(request)))?;
                AssertUnwindSafe(future)
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|payload| Err(panic_message(&*payload)))
            }
        }
    }
}

impl Middleware for InterceptorMiddleware {
    fn name(&self) -> &'static str {
        "interceptor"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut OperationContext,
        operation: &'a Operation,
        next: Next<'a>,
    ) -> BoxFuture<'a, SdkResult<Response>> {
        Box::pin(async move {
            match self.before(ctx.to_request_context()).await {
                Ok(request) => ctx.merge_headers(request.headers),
                Err(e) => {
                    tracing::debug!(
                        request_id = %ctx.request_id(),
                        error = %e,
                        "on_request hook rejected the call"
                    );
                    return Err(SdkError::Interceptor(e));
                }
            }

            let result = next.run(ctx, operation).await;

            match &result {
                Ok(response) => {
                    if let Some(hook) = &self.interceptors.on_response {
                        let view = ctx.to_response_context(response.data.clone());
                        if let Err(e) = call_guarded(|| hook(&view)) {
                            tracing::debug!(request_id = %ctx.request_id(), error = %e, "on_response hook failed");
                        }
                    }
                }
                Err(error) => {
                    if let Some(hook) = &self.interceptors.on_error {
                        let view = ctx.to_error_context(error.clone());
                        if let Err(e) = call_guarded(|| hook(&view)) {
                            tracing::debug!(request_id = %ctx.request_id(), error = %e, "on_error hook failed");
                        }
                    }
                }
            }

            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::FnTransport;
    use crate::stages::test_support::{recording_transport, run_stage};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn query() -> Operation {
        Operation::new("Products", "query Products { products { id } }")
    }

    #[tokio::test]
    async fn test_sync_hook_headers_are_merged() {
        let middleware = InterceptorMiddleware::new(Interceptors::new().on_request(|ctx| {
            ctx.headers.insert("x-tenant".into(), "acme".into());
            Ok(())
        }));
        let (transport, seen) = recording_transport();

        let (result, ctx) = run_stage(&middleware, &query(), &transport).await;
        assert!(result.is_ok());
        assert_eq!(ctx.header("x-tenant"), Some("acme"));
        assert_eq!(seen.lock()[0]["x-tenant"], "acme");
    }

    #[tokio::test]
    async fn test_async_hook_headers_are_merged() {
        let middleware =
            InterceptorMiddleware::new(Interceptors::new().on_request_async(|mut ctx| async move {
                tokio::task::yield_now().await;
                ctx.headers.insert("x-async".into(), "yes".into());
                Ok(ctx)
            }));
        let (transport, seen) = recording_transport();

        run_stage(&middleware, &query(), &transport).await;
        assert_eq!(seen.lock()[0]["x-async"], "yes");
    }

    #[tokio::test]
    async fn test_request_hook_error_aborts() {
        let middleware = InterceptorMiddleware::new(
            Interceptors::new().on_request(|_ctx| Err(HookError::new("blocked"))),
        );
        let (transport, seen) = recording_transport();

        let (result, _) = run_stage(&middleware, &query(), &transport).await;
        let err = result.unwrap_err();
        assert_eq!(err.code(), "INTERCEPTOR_ERROR");
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_request_hook_panic_aborts() {
        let middleware =
            InterceptorMiddleware::new(Interceptors::new().on_request(|_ctx| panic!("boom")));
        let (transport, seen) = recording_transport();

        let (result, _) = run_stage(&middleware, &query(), &transport).await;
        match result.unwrap_err() {
            SdkError::Interceptor(e) => assert!(e.message.contains("boom")),
            other => panic!("unexpected error: {other}"),
        }
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_async_hook_panic_aborts() {
        let middleware = InterceptorMiddleware::new(Interceptors::new().on_request_async(
            |_ctx| async move {
                if true {
                    panic!("async boom");
                }
                Err(HookError::new("unreachable"))
            },
        ));
        let (transport, seen) = recording_transport();

        let (result, _) = run_stage(&middleware, &query(), &transport).await;
        assert!(matches!(result, Err(SdkError::Interceptor(_))));
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_response_hook_failure_is_swallowed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let middleware = InterceptorMiddleware::new(Interceptors::new().on_response(move |ctx| {
            counter.fetch_add(1, Ordering::SeqCst);
            assert_eq!(ctx.operation_name, "Products");
            Err(HookError::new("ignored"))
        }));
        let (transport, _seen) = recording_transport();

        let (result, _) = run_stage(&middleware, &query(), &transport).await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_error_hook_sees_error_and_panic_is_swallowed() {
        let codes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&codes);
        let middleware = InterceptorMiddleware::new(Interceptors::new().on_error(move |ctx| {
            sink.lock().push(ctx.error.code());
            panic!("hook exploded");
        }));
        let transport = FnTransport::new(|_ctx: &OperationContext, _op: &Operation| async {
            Err(SdkError::http_status(503, None))
        });

        let (result, _) = run_stage(&middleware, &query(), &transport).await;
        assert_eq!(result.unwrap_err().code(), "NETWORK_ERROR");
        assert_eq!(*codes.lock(), vec!["NETWORK_ERROR"]);
    }

    #[tokio::test]
    async fn test_empty_interceptors_pass_through() {
        let middleware = InterceptorMiddleware::default();
        let (transport, seen) = recording_transport();

        let (result, _) = run_stage(&middleware, &query(), &transport).await;
        assert!(result.is_ok());
        assert_eq!(seen.lock().len(), 1);
        assert!(Interceptors::new().is_empty());
    }
}
