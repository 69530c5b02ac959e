//! Core middleware trait and types.
//!
//! This module defines the [`Middleware`] trait that all pipeline stages
//! implement, the [`Transport`] trait for the terminal send, and the [`Next`]
//! continuation that links them.
//!
//! # Example
//!
//! ```
//! use storefront_middleware::{BoxFuture, Middleware, Next};
//! use storefront_core::{Operation, OperationContext, Response, SdkResult};
//!
//! struct Tagging;
//!
//! impl Middleware for Tagging {
//!     fn name(&self) -> &'static str {
//!         "tagging"
//!     }
//!
//!     fn process<'a>(
//!         &'a self,
//!         ctx: &'a mut OperationContext,
//!         operation: &'a Operation,
//!         next: Next<'a>,
//!     ) -> BoxFuture<'a, SdkResult<Response>> {
//!         Box::pin(async move {
//!             ctx.set_header("x-client", "storefront");
//!             next.run(ctx, operation).await
//!         })
//!     }
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use storefront_core::{Operation, OperationContext, Response, SdkResult};

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A type-erased middleware that can be stored in a vector.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// The core middleware trait.
///
/// Middleware receives the mutable operation context, the operation, and a
/// [`Next`] continuation for the rest of the chain. It may mutate the context
/// before forwarding, inspect or transform the outcome after, or
/// short-circuit by returning without calling `next`.
///
/// # Invariants
///
/// - Middleware SHOULD call `next.run()` at most once per logical attempt
/// - Middleware SHOULD NOT suppress errors from downstream middleware
pub trait Middleware: Send + Sync + 'static {
    /// Returns the unique name of this middleware stage.
    ///
    /// This name is used for logging and debugging.
    fn name(&self) -> &'static str;

    /// Process the operation through this middleware.
    fn process<'a>(
        &'a self,
        ctx: &'a mut OperationContext,
        operation: &'a Operation,
        next: Next<'a>,
    ) -> BoxFuture<'a, SdkResult<Response>>;
}

/// The terminal step of a pipeline: actually sends the operation.
pub trait Transport: Send + Sync + 'static {
    /// Sends the operation with the headers accumulated on `ctx`.
    fn send<'a>(
        &'a self,
        ctx: &'a OperationContext,
        operation: &'a Operation,
    ) -> BoxFuture<'a, SdkResult<Response>>;
}

/// Continuation for the remainder of the chain.
///
/// `Next` is `Copy`: a stage that needs to re-run the rest of the chain (the
/// retry stage) simply calls [`Next::run`] again.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    stages: &'a [BoxedMiddleware],
    transport: &'a dyn Transport,
}

impl std::fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next")
            .field(
                "stages",
                &self.stages.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl<'a> Next<'a> {
    /// Creates a continuation over `stages`, ending at `transport`.
    pub fn new(stages: &'a [BoxedMiddleware], transport: &'a dyn Transport) -> Self {
        Self { stages, transport }
    }

    /// Invokes the next middleware, or the transport at the end of the chain.
    pub fn run<'b>(
        self,
        ctx: &'b mut OperationContext,
        operation: &'b Operation,
    ) -> BoxFuture<'b, SdkResult<Response>>
    where
        'a: 'b,
    {
        match self.stages.split_first() {
            Some((stage, rest)) => stage.process(
                ctx,
                operation,
                Next {
                    stages: rest,
                    transport: self.transport,
                },
            ),
            None => self.transport.send(ctx, operation),
        }
    }

    /// Returns the number of stages left before the transport.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.stages.len()
    }
}

/// A middleware that can be created from a closure.
///
/// # Example
///
/// ```
/// use futures_util::FutureExt;
/// use storefront_middleware::FnMiddleware;
///
/// let stamp = FnMiddleware::new("stamp", |ctx, operation, next| {
///     async move {
///         ctx.set_header("x-stamp", "1");
///         next.run(ctx, operation).await
///     }
///     .boxed()
/// });
/// ```
pub struct FnMiddleware<F> {
    name: &'static str,
    func: F,
}

impl<F> FnMiddleware<F>
where
    F: for<'a> Fn(
            &'a mut OperationContext,
            &'a Operation,
            Next<'a>,
        ) -> BoxFuture<'a, SdkResult<Response>>
        + Send
        + Sync
        + 'static,
{
    /// Creates a new closure-based middleware.
    pub const fn new(name: &'static str, func: F) -> Self {
        Self { name, func }
    }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(
            &'a mut OperationContext,
            &'a Operation,
            Next<'a>,
        ) -> BoxFuture<'a, SdkResult<Response>>
        + Send
        + Sync
        + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut OperationContext,
        operation: &'a Operation,
        next: Next<'a>,
    ) -> BoxFuture<'a, SdkResult<Response>> {
        (self.func)(ctx, operation, next)
    }
}

/// A transport created from a closure.
///
/// The closure sees the context and operation by reference and returns an
/// owned future, so it must copy out whatever it needs.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use storefront_core::Response;
/// use storefront_middleware::FnTransport;
///
/// let transport = FnTransport::new(|_ctx, operation| {
///     let name = operation.name().to_string();
///     async move { Ok(Response::new(json!({ "echo": name }))) }
/// });
/// ```
pub struct FnTransport<F> {
    func: F,
}

impl<F, Fut> FnTransport<F>
where
    F: Fn(&OperationContext, &Operation) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = SdkResult<Response>> + Send + 'static,
{
    /// Creates a new closure-based transport.
    pub const fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F, Fut> Transport for FnTransport<F>
where
    F: Fn(&OperationContext, &Operation) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = SdkResult<Response>> + Send + 'static,
{
    fn send<'a>(
        &'a self,
        ctx: &'a OperationContext,
        operation: &'a Operation,
    ) -> BoxFuture<'a, SdkResult<Response>> {
        Box::pin((self.func)(ctx, operation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::FutureExt;
    use serde_json::json;

    struct Visit {
        name: &'static str,
    }

    impl Middleware for Visit {
        fn name(&self) -> &'static str {
            self.name
        }

        fn process<'a>(
            &'a self,
            ctx: &'a mut OperationContext,
            operation: &'a Operation,
            next: Next<'a>,
        ) -> BoxFuture<'a, SdkResult<Response>> {
            Box::pin(async move {
                let seen = ctx.header("x-visited").unwrap_or_default().to_string();
                ctx.set_header("x-visited", format!("{seen}{}", self.name));
                next.run(ctx, operation).await
            })
        }
    }

    fn echo_headers() -> impl Transport {
        FnTransport::new(|ctx: &OperationContext, _op: &Operation| {
            let visited = ctx.header("x-visited").unwrap_or_default().to_string();
            async move { Ok(Response::new(json!({ "visited": visited }))) }
        })
    }

    fn operation() -> Operation {
        Operation::new("Me", "query Me { me { id } }")
    }

    #[tokio::test]
    async fn test_empty_chain_reaches_transport() {
        let transport = echo_headers();
        let op = operation();
        let mut ctx = OperationContext::new(&op);

        let next = Next::new(&[], &transport);
        assert_eq!(next.remaining(), 0);
        let response = next.run(&mut ctx, &op).await.unwrap();
        assert_eq!(response.data["visited"], "");
    }

    #[tokio::test]
    async fn test_chain_runs_in_order() {
        let stages: Vec<BoxedMiddleware> = vec![
            Arc::new(Visit { name: "a" }),
            Arc::new(Visit { name: "b" }),
        ];
        let transport = echo_headers();
        let op = operation();
        let mut ctx = OperationContext::new(&op);

        let response = Next::new(&stages, &transport)
            .run(&mut ctx, &op)
            .await
            .unwrap();
        assert_eq!(response.data["visited"], "ab");
    }

    #[tokio::test]
    async fn test_next_can_run_twice() {
        let stages: Vec<BoxedMiddleware> = vec![Arc::new(Visit { name: "x" })];
        let transport = echo_headers();
        let op = operation();
        let mut ctx = OperationContext::new(&op);

        let next = Next::new(&stages, &transport);
        next.run(&mut ctx, &op).await.unwrap();
        let response = next.run(&mut ctx, &op).await.unwrap();
        assert_eq!(response.data["visited"], "xx");
    }

    #[tokio::test]
    async fn test_fn_middleware_can_short_circuit() {
        let stages: Vec<BoxedMiddleware> = vec![Arc::new(FnMiddleware::new(
            "cache",
            |_ctx, _op, _next| async { Ok(Response::new(json!({ "cached": true }))) }.boxed(),
        ))];
        let transport = FnTransport::new(|_ctx: &OperationContext, _op: &Operation| async {
            Err(storefront_core::SdkError::network("transport reached", None))
        });
        let op = operation();
        let mut ctx = OperationContext::new(&op);

        let response = Next::new(&stages, &transport)
            .run(&mut ctx, &op)
            .await
            .unwrap();
        assert_eq!(response.data["cached"], true);
        assert_eq!(stages[0].name(), "cache");
    }
}
