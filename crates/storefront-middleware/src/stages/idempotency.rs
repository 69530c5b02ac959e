//! Idempotency key middleware.
//!
//! Mutations get a fresh `x-idempotency-key` so the backend can deduplicate
//! replays. Queries pass through untouched.

use crate::middleware::{BoxFuture, Middleware, Next};
use storefront_core::{Operation, OperationContext, Response, SdkResult};
use uuid::Uuid;

/// Header carrying the idempotency key.
pub const IDEMPOTENCY_KEY_HEADER: &str = "x-idempotency-key";

/// Middleware that tags mutations with a unique idempotency key.
///
/// The key is generated once per call. Stages further in (including retry)
/// see the same key, so every attempt of one logical call is deduplicated
/// together.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdempotencyMiddleware;

impl Middleware for IdempotencyMiddleware {
    fn name(&self) -> &'static str {
        "idempotency"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut OperationContext,
        operation: &'a Operation,
        next: Next<'a>,
    ) -> BoxFuture<'a, SdkResult<Response>> {
        Box::pin(async move {
            if ctx.is_mutation() {
                let key = Uuid::new_v4();
                ctx.set_idempotency_key(key);
                ctx.set_header(IDEMPOTENCY_KEY_HEADER, key.to_string());
            }

            next.run(ctx, operation).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::test_support::{recording_transport, run_stage};

    fn mutation() -> Operation {
        Operation::new("AddToCart", "mutation AddToCart($sku: ID!) { addItem(sku: $sku) { id } }")
    }

    #[tokio::test]
    async fn test_mutation_gets_key() {
        let (transport, seen) = recording_transport();

        let (result, ctx) = run_stage(&IdempotencyMiddleware, &mutation(), &transport).await;
        assert!(result.is_ok());

        let key = ctx.idempotency_key().unwrap();
        assert_eq!(key.get_version_num(), 4);
        assert_eq!(seen.lock()[0][IDEMPOTENCY_KEY_HEADER], key.to_string());
    }

    #[tokio::test]
    async fn test_keys_differ_between_calls() {
        let (transport, _seen) = recording_transport();

        let (_, first) = run_stage(&IdempotencyMiddleware, &mutation(), &transport).await;
        let (_, second) = run_stage(&IdempotencyMiddleware, &mutation(), &transport).await;
        assert_ne!(first.idempotency_key(), second.idempotency_key());
    }

    #[tokio::test]
    async fn test_query_untouched() {
        let (transport, seen) = recording_transport();
        let op = Operation::new("Cart", "query Cart { cart { id } }");

        let (_, ctx) = run_stage(&IdempotencyMiddleware, &op, &transport).await;
        assert!(ctx.idempotency_key().is_none());
        assert!(!seen.lock()[0].contains_key(IDEMPOTENCY_KEY_HEADER));
    }

    #[tokio::test]
    async fn test_anonymous_mutation_detected() {
        let (transport, _seen) = recording_transport();
        let op = Operation::new("Logout", "  mutation { logout }");

        let (_, ctx) = run_stage(&IdempotencyMiddleware, &op, &transport).await;
        assert!(ctx.idempotency_key().is_some());
    }
}
