//! End-to-end pipeline integration tests.
//!
//! These tests run the standard stage order against in-process transports
//! and check that the stages cooperate:
//!
//! 1. Identity - Request ID and SDK version
//! 2. Idempotency - Key per mutation, reused across retries
//! 3. Logging - Start and completion lines
//! 4. Interceptor - Header merge, abort, swallowed hook failures
//! 5. Timeout - Caps the whole retry loop
//! 6. Telemetry - Outcome recording
//! 7. Retry - Backoff and exhaustion

use parking_lot::Mutex;
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use storefront_config::{ClientConfig, RetryConfig};
use storefront_core::{
    Headers, HookError, LogLevel, Operation, OperationContext, Response, SdkError,
};
use storefront_middleware::{
    pipeline::{Pipeline, Stage},
    stages::{
        IdempotencyMiddleware, IdentityMiddleware, Interceptors, LogRecord, LoggingMiddleware,
        TimeoutMiddleware,
    },
    FnTransport, Transport,
};
use storefront_telemetry::TelemetryCollector;

type Seen = Arc<Mutex<Vec<Headers>>>;

/// A transport that fails with `error` for the first `failures` calls and
/// records the headers of every call.
fn scripted(failures: u32, error: SdkError) -> (Arc<dyn Transport>, Seen, Arc<AtomicU32>) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let calls = Arc::new(AtomicU32::new(0));
    let (sink, counter) = (Arc::clone(&seen), Arc::clone(&calls));
    let transport = FnTransport::new(move |ctx: &OperationContext, _op: &Operation| {
        sink.lock().push(ctx.headers().clone());
        let call = counter.fetch_add(1, Ordering::SeqCst);
        let error = error.clone();
        async move {
            if call < failures {
                Err(error)
            } else {
                Ok(Response::new(json!({ "ok": true })))
            }
        }
    });
    (Arc::new(transport), seen, calls)
}

fn ok_transport() -> (Arc<dyn Transport>, Seen) {
    let (transport, seen, _) = scripted(0, SdkError::network("unused", None));
    (transport, seen)
}

fn config() -> ClientConfig {
    ClientConfig::builder()
        .sdk_version("3.1.0")
        .log_level(LogLevel::None)
        .retry(RetryConfig {
            jitter: 0.0,
            ..RetryConfig::default()
        })
        .build()
}

fn mutation() -> Operation {
    Operation::new(
        "AddToCart",
        "mutation AddToCart($sku: ID!) { addItem(sku: $sku) { id } }",
    )
    .with_variables(json!({ "sku": "sku-1" }))
}

fn query() -> Operation {
    Operation::new("Products", "query Products { products { id } }")
}

// =============================================================================
// Stage Order Tests
// =============================================================================

#[test]
fn test_standard_pipeline_has_all_stages() {
    let (transport, _) = ok_transport();
    let pipeline = Pipeline::standard(
        &config(),
        Interceptors::new(),
        Some(TelemetryCollector::builder().build()),
        transport,
    );

    assert_eq!(pipeline.stage_count(), 7);
    let expected: Vec<&str> = Stage::all().iter().map(|s| s.name()).collect();
    assert_eq!(pipeline.stage_names(), expected);
}

#[tokio::test]
async fn test_headers_reach_transport() {
    let (transport, seen) = ok_transport();
    let pipeline = Pipeline::standard(&config(), Interceptors::new(), None, transport);

    let op = mutation();
    let mut ctx = OperationContext::new(&op);
    pipeline.execute_with(&mut ctx, &op).await.unwrap();

    let headers = seen.lock()[0].clone();
    assert_eq!(headers["x-sdk-version"], "3.1.0");
    assert_eq!(headers["x-request-id"], ctx.request_id().to_string());
    assert_eq!(
        headers["x-idempotency-key"],
        ctx.idempotency_key().unwrap().to_string()
    );
}

// =============================================================================
// Idempotency Tests
// =============================================================================

#[tokio::test]
async fn test_two_mutations_get_distinct_keys() {
    let (transport, seen) = ok_transport();
    let pipeline = Pipeline::builder()
        .stage(IdentityMiddleware::new("1.0.0"))
        .stage(IdempotencyMiddleware)
        .build_arc(transport);

    pipeline.execute(&mutation()).await.unwrap();
    pipeline.execute(&mutation()).await.unwrap();

    let seen = seen.lock();
    let first = uuid::Uuid::parse_str(&seen[0]["x-idempotency-key"]).unwrap();
    let second = uuid::Uuid::parse_str(&seen[1]["x-idempotency-key"]).unwrap();
    assert_ne!(first, second);
    assert_eq!(first.get_version_num(), 4);
    assert_eq!(second.get_version_num(), 4);
}

#[tokio::test]
async fn test_query_has_no_idempotency_key() {
    let (transport, seen) = ok_transport();
    let pipeline = Pipeline::standard(&config(), Interceptors::new(), None, transport);

    pipeline.execute(&query()).await.unwrap();
    assert!(!seen.lock()[0].contains_key("x-idempotency-key"));
}

#[tokio::test(start_paused = true)]
async fn test_retries_reuse_idempotency_key() {
    let (transport, seen, calls) = scripted(2, SdkError::http_status(502, None));
    let pipeline = Pipeline::standard(&config(), Interceptors::new(), None, transport);

    pipeline.execute(&mutation()).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    let seen = seen.lock();
    let keys: Vec<&str> = seen.iter().map(|h| h["x-idempotency-key"].as_str()).collect();
    assert!(keys.windows(2).all(|w| w[0] == w[1]));
}

// =============================================================================
// Timeout Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_timeout_fires_for_slow_call() {
    let timeout = TimeoutMiddleware::new(50);
    let pipeline = Pipeline::builder()
        .stage(IdentityMiddleware::new("1.0.0"))
        .stage(timeout.clone())
        .build(FnTransport::new(|_ctx: &OperationContext, _op: &Operation| async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(Response::new(json!({})))
        }));

    let op = query();
    let mut ctx = OperationContext::new(&op);
    let err = pipeline.execute_with(&mut ctx, &op).await.unwrap_err();

    match err {
        SdkError::Timeout {
            request_id,
            timeout_ms,
        } => {
            assert_eq!(timeout_ms, 50);
            assert_eq!(request_id, ctx.request_id());
        }
        other => panic!("expected timeout, got {other}"),
    }
    assert_eq!(timeout.active_timers(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_caps_retry_loop() {
    let collector = TelemetryCollector::builder().build();
    let (transport, _seen, calls) = scripted(u32::MAX, SdkError::network("reset", None));
    let config = ClientConfig::builder()
        .timeout_ms(250)
        .log_level(LogLevel::None)
        .retry(RetryConfig {
            max_retries: 10,
            jitter: 0.0,
            ..RetryConfig::default()
        })
        .build();
    let pipeline = Pipeline::standard(
        &config,
        Interceptors::new(),
        Some(Arc::clone(&collector)),
        transport,
    );

    let err = pipeline.execute(&query()).await.unwrap_err();
    assert!(err.is_timeout());
    // Attempts at 0ms, 100ms, 300ms would be three; the 250ms cap allows two.
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let snapshot = collector.snapshot();
    assert_eq!(snapshot.timeout_count, 1);
    assert_eq!(snapshot.retry_count, 2);
}

// =============================================================================
// Interceptor Tests
// =============================================================================

#[tokio::test]
async fn test_interceptor_headers_are_sent() {
    let (transport, seen) = ok_transport();
    let interceptors = Interceptors::new().on_request(|ctx| {
        ctx.headers.insert("x-tenant".into(), "acme".into());
        Ok(())
    });
    let pipeline = Pipeline::standard(&config(), interceptors, None, transport);

    pipeline.execute(&query()).await.unwrap();
    assert_eq!(seen.lock()[0]["x-tenant"], "acme");
}

#[tokio::test]
async fn test_interceptor_sees_identity_headers() {
    let (transport, _seen) = ok_transport();
    let observed = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&observed);
    let interceptors = Interceptors::new().on_request(move |ctx| {
        *sink.lock() = ctx.headers.get("x-request-id").cloned();
        Ok(())
    });
    let pipeline = Pipeline::standard(&config(), interceptors, None, transport);

    let op = query();
    let mut ctx = OperationContext::new(&op);
    pipeline.execute_with(&mut ctx, &op).await.unwrap();
    assert_eq!(*observed.lock(), Some(ctx.request_id().to_string()));
}

#[tokio::test]
async fn test_interceptor_abort_skips_transport() {
    let (transport, seen, calls) = scripted(0, SdkError::network("unused", None));
    let collector = TelemetryCollector::builder().build();
    let interceptors = Interceptors::new().on_request(|_ctx| Err(HookError::new("forbidden")));
    let pipeline = Pipeline::standard(
        &config(),
        interceptors,
        Some(Arc::clone(&collector)),
        transport,
    );

    let err = pipeline.execute(&query()).await.unwrap_err();
    assert_eq!(err.code(), "INTERCEPTOR_ERROR");
    assert!(!err.is_retryable());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(seen.lock().is_empty());
    assert_eq!(collector.snapshot().total_requests, 0);
}

#[tokio::test]
async fn test_response_hook_failure_keeps_result() {
    let (transport, _seen) = ok_transport();
    let interceptors = Interceptors::new().on_response(|_ctx| Err(HookError::new("ignored")));
    let pipeline = Pipeline::standard(&config(), interceptors, None, transport);

    let response = pipeline.execute(&query()).await.unwrap();
    assert_eq!(response.data["ok"], true);
}

// =============================================================================
// Retry Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_retry_exhausted_reports_attempts() {
    let collector = TelemetryCollector::builder().build();
    let (transport, _seen, calls) = scripted(u32::MAX, SdkError::http_status(503, None));
    let pipeline = Pipeline::standard(
        &config(),
        Interceptors::new(),
        Some(Arc::clone(&collector)),
        transport,
    );

    let op = query();
    let mut ctx = OperationContext::new(&op);
    let err = pipeline.execute_with(&mut ctx, &op).await.unwrap_err();

    match &err {
        SdkError::RetryExhausted { attempts, .. } => assert_eq!(*attempts, 4),
        other => panic!("expected retry exhaustion, got {other}"),
    }
    assert_eq!(err.code(), "RETRY_EXHAUSTED");
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(ctx.retry_count(), 3);

    let snapshot = collector.snapshot();
    assert_eq!(snapshot.retry_count, 3);
    assert_eq!(snapshot.error_count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_error_hook_sees_final_error() {
    let codes = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&codes);
    let interceptors = Interceptors::new().on_error(move |ctx| {
        sink.lock().push((ctx.error.code(), ctx.retry_count));
        Ok(())
    });
    let (transport, _seen, _calls) = scripted(u32::MAX, SdkError::network("reset", None));
    let pipeline = Pipeline::standard(&config(), interceptors, None, transport);

    pipeline.execute(&query()).await.unwrap_err();
    assert_eq!(*codes.lock(), vec![("RETRY_EXHAUSTED", 3)]);
}

// =============================================================================
// Logging Tests
// =============================================================================

#[tokio::test]
async fn test_logging_wraps_inner_stages() {
    let records = Arc::new(Mutex::new(Vec::<LogRecord>::new()));
    let sink = Arc::clone(&records);
    let (transport, _seen) = ok_transport();
    let pipeline = Pipeline::builder()
        .stage(IdentityMiddleware::new("1.0.0"))
        .stage(LoggingMiddleware::with_sink(
            LogLevel::Debug,
            Arc::new(move |record: &LogRecord| sink.lock().push(record.clone())),
        ))
        .build_arc(transport);

    let op = query();
    let mut ctx = OperationContext::new(&op);
    pipeline.execute_with(&mut ctx, &op).await.unwrap();

    let records = records.lock();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.request_id == ctx.request_id()));
    assert!(records.iter().all(|r| r.operation == "Products"));
}
