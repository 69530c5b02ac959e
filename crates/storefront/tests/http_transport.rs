//! HTTP transport tests against a local socket.
//!
//! A one-shot responder accepts a single connection, captures the raw
//! request and answers with a canned HTTP/1.1 response after an optional
//! delay.

use serde_json::json;
use std::time::Duration;
use storefront::prelude::*;
use storefront::transport::HttpTransport;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

struct Canned {
    status: &'static str,
    headers: Vec<(&'static str, String)>,
    body: String,
    delay: Duration,
}

impl Canned {
    fn json(body: serde_json::Value) -> Self {
        Self {
            status: "200 OK",
            headers: Vec::new(),
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    fn status(status: &'static str) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: String::new(),
            delay: Duration::ZERO,
        }
    }
}

/// Serves one request; the handle yields the raw request text, lowercased.
async fn serve_once(canned: Canned) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/graphql", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);
            if request_complete(&raw) {
                break;
            }
        }

        tokio::time::sleep(canned.delay).await;
        let mut response = format!(
            "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n",
            canned.status,
            canned.body.len()
        );
        for (name, value) in &canned.headers {
            response.push_str(&format!("{name}: {value}\r\n"));
        }
        response.push_str("\r\n");
        response.push_str(&canned.body);
        let _ = socket.write_all(response.as_bytes()).await;
        let _ = socket.shutdown().await;

        String::from_utf8_lossy(&raw).to_lowercase()
    });

    (url, handle)
}

fn request_complete(raw: &[u8]) -> bool {
    let text = String::from_utf8_lossy(raw);
    let Some(split) = text.find("\r\n\r\n") else {
        return false;
    };
    let length = text[..split]
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    raw.len() >= split + 4 + length
}

fn client(url: &str, timeout_ms: i64) -> Client {
    let mut config = ClientConfig::builder()
        .endpoint(url)
        .timeout_ms(timeout_ms)
        .log_level(LogLevel::None)
        .build();
    config.retry.max_retries = 0;
    let http = reqwest::Client::builder().no_proxy().build().unwrap();
    Client::builder(config)
        .transport(std::sync::Arc::new(HttpTransport::with_client(http, url)))
        .build()
        .unwrap()
}

#[tokio::test]
async fn posts_graphql_body_with_headers() {
    let (url, server) = serve_once(Canned::json(json!({ "data": { "me": { "id": "u-1" } } }))).await;
    let client = client(&url, 5_000);

    let operation = Operation::new("Me", "query Me { me { id } }").with_token("tok-1");
    let response = client.execute(&operation).await.unwrap();
    assert_eq!(response.data, json!({ "me": { "id": "u-1" } }));

    let request = server.await.unwrap();
    assert!(request.starts_with("post /graphql http/1.1"));
    assert!(request.contains("content-type: application/json"));
    assert!(request.contains("authorization: bearer tok-1"));
    assert!(request.contains("x-request-id: "));
    assert!(request.contains("x-sdk-version: "));
    assert!(!request.contains("x-idempotency-key"));
    assert!(request.contains(r#""operationname":"me""#));
}

#[tokio::test]
async fn mutation_carries_idempotency_key() {
    let (url, server) = serve_once(Canned::json(json!({ "data": { "createCart": { "id": "c-1" } } }))).await;
    let client = client(&url, 5_000);

    client
        .execute(&Operation::new("CreateCart", "mutation CreateCart { createCart { id } }"))
        .await
        .unwrap();

    let request = server.await.unwrap();
    assert!(request.contains("x-idempotency-key: "));
    assert!(!request.contains("authorization"));
}

#[tokio::test]
async fn rate_limit_reports_retry_after() {
    let mut canned = Canned::status("429 Too Many Requests");
    canned.headers.push(("retry-after", "2".to_string()));
    let (url, _server) = serve_once(canned).await;

    let err = client(&url, 5_000)
        .execute(&Operation::new("Me", "query Me { me { id } }"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SdkError::RateLimited {
            retry_after_seconds: Some(2),
            request_id: Some(_),
            ..
        }
    ));
}

#[tokio::test]
async fn server_error_is_a_retryable_network_error() {
    let (url, _server) = serve_once(Canned::status("503 Service Unavailable")).await;

    let err = client(&url, 5_000)
        .execute(&Operation::new("Me", "query Me { me { id } }"))
        .await
        .unwrap_err();

    assert!(matches!(err, SdkError::Network { status: Some(503), .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn graphql_errors_surface_typed() {
    let (url, _server) = serve_once(Canned::json(json!({
        "data": null,
        "errors": [{ "message": "cart not found", "extensions": { "code": "NOT_FOUND" } }]
    })))
    .await;

    let err = client(&url, 5_000)
        .execute(&Operation::new("Cart", "query Cart { cart(id: \"x\") { id } }"))
        .await
        .unwrap_err();

    assert!(matches!(err, SdkError::Graphql { .. }));
    assert!(err.request_id().is_some());
}

#[tokio::test]
async fn timeout_does_not_cancel_the_request() {
    let mut canned = Canned::json(json!({ "data": {} }));
    canned.delay = Duration::from_millis(300);
    let (url, server) = serve_once(canned).await;

    let err = client(&url, 50)
        .execute(&Operation::new("Slow", "query Slow { slow }"))
        .await
        .unwrap_err();
    assert!(matches!(err, SdkError::Timeout { timeout_ms: 50, .. }));

    let request = server.await.unwrap();
    assert!(request.contains(r#""operationname":"slow""#));
}

#[tokio::test]
async fn connection_refused_is_a_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/graphql", listener.local_addr().unwrap());
    drop(listener);

    let err = client(&url, 5_000)
        .execute(&Operation::new("Me", "query Me { me { id } }"))
        .await
        .unwrap_err();

    assert!(err.is_network());
    assert!(err.request_id().is_some());
}

#[tokio::test]
async fn unbuildable_request_fails_fast_without_retrying() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/graphql", listener.local_addr().unwrap());

    let mut config = ClientConfig::builder()
        .endpoint(&url)
        .timeout_ms(5_000)
        .log_level(LogLevel::None)
        .build();
    config.retry.jitter = 0.0;
    assert!(config.retry.max_retries > 0);

    let http = reqwest::Client::builder().no_proxy().build().unwrap();
    let client = Client::builder(config)
        .transport(std::sync::Arc::new(HttpTransport::with_client(http, url.as_str())))
        .interceptors(Interceptors::new().on_request(|ctx| {
            ctx.headers.insert("x-broken".into(), "a\nb".into());
            Ok(())
        }))
        .build()
        .unwrap();

    let err = client
        .execute(&Operation::new("Me", "query Me { me { id } }"))
        .await
        .unwrap_err();

    assert!(matches!(err, SdkError::InvalidRequest { request_id: Some(_), .. }));
    assert_eq!(err.code(), "INVALID_REQUEST");
    assert!(!err.is_retryable());
    assert_eq!(client.telemetry().unwrap().retry_count, 0);

    let accepted = tokio::time::timeout(Duration::from_millis(50), listener.accept()).await;
    assert!(accepted.is_err(), "nothing should reach the server");
}
