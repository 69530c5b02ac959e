//! HTTP transport.
//!
//! Posts each operation as a GraphQL-over-HTTP JSON body to the configured
//! endpoint. The exchange runs on a spawned task, so a caller that stops
//! waiting (the timeout stage firing, or a dropped future) does not abort a
//! request the backend may already be processing.

use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use storefront_core::{Operation, OperationContext, RequestId, Response, SdkError, SdkResult};
use storefront_middleware::{BoxFuture, Transport};

/// Transport posting operations to a GraphQL endpoint with `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    /// Creates a transport with a default `reqwest` client.
    ///
    /// # Errors
    ///
    /// Returns the `reqwest` error if the client cannot be built.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("storefront-sdk/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client, endpoint))
    }

    /// Creates a transport around an existing client.
    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    /// The endpoint requests are posted to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Builds the HTTP request for an operation.
    ///
    /// Every context header is copied. The operation's token, if any, is
    /// sent as a bearer `authorization` header.
    ///
    /// # Errors
    ///
    /// Returns the `reqwest` error for an invalid header or endpoint.
    pub fn build_request(
        &self,
        ctx: &OperationContext,
        operation: &Operation,
    ) -> Result<reqwest::Request, reqwest::Error> {
        let body = json!({
            "query": operation.document(),
            "variables": operation.variables(),
            "operationName": operation.name(),
        });

        let mut request = self.client.post(&self.endpoint).json(&body);
        for (name, value) in ctx.headers() {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(token) = operation.token() {
            request = request.bearer_auth(token);
        }
        request.build()
    }
}

impl Transport for HttpTransport {
    fn send<'a>(
        &'a self,
        ctx: &'a OperationContext,
        operation: &'a Operation,
    ) -> BoxFuture<'a, SdkResult<Response>> {
        let request_id = ctx.request_id();
        let request = self.build_request(ctx, operation);
        let client = self.client.clone();

        Box::pin(async move {
            let request =
                request.map_err(|e| SdkError::invalid_request(e.to_string(), Some(request_id)))?;

            let exchange = tokio::spawn(async move {
                let response = client.execute(request).await?;
                let status = response.status();
                let retry_after = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|value| value.to_str().ok())
                    .and_then(parse_retry_after);
                let body = response.bytes().await?;
                Ok::<_, reqwest::Error>((status, retry_after, body))
            });

            let (status, retry_after, body) = exchange
                .await
                .map_err(|e| SdkError::network(format!("transport task failed: {e}"), Some(request_id)))?
                .map_err(|e| SdkError::network(e.to_string(), Some(request_id)))?;

            tracing::trace!(%request_id, status = status.as_u16(), bytes = body.len(), "response received");
            settle(status, retry_after, &body, request_id)
        })
    }
}

#[derive(Deserialize)]
struct GraphqlBody {
    #[serde(default)]
    data: Option<serde_json::Value>,
    #[serde(default)]
    errors: Vec<GraphqlErrorBody>,
    #[serde(default)]
    extensions: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct GraphqlErrorBody {
    message: String,
    #[serde(default)]
    extensions: Option<GraphqlErrorExtensions>,
}

#[derive(Deserialize)]
struct GraphqlErrorExtensions {
    #[serde(default)]
    code: Option<String>,
}

/// Maps an HTTP exchange onto the SDK's result.
pub(crate) fn settle(
    status: StatusCode,
    retry_after: Option<u64>,
    body: &[u8],
    request_id: RequestId,
) -> SdkResult<Response> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(SdkError::rate_limited(
            "too many requests",
            Some(request_id),
            retry_after,
        ));
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(SdkError::authentication(format!(
            "request {request_id} was not authorized"
        )));
    }
    if !status.is_success() {
        return Err(SdkError::http_status(status.as_u16(), Some(request_id)));
    }

    let body: GraphqlBody = serde_json::from_slice(body)
        .map_err(|e| SdkError::serialization(format!("invalid response body: {e}")))?;

    if let Some(first) = body.errors.first() {
        let message = body
            .errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        let code = first.extensions.as_ref().and_then(|x| x.code.clone());
        return Err(SdkError::graphql(message, code).with_request_id(request_id));
    }

    Ok(Response {
        data: body.data.unwrap_or_default(),
        extensions: body.extensions,
    })
}

/// Parses a `Retry-After` value: delay seconds or an HTTP date.
pub(crate) fn parse_retry_after(value: &str) -> Option<u64> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(seconds);
    }

    let date = chrono::DateTime::parse_from_rfc2822(value).ok()?;
    let millis = date
        .signed_duration_since(chrono::Utc::now())
        .num_milliseconds()
        .max(0);
    Some((millis as u64).div_ceil(1000))
}
