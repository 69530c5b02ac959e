//! Operation context types.
//!
//! The [`OperationContext`] is the per-call envelope that flows through the
//! middleware pipeline. It is created once per outbound operation, mutated in
//! place by successive middleware (headers accumulate), and dropped when the
//! call settles.
//!
//! The hook views ([`RequestContext`], [`ResponseContext`], [`ErrorContext`])
//! are derived snapshots handed to user interceptors.

use crate::error::SdkError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Outgoing header map. Names are stored lowercase.
pub type Headers = BTreeMap<String, String>;

/// A unique identifier for each outbound operation, using UUID v4.
///
/// # Example
///
/// ```
/// use storefront_core::RequestId;
///
/// let id = RequestId::new();
/// assert_eq!(id.as_uuid().get_version_num(), 4);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new random request ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a `RequestId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Context that flows through the middleware pipeline for one operation.
///
/// # Example
///
/// ```
/// use storefront_core::{Operation, OperationContext};
///
/// let op = Operation::new("AddToCart", "mutation AddToCart { addItem { id } }");
/// let mut ctx = OperationContext::new(&op);
/// ctx.set_header("X-Trace", "abc");
///
/// assert!(ctx.is_mutation());
/// assert_eq!(ctx.header("x-trace"), Some("abc"));
/// ```
#[derive(Debug, Clone)]
pub struct OperationContext {
    /// Unique identifier for this call.
    request_id: RequestId,

    /// Idempotency key, present for mutations once tagged.
    idempotency_key: Option<Uuid>,

    /// When the call started (monotonic).
    started_at: Instant,

    /// When the call started (wall clock), for hook timestamps.
    started_wall: DateTime<Utc>,

    /// Name of the operation being executed.
    operation_name: String,

    /// Outgoing headers.
    headers: Headers,

    /// Number of retries performed so far.
    retry_count: u32,

    /// Whether the operation mutates server state.
    is_mutation: bool,
}

impl OperationContext {
    /// Creates a context for the given operation.
    #[must_use]
    pub fn new(operation: &crate::Operation) -> Self {
        Self {
            request_id: RequestId::new(),
            idempotency_key: None,
            started_at: Instant::now(),
            started_wall: Utc::now(),
            operation_name: operation.name().to_string(),
            headers: Headers::new(),
            retry_count: 0,
            is_mutation: operation.is_mutation(),
        }
    }

    /// Returns the request ID.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Sets the request ID.
    ///
    /// This should only be called by the identity middleware.
    pub fn set_request_id(&mut self, request_id: RequestId) {
        self.request_id = request_id;
    }

    /// Returns the idempotency key, if one was assigned.
    #[must_use]
    pub fn idempotency_key(&self) -> Option<Uuid> {
        self.idempotency_key
    }

    /// Sets the idempotency key.
    pub fn set_idempotency_key(&mut self, key: Uuid) {
        self.idempotency_key = Some(key);
    }

    /// Returns the operation name.
    #[must_use]
    pub fn operation_name(&self) -> &str {
        &self.operation_name
    }

    /// Returns `true` if the operation is a mutation.
    #[must_use]
    pub fn is_mutation(&self) -> bool {
        self.is_mutation
    }

    /// Returns the outgoing headers.
    #[must_use]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns a single header value by (case-insensitive) name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Sets a header, replacing any previous value.
    pub fn set_header(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
    }

    /// Merges headers into the context, overwriting existing names.
    pub fn merge_headers(&mut self, headers: Headers) {
        for (name, value) in headers {
            self.set_header(name, value);
        }
    }

    /// Returns the number of retries performed so far.
    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Records one more retry.
    pub fn increment_retry(&mut self) {
        self.retry_count += 1;
    }

    /// Returns when the call started processing.
    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Returns the elapsed time since the call started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Returns the elapsed time in whole milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Builds the view passed to `on_request` hooks.
    #[must_use]
    pub fn to_request_context(&self) -> RequestContext {
        RequestContext {
            request_id: self.request_id,
            operation_name: self.operation_name.clone(),
            timestamp: self.started_wall,
            headers: self.headers.clone(),
            retry_count: self.retry_count,
        }
    }

    /// Builds the view passed to `on_response` hooks.
    #[must_use]
    pub fn to_response_context(&self, data: serde_json::Value) -> ResponseContext {
        ResponseContext {
            request_id: self.request_id,
            operation_name: self.operation_name.clone(),
            duration_ms: self.elapsed_ms(),
            data,
            retry_count: self.retry_count,
        }
    }

    /// Builds the view passed to `on_error` hooks.
    #[must_use]
    pub fn to_error_context(&self, error: SdkError) -> ErrorContext {
        ErrorContext {
            request_id: self.request_id,
            operation_name: self.operation_name.clone(),
            duration_ms: self.elapsed_ms(),
            error,
            retry_count: self.retry_count,
        }
    }
}

/// Snapshot passed to `on_request` hooks.
///
/// Hooks may add or replace entries in `headers`; those changes are merged
/// back into the outgoing call.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// The call's request ID.
    pub request_id: RequestId,
    /// Name of the operation.
    pub operation_name: String,
    /// When the call started.
    pub timestamp: DateTime<Utc>,
    /// Outgoing headers (mutable by the hook).
    pub headers: Headers,
    /// Retries performed so far.
    pub retry_count: u32,
}

/// Snapshot passed to `on_response` hooks.
#[derive(Debug, Clone)]
pub struct ResponseContext {
    /// The call's request ID.
    pub request_id: RequestId,
    /// Name of the operation.
    pub operation_name: String,
    /// Milliseconds since the call started.
    pub duration_ms: u64,
    /// Response payload.
    pub data: serde_json::Value,
    /// Retries performed.
    pub retry_count: u32,
}

/// Snapshot passed to `on_error` hooks.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// The call's request ID.
    pub request_id: RequestId,
    /// Name of the operation.
    pub operation_name: String,
    /// Milliseconds since the call started.
    pub duration_ms: u64,
    /// The error the caller will observe.
    pub error: SdkError,
    /// Retries performed.
    pub retry_count: u32,
}
