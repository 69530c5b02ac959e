//! Error types for the Storefront SDK.
//!
//! This module provides the [`SdkError`] type, the single root error returned
//! by every fallible SDK operation. Variants are grouped into categories so
//! callers can match narrowly on a variant or broadly on an [`ErrorCategory`].
//!
//! | Category | Variants | Carries |
//! |---|---|---|
//! | `Network` | `Network`, `Timeout`, `RateLimited`, `RetryExhausted` | request ID |
//! | `Auth` | `Authentication`, `TokenExpired`, `TokenRefreshFailed` | optional cause |
//! | `Domain` | `Graphql`, `Cart`, `Checkout`, `Order` | message |
//! | `Client` | `Interceptor`, `InvalidRequest`, `Storage`, `Serialization` | message |
//!
//! `SdkError` is `Clone` so a single outcome (for example a shared token
//! refresh) can be handed to every waiter.

use crate::context::RequestId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using [`SdkError`].
pub type SdkResult<T> = Result<T, SdkError>;

/// Broad classification of [`SdkError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Transport-level failures (connection, timeout, rate limiting, retries).
    Network,
    /// Authentication and session failures.
    Auth,
    /// Failures reported by the backend for a domain operation.
    Domain,
    /// Failures raised on the client side (hooks, storage, encoding).
    Client,
}

/// Error raised by a user-supplied interceptor hook.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("hook error: {message}")]
pub struct HookError {
    /// Error message
    pub message: String,
}

impl HookError {
    /// Creates a new hook error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Standard error type for the Storefront SDK.
///
/// # Example
///
/// ```
/// use storefront_core::{ErrorCategory, RequestId, SdkError};
///
/// let err = SdkError::timeout(RequestId::new(), 50);
/// assert_eq!(err.category(), ErrorCategory::Network);
/// assert!(err.is_timeout());
/// assert_eq!(err.code(), "TIMEOUT");
/// ```
#[derive(Error, Debug, Clone)]
pub enum SdkError {
    /// Generic network failure (connection refused, DNS, non-2xx status).
    #[error("network error: {message}")]
    Network {
        /// Human-readable error message.
        message: String,
        /// The request that failed, if it got far enough to have one.
        request_id: Option<RequestId>,
        /// HTTP status code returned by the backend, if any.
        status: Option<u16>,
    },

    /// The operation did not settle within the configured timeout.
    #[error("request {request_id} timed out after {timeout_ms}ms")]
    Timeout {
        /// The request that timed out.
        request_id: RequestId,
        /// The timeout that elapsed.
        timeout_ms: u64,
    },

    /// The backend rejected the call because of rate limiting.
    #[error("rate limited: {message}")]
    RateLimited {
        /// Human-readable error message.
        message: String,
        /// The rate-limited request.
        request_id: Option<RequestId>,
        /// Seconds the backend asked the client to wait.
        retry_after_seconds: Option<u64>,
    },

    /// Every retry attempt failed with a retryable error.
    #[error("request {request_id} failed after {attempts} attempts: {source}")]
    RetryExhausted {
        /// The request that was retried.
        request_id: RequestId,
        /// Total attempts made, including the first.
        attempts: u32,
        /// The error returned by the final attempt.
        source: Box<SdkError>,
    },

    /// Authentication failed or no session is available.
    #[error("authentication error: {message}")]
    Authentication {
        /// Human-readable error message.
        message: String,
    },

    /// The session can no longer be refreshed; the user must log in again.
    #[error("token expired: {message}")]
    TokenExpired {
        /// Human-readable error message.
        message: String,
    },

    /// A token refresh could not be completed; the cause may be transient.
    #[error("token refresh failed: {source}")]
    TokenRefreshFailed {
        /// The underlying failure.
        source: Box<SdkError>,
    },

    /// The backend returned an error payload for the operation.
    #[error("graphql error: {message}")]
    Graphql {
        /// Human-readable error message.
        message: String,
        /// Machine-readable code reported by the backend.
        code: Option<String>,
        /// The request that produced the error.
        request_id: Option<RequestId>,
    },

    /// A cart operation failed.
    #[error("cart error: {message}")]
    Cart {
        /// Human-readable error message.
        message: String,
    },

    /// A checkout operation failed.
    #[error("checkout error: {message}")]
    Checkout {
        /// Human-readable error message.
        message: String,
    },

    /// An order operation failed.
    #[error("order error: {message}")]
    Order {
        /// Human-readable error message.
        message: String,
    },

    /// A request interceptor rejected the call.
    #[error("interceptor rejected request: {0}")]
    Interceptor(#[from] HookError),

    /// The request could not be built (bad header, bad endpoint). Sending
    /// it again fails the same way.
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// Human-readable error message.
        message: String,
        /// The request that could not be built.
        request_id: Option<RequestId>,
    },

    /// Reading or writing persisted state failed.
    #[error("storage error: {message}")]
    Storage {
        /// Human-readable error message.
        message: String,
    },

    /// A payload could not be encoded or decoded.
    #[error("serialization error: {message}")]
    Serialization {
        /// Human-readable error message.
        message: String,
    },
}

impl SdkError {
    /// Creates a network error without an HTTP status.
    #[must_use]
    pub fn network(message: impl Into<String>, request_id: Option<RequestId>) -> Self {
        Self::Network {
            message: message.into(),
            request_id,
            status: None,
        }
    }

    /// Creates a network error for a non-success HTTP status.
    #[must_use]
    pub fn http_status(status: u16, request_id: Option<RequestId>) -> Self {
        Self::Network {
            message: format!("unexpected HTTP status {status}"),
            request_id,
            status: Some(status),
        }
    }

    /// Creates a timeout error.
    #[must_use]
    pub const fn timeout(request_id: RequestId, timeout_ms: u64) -> Self {
        Self::Timeout {
            request_id,
            timeout_ms,
        }
    }

    /// Creates a rate limited error.
    #[must_use]
    pub fn rate_limited(
        message: impl Into<String>,
        request_id: Option<RequestId>,
        retry_after_seconds: Option<u64>,
    ) -> Self {
        Self::RateLimited {
            message: message.into(),
            request_id,
            retry_after_seconds,
        }
    }

    /// Wraps the final attempt's error after retries ran out.
    #[must_use]
    pub fn retry_exhausted(request_id: RequestId, attempts: u32, last: SdkError) -> Self {
        Self::RetryExhausted {
            request_id,
            attempts,
            source: Box::new(last),
        }
    }

    /// Creates an authentication error.
    #[must_use]
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Creates a token expired error.
    #[must_use]
    pub fn token_expired(message: impl Into<String>) -> Self {
        Self::TokenExpired {
            message: message.into(),
        }
    }

    /// Wraps a failure raised while refreshing a token.
    #[must_use]
    pub fn token_refresh_failed(cause: SdkError) -> Self {
        Self::TokenRefreshFailed {
            source: Box::new(cause),
        }
    }

    /// Creates a backend-reported error.
    #[must_use]
    pub fn graphql(message: impl Into<String>, code: Option<String>) -> Self {
        Self::Graphql {
            message: message.into(),
            code,
            request_id: None,
        }
    }

    /// Creates a cart error.
    #[must_use]
    pub fn cart(message: impl Into<String>) -> Self {
        Self::Cart {
            message: message.into(),
        }
    }

    /// Creates a checkout error.
    #[must_use]
    pub fn checkout(message: impl Into<String>) -> Self {
        Self::Checkout {
            message: message.into(),
        }
    }

    /// Creates an order error.
    #[must_use]
    pub fn order(message: impl Into<String>) -> Self {
        Self::Order {
            message: message.into(),
        }
    }

    /// Creates a storage error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates an error for a request that could not be built.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>, request_id: Option<RequestId>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
            request_id,
        }
    }

    /// Creates a serialization error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Network { .. }
            | Self::Timeout { .. }
            | Self::RateLimited { .. }
            | Self::RetryExhausted { .. } => ErrorCategory::Network,
            Self::Authentication { .. }
            | Self::TokenExpired { .. }
            | Self::TokenRefreshFailed { .. } => ErrorCategory::Auth,
            Self::Graphql { .. } | Self::Cart { .. } | Self::Checkout { .. } | Self::Order { .. } => {
                ErrorCategory::Domain
            }
            Self::Interceptor(_)
            | Self::InvalidRequest { .. }
            | Self::Storage { .. }
            | Self::Serialization { .. } => ErrorCategory::Client,
        }
    }

    /// Returns a machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Network { .. } => "NETWORK_ERROR",
            Self::Timeout { .. } => "TIMEOUT",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::RetryExhausted { .. } => "RETRY_EXHAUSTED",
            Self::Authentication { .. } => "AUTH_ERROR",
            Self::TokenExpired { .. } => "TOKEN_EXPIRED",
            Self::TokenRefreshFailed { .. } => "TOKEN_REFRESH_FAILED",
            Self::Graphql { .. } => "GRAPHQL_ERROR",
            Self::Cart { .. } => "CART_ERROR",
            Self::Checkout { .. } => "CHECKOUT_ERROR",
            Self::Order { .. } => "ORDER_ERROR",
            Self::Interceptor(_) => "INTERCEPTOR_ERROR",
            Self::InvalidRequest { .. } => "INVALID_REQUEST",
            Self::Storage { .. } => "STORAGE_ERROR",
            Self::Serialization { .. } => "SERIALIZATION_ERROR",
        }
    }

    /// Returns the request ID attached to a network-layer error.
    #[must_use]
    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            Self::Network { request_id, .. }
            | Self::RateLimited { request_id, .. }
            | Self::Graphql { request_id, .. }
            | Self::InvalidRequest { request_id, .. } => *request_id,
            Self::Timeout { request_id, .. } | Self::RetryExhausted { request_id, .. } => {
                Some(*request_id)
            }
            _ => None,
        }
    }

    /// Attaches a request ID to errors that carry one but do not have it yet.
    #[must_use]
    pub fn with_request_id(mut self, id: RequestId) -> Self {
        match &mut self {
            Self::Network { request_id, .. }
            | Self::RateLimited { request_id, .. }
            | Self::Graphql { request_id, .. }
            | Self::InvalidRequest { request_id, .. } => {
                request_id.get_or_insert(id);
            }
            _ => {}
        }
        self
    }

    /// Returns `true` for network-layer errors.
    #[must_use]
    pub fn is_network(&self) -> bool {
        self.category() == ErrorCategory::Network
    }

    /// Returns `true` for authentication and session errors.
    #[must_use]
    pub fn is_auth(&self) -> bool {
        self.category() == ErrorCategory::Auth
    }

    /// Returns `true` if this error is, or was caused by, a timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::RetryExhausted { source, .. } => source.is_timeout(),
            _ => false,
        }
    }

    /// Returns `true` if repeating the same call may succeed.
    ///
    /// Connection failures, 5xx responses, rate limiting and timeouts are
    /// retryable. Client errors (4xx), auth, domain and client-side failures
    /// are not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { status, .. } => status.map_or(true, |s| s >= 500),
            Self::Timeout { .. } | Self::RateLimited { .. } => true,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for SdkError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}
