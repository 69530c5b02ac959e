//! # Storefront Middleware
//!
//! Request middleware pipeline for the Storefront SDK.
//!
//! Every outgoing operation flows through an ordered chain of middleware
//! before reaching the [`Transport`]. The first stage wraps all the others,
//! onion style:
//!
//! ```text
//! execute → Identity → Idempotency → Logging → Interceptor → Timeout → Telemetry → Retry → Transport
//!                                                                                            ↓
//! result  ←──────────────────────────── (same stages, reverse order) ←─────────────────────┘
//! ```
//!
//! | Stage | Middleware    | Purpose                                         |
//! |-------|---------------|-------------------------------------------------|
//! | 1     | Identity      | `x-request-id` (UUID v4) and `x-sdk-version`    |
//! | 2     | Idempotency   | `x-idempotency-key` for mutations               |
//! | 3     | Logging       | Start/completed/failed lines                    |
//! | 4     | Interceptor   | User `on_request`/`on_response`/`on_error`      |
//! | 5     | Timeout       | Fails calls that outlive the configured limit   |
//! | 6     | Telemetry     | Duration and outcome into the collector         |
//! | 7     | Retry         | Exponential backoff on retryable failures       |
//!
//! ## Example
//!
//! ```
//! use storefront_middleware::pipeline::Stage;
//!
//! let stages = Stage::all();
//! assert_eq!(stages.len(), 7);
//! assert_eq!(stages[0].name(), "identity");
//! assert_eq!(stages[6].name(), "retry");
//! ```
//!
//! Custom chains are assembled with [`Pipeline::builder`]; the standard one
//! with [`Pipeline::standard`].

#![doc(html_root_url = "https://docs.rs/storefront-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod middleware;
pub mod pipeline;
pub mod stages;

// Re-export main types at crate root
pub use middleware::{BoxFuture, BoxedMiddleware, FnMiddleware, FnTransport, Middleware, Next, Transport};
pub use pipeline::{Pipeline, PipelineBuilder, Stage};
pub use stages::Interceptors;
