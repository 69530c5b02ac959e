//! # Storefront Core
//!
//! Core types shared by every Storefront SDK crate.
//!
//! - [`Operation`] / [`Response`] - An outbound query or mutation and its result
//! - [`OperationContext`] - Per-call envelope flowing through the middleware pipeline
//! - [`RequestId`] - UUID v4 call identifier
//! - [`SdkError`] - The error taxonomy every public operation reports with
//! - [`events::EventBus`] - Hierarchical pub-sub with cross-context broadcast
//! - [`storage::Storage`] - Pluggable key-value persistence with max-age
//! - [`pagination`] - Offset pagination as a `Stream`

#![doc(html_root_url = "https://docs.rs/storefront-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
mod error;
pub mod events;
mod level;
mod operation;
pub mod pagination;
pub mod storage;

pub use context::{ErrorContext, Headers, OperationContext, RequestContext, RequestId, ResponseContext};
pub use error::{ErrorCategory, HookError, SdkError, SdkResult};
pub use events::{EventBus, EventMessage, EventType};
pub use level::LogLevel;
pub use operation::{Operation, OperationKind, Response};
pub use storage::{Storage, StorageKey, StorageOptions};
