//! # Storefront
//!
//! **Client SDK for a GraphQL storefront backend**
//!
//! Storefront wraps every outgoing operation in a fixed middleware pipeline
//! and manages the shopper's session and cart on top of it:
//!
//! - **Pipeline** - Identity, idempotency, logging, user hooks, timeout,
//!   telemetry and retry around a `reqwest` transport
//! - **Session** - Login, logout and single-flight token refresh, persisted
//!   to pluggable storage
//! - **Cart** - Cached cart with persisted id and line arithmetic
//! - **Events** - Hierarchical pub-sub that keeps several contexts in sync
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use storefront::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder()
//!         .endpoint("https://shop.example.com/graphql")
//!         .build();
//!     let client = Client::new(config)?;
//!
//!     client
//!         .session()
//!         .login(&Credentials::new("ada@example.com", "secret").remember_me(true))
//!         .await?;
//!     let cart = client.cart().add(AddItem::new("sku-123", 2)).await?;
//!     println!("{} items", cart.total_quantity());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Session / Cart → Pipeline → Identity → Idempotency → Logging → Interceptor
//!                                → Timeout → Telemetry → Retry → HttpTransport
//! ```

#![doc(html_root_url = "https://docs.rs/storefront/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod api;
mod client;
mod error;
pub mod transport;

pub use client::{Client, ClientBuilder};
pub use error::{ClientError, ClientResult};

// Re-export the workspace crates
pub use storefront_config as config;
pub use storefront_core as core;
pub use storefront_middleware as middleware;
pub use storefront_session as session;
pub use storefront_telemetry as telemetry;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```
/// use storefront::prelude::*;
///
/// let config = ClientConfig::development();
/// assert_eq!(config.retry.max_retries, 0);
/// ```
pub mod prelude {
    pub use crate::{Client, ClientBuilder, ClientError};

    pub use storefront_config::{ClientConfig, ConfigLoader, RetryConfig, SessionConfig};

    pub use storefront_core::events::BroadcastHub;
    pub use storefront_core::storage::{CookieStorage, MemoryStorage};
    pub use storefront_core::{
        EventBus, EventMessage, EventType, LogLevel, Operation, Response, SdkError, SdkResult,
        Storage,
    };

    pub use storefront_middleware::Interceptors;

    pub use storefront_session::{AddItem, Cart, CartItem, Credentials, User, UserUpdate};

    pub use storefront_telemetry::TelemetrySnapshot;
}
