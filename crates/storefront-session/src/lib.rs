//! # Storefront Session
//!
//! Session, token lifecycle and cart state for the Storefront SDK.
//!
//! - [`Session`] - Login, logout, single-flight token refresh and profile calls
//! - [`CartSession`] - Cached cart with persisted id and line arithmetic
//! - [`token`] - Local JWT expiry checks
//! - [`grouping`] - Bundle grouping for cart display
//! - [`api`] - Collaborator traits the managers call
//! - [`fixtures`] - In-memory collaborators for tests
//!
//! Both managers persist through a shared [`Storage`](storefront_core::Storage)
//! and announce changes on an [`EventBus`](storefront_core::EventBus). Two
//! contexts that share both stay consistent:
//!
//! ```
//! use std::sync::Arc;
//! use storefront_config::SessionConfig;
//! use storefront_core::events::BroadcastHub;
//! use storefront_core::storage::MemoryStorage;
//! use storefront_core::{EventBus, Storage, StorageKey, StorageOptions};
//! use storefront_session::fixtures::{MockAuthApi, MockUserApi};
//! use storefront_session::Session;
//!
//! let hub = BroadcastHub::new();
//! let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
//! storage
//!     .set(StorageKey::RefreshToken.as_str(), "refresh-1", StorageOptions::default())
//!     .unwrap();
//!
//! let open = |bus: Arc<EventBus>| {
//!     Session::new(
//!         Arc::new(MockAuthApi::new()),
//!         Arc::new(MockUserApi::new()),
//!         Arc::clone(&storage),
//!         bus,
//!         SessionConfig::default(),
//!     )
//! };
//! let (first, second) = (open(hub.join()), open(hub.join()));
//! assert!(second.is_authenticated());
//!
//! first.logout().unwrap();
//! assert!(!second.is_authenticated());
//! ```

#![doc(html_root_url = "https://docs.rs/storefront-session/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod api;
mod cart;
pub mod fixtures;
pub mod grouping;
mod session;
pub mod token;

pub use api::{AddItem, AuthApi, AuthResult, Cart, CartApi, CartItem, Credentials, User, UserApi, UserUpdate};
pub use cart::CartSession;
pub use grouping::{group_items, DisplayLine};
pub use session::Session;
pub use token::TokenStatus;
