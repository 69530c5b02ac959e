//! Cross-context synchronisation tests.
//!
//! Each "context" gets its own bus joined to a shared hub; all of them share
//! one storage, the way browser tabs share cookies.

use serde_json::json;
use std::sync::Arc;
use storefront_config::SessionConfig;
use storefront_core::events::BroadcastHub;
use storefront_core::storage::MemoryStorage;
use storefront_core::{EventBus, EventType, Storage, StorageKey, StorageOptions};
use storefront_session::fixtures::{MockAuthApi, MockUserApi};
use storefront_session::{Credentials, Session};

struct Contexts {
    hub: Arc<BroadcastHub>,
    storage: Arc<MemoryStorage>,
}

impl Contexts {
    fn new() -> Self {
        Self {
            hub: BroadcastHub::new(),
            storage: Arc::new(MemoryStorage::new()),
        }
    }

    fn open(&self) -> (Session, Arc<EventBus>) {
        let bus = self.hub.join();
        let session = Session::new(
            Arc::new(MockAuthApi::new()),
            Arc::new(MockUserApi::new()),
            Arc::clone(&self.storage) as Arc<dyn Storage>,
            Arc::clone(&bus),
            SessionConfig::default(),
        );
        (session, bus)
    }
}

#[tokio::test]
async fn login_in_one_context_reaches_another() {
    let contexts = Contexts::new();
    let (first, _) = contexts.open();
    let (second, _) = contexts.open();
    assert!(!second.is_authenticated());

    first.login(&Credentials::new("ada", "pw")).await.unwrap();

    assert!(second.is_authenticated());
    assert_eq!(second.username().as_deref(), Some("ada"));
    assert_eq!(second.user_token(), first.user_token());
}

#[tokio::test]
async fn refresh_in_one_context_reaches_another() {
    let contexts = Contexts::new();
    let (first, _) = contexts.open();
    let (second, _) = contexts.open();
    first.login(&Credentials::new("ada", "pw")).await.unwrap();

    first.refresh().await.unwrap();

    assert_eq!(second.refresh_token(), first.refresh_token());
    assert_eq!(second.refresh_token().as_deref(), Some("refresh-2"));
}

#[test]
fn storage_write_and_refresh_event_update_a_peer() {
    let contexts = Contexts::new();
    let (session, _) = contexts.open();
    let publisher = contexts.hub.join();

    contexts
        .storage
        .set(StorageKey::UserToken.as_str(), "user-2", StorageOptions::default())
        .unwrap();
    contexts
        .storage
        .set(StorageKey::RefreshToken.as_str(), "refresh-2", StorageOptions::default())
        .unwrap();
    assert!(session.user_token().is_none());

    publisher.emit(EventType::SESSION_REFRESH, json!({}));

    assert_eq!(session.user_token().as_deref(), Some("user-2"));
    assert_eq!(session.refresh_token().as_deref(), Some("refresh-2"));
}

#[tokio::test]
async fn storage_clear_and_logout_event_sign_out_a_peer() {
    let contexts = Contexts::new();
    let (first, _) = contexts.open();
    let (second, _) = contexts.open();
    first.login(&Credentials::new("ada", "pw")).await.unwrap();
    assert!(second.is_authenticated());

    let publisher = contexts.hub.join();
    for key in StorageKey::AUTH {
        contexts.storage.remove(key.as_str()).unwrap();
    }
    publisher.emit(EventType::USER_LOGOUT, json!({}));

    assert!(!first.is_authenticated());
    assert!(!second.is_authenticated());
}

#[tokio::test]
async fn logout_reaches_every_context() {
    let contexts = Contexts::new();
    let (first, _) = contexts.open();
    let (second, _) = contexts.open();
    let (third, _) = contexts.open();
    first.login(&Credentials::new("ada", "pw")).await.unwrap();

    second.logout().unwrap();

    for session in [&first, &second, &third] {
        assert!(!session.is_authenticated());
        assert!(session.username().is_none());
    }
}

#[test]
fn closed_context_stops_listening() {
    let contexts = Contexts::new();
    let (session, bus) = contexts.open();
    assert_eq!(bus.subscriber_count(), 4);

    drop(session);
    assert_eq!(bus.subscriber_count(), 0);
    assert_eq!(contexts.hub.peer_count(), 1);
}
