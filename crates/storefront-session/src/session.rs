//! Session and token lifecycle.
//!
//! A [`Session`] owns the user's tokens. It mirrors them into shared
//! [`Storage`] so they survive restarts and are visible to other contexts,
//! and it keeps the short-lived user token fresh.
//!
//! ## States
//!
//! ```text
//! Unauthenticated ──login──▶ Authenticated ──logout / refresh failure──▶ Unauthenticated
//! ```
//!
//! A session is authenticated while it holds a refresh token. The user token
//! may be missing or stale; [`Session::ensure_valid_token`] fixes that.
//!
//! ## Single-flight refresh
//!
//! Concurrent callers that need a refresh share one in-flight future. The
//! slot is cleared when the refresh finishes, on success and on failure,
//! before any later caller can start another.
//!
//! ## Cross-context sync
//!
//! The session listens for `USER_LOGIN`, `USER_LOGOUT`, `SESSION_REFRESH` and
//! `SESSION_EXPIRED` on its [`EventBus`] and re-reads its tokens from storage
//! when one arrives. A login, refresh or logout in another context that
//! shares the storage and bus therefore shows up here without a direct call.

use crate::api::{AuthApi, AuthResult, Credentials, User, UserApi, UserUpdate};
use crate::token;
use chrono::Utc;
use futures_util::future::{BoxFuture, FutureExt, Shared, WeakShared};
use parking_lot::{Mutex, RwLock};
use serde_json::json;
use std::sync::{Arc, Weak};
use std::time::Duration;
use storefront_config::SessionConfig;
use storefront_core::events::SubscriptionId;
use storefront_core::storage::StorageResult;
use storefront_core::{EventBus, EventType, SdkError, SdkResult, Storage, StorageKey, StorageOptions};

type RefreshFuture = BoxFuture<'static, SdkResult<AuthResult>>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Tokens {
    user_token: Option<String>,
    refresh_token: Option<String>,
    username: Option<String>,
    customer_type: Option<String>,
}

impl Tokens {
    fn load(storage: &dyn Storage) -> Self {
        Self {
            user_token: storage.get(StorageKey::UserToken.as_str()),
            refresh_token: storage.get(StorageKey::RefreshToken.as_str()),
            username: storage.get(StorageKey::Username.as_str()),
            customer_type: storage.get(StorageKey::CustomerType.as_str()),
        }
    }
}

struct Inner {
    auth: Arc<dyn AuthApi>,
    users: Arc<dyn UserApi>,
    storage: Arc<dyn Storage>,
    bus: Arc<EventBus>,
    config: SessionConfig,
    tokens: RwLock<Tokens>,
    /// Only waiters keep the refresh alive; the slot never owns it.
    in_flight: Mutex<Option<WeakShared<RefreshFuture>>>,
    subscriptions: Mutex<Vec<SubscriptionId>>,
}

/// The user's authenticated session.
///
/// Cloning is cheap; clones share state.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use storefront_config::SessionConfig;
/// use storefront_core::{storage::MemoryStorage, EventBus};
/// use storefront_session::fixtures::{MockAuthApi, MockUserApi};
/// use storefront_session::Session;
///
/// let session = Session::new(
///     Arc::new(MockAuthApi::new()),
///     Arc::new(MockUserApi::new()),
///     Arc::new(MemoryStorage::new()),
///     Arc::new(EventBus::new()),
///     SessionConfig::default(),
/// );
/// assert!(!session.is_authenticated());
/// ```
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("authenticated", &self.is_authenticated())
            .field("username", &self.username())
            .field("refreshing", &self.is_refreshing())
            .finish()
    }
}

impl Session {
    /// Creates a session, loading any tokens already in `storage`.
    pub fn new(
        auth: Arc<dyn AuthApi>,
        users: Arc<dyn UserApi>,
        storage: Arc<dyn Storage>,
        bus: Arc<EventBus>,
        config: SessionConfig,
    ) -> Self {
        let tokens = Tokens::load(storage.as_ref());
        let inner = Arc::new(Inner {
            auth,
            users,
            storage,
            bus,
            config,
            tokens: RwLock::new(tokens),
            in_flight: Mutex::new(None),
            subscriptions: Mutex::new(Vec::new()),
        });
        Inner::subscribe(&inner);
        Self { inner }
    }

    /// Returns `true` while a refresh token is held.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.tokens.read().refresh_token.is_some()
    }

    /// Returns the cached user token, which may be stale.
    #[must_use]
    pub fn user_token(&self) -> Option<String> {
        self.inner.tokens.read().user_token.clone()
    }

    /// Returns the cached refresh token.
    #[must_use]
    pub fn refresh_token(&self) -> Option<String> {
        self.inner.tokens.read().refresh_token.clone()
    }

    /// Returns the logged-in user's name.
    #[must_use]
    pub fn username(&self) -> Option<String> {
        self.inner.tokens.read().username.clone()
    }

    /// Returns the customer type reported at login.
    #[must_use]
    pub fn customer_type(&self) -> Option<String> {
        self.inner.tokens.read().customer_type.clone()
    }

    /// Returns `true` while a refresh is in flight.
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.inner
            .in_flight
            .lock()
            .as_ref()
            .and_then(WeakShared::upgrade)
            .is_some()
    }

    /// Logs in and persists the resulting tokens.
    ///
    /// `remember_me` selects the long max-age policy; the choice is stored so
    /// later refreshes keep it. Emits `USER_LOGIN`.
    ///
    /// # Errors
    ///
    /// Returns the collaborator's error, `SdkError::Authentication` if the
    /// backend rejected the credentials, or a storage error.
    pub async fn login(&self, credentials: &Credentials) -> SdkResult<AuthResult> {
        let result = self.inner.auth.login(credentials).await?;
        if !result.succeeded {
            return Err(SdkError::authentication(
                result
                    .message
                    .clone()
                    .unwrap_or_else(|| "invalid credentials".to_string()),
            ));
        }

        let max_age = self.inner.config.max_age(credentials.remember_me);
        self.inner.storage.set(
            StorageKey::AuthMaxAge.as_str(),
            &max_age.as_secs().to_string(),
            StorageOptions::max_age(max_age),
        )?;
        self.inner.persist(&result, max_age)?;

        tracing::info!(username = ?result.username, "user logged in");
        self.inner
            .bus
            .emit(EventType::USER_LOGIN, json!({ "username": result.username }));
        Ok(result)
    }

    /// Clears the session everywhere and emits `USER_LOGOUT`.
    ///
    /// Storage is cleared before the event goes out, so listeners that
    /// re-read storage see the logged-out state.
    ///
    /// # Errors
    ///
    /// Returns the first storage error; every key is still attempted.
    pub fn logout(&self) -> SdkResult<()> {
        let username = self.username();
        let cleared = self.inner.clear();
        tracing::info!(?username, "user logged out");
        self.inner
            .bus
            .emit(EventType::USER_LOGOUT, json!({ "username": username }));
        cleared.map_err(SdkError::from)
    }

    /// Returns a user token that is valid for at least the refresh threshold.
    ///
    /// The cached token is decoded locally; only a missing, malformed,
    /// expired or soon-expiring token triggers a refresh.
    ///
    /// # Errors
    ///
    /// Returns the refresh error, see [`refresh`](Self::refresh).
    pub async fn ensure_valid_token(&self) -> SdkResult<String> {
        if let Some(user_token) = self.user_token() {
            if !token::needs_refresh(&user_token, self.inner.config.refresh_threshold()) {
                return Ok(user_token);
            }
            tracing::debug!("user token expired or expiring; refreshing");
        }

        let result = self.refresh().await?;
        result
            .user_token
            .or_else(|| self.user_token())
            .ok_or_else(|| SdkError::authentication("refresh returned no user token"))
    }

    /// Refreshes the tokens, sharing any refresh already in flight.
    ///
    /// On success the new tokens are persisted and `SESSION_REFRESH` is
    /// emitted. If the backend reports failure the session is cleared,
    /// `SESSION_EXPIRED` is emitted and `SdkError::TokenExpired` returned. If
    /// the call itself fails the session is cleared the same way and
    /// `SdkError::TokenRefreshFailed` wraps the cause.
    ///
    /// # Errors
    ///
    /// As above, or `SdkError::Authentication` when there is no session to
    /// refresh.
    pub async fn refresh(&self) -> SdkResult<AuthResult> {
        let future = {
            let mut slot = self.inner.in_flight.lock();
            match slot.as_ref().and_then(WeakShared::upgrade) {
                Some(in_flight) => in_flight,
                None => {
                    let future: Shared<RefreshFuture> =
                        Inner::run_refresh(Arc::clone(&self.inner)).boxed().shared();
                    *slot = future.downgrade();
                    future
                }
            }
        };
        future.await
    }

    /// Fetches the current user's profile.
    ///
    /// # Errors
    ///
    /// Returns token errors from [`ensure_valid_token`](Self::ensure_valid_token)
    /// or the collaborator's error.
    pub async fn get_user(&self) -> SdkResult<User> {
        let user_token = self.ensure_valid_token().await?;
        self.inner.users.get_user(&user_token).await
    }

    /// Updates the current user's profile.
    ///
    /// # Errors
    ///
    /// Same as [`get_user`](Self::get_user).
    pub async fn update_user(&self, update: &UserUpdate) -> SdkResult<User> {
        let user_token = self.ensure_valid_token().await?;
        self.inner.users.update_user(&user_token, update).await
    }

    /// Re-reads the tokens from storage.
    pub fn reload(&self) {
        self.inner.reload();
    }
}

impl Inner {
    fn subscribe(this: &Arc<Self>) {
        let subjects = [
            EventType::USER_LOGIN,
            EventType::USER_LOGOUT,
            EventType::SESSION_REFRESH,
            EventType::SESSION_EXPIRED,
        ];
        let ids = subjects
            .into_iter()
            .map(|subject| {
                let weak: Weak<Self> = Arc::downgrade(this);
                this.bus.subscribe(subject, move |_message| {
                    if let Some(inner) = weak.upgrade() {
                        inner.reload();
                    }
                })
            })
            .collect();
        *this.subscriptions.lock() = ids;
    }

    fn reload(&self) {
        let tokens = Tokens::load(self.storage.as_ref());
        tracing::trace!(authenticated = tokens.refresh_token.is_some(), "session reloaded from storage");
        *self.tokens.write() = tokens;
    }

    /// Auth max-age chosen at login, or the default policy.
    fn auth_max_age(&self) -> Duration {
        self.storage
            .get(StorageKey::AuthMaxAge.as_str())
            .and_then(|secs| secs.parse().ok())
            .map_or_else(|| self.config.max_age(false), Duration::from_secs)
    }

    fn persist(&self, result: &AuthResult, max_age: Duration) -> StorageResult<()> {
        let options = StorageOptions::max_age(max_age);

        if let Some(user_token) = &result.user_token {
            // The user token lives exactly as long as the JWT says.
            let lifetime = token::remaining_lifetime(user_token, Utc::now()).unwrap_or(max_age);
            self.storage.set(
                StorageKey::UserToken.as_str(),
                user_token,
                StorageOptions::max_age(lifetime.min(max_age)),
            )?;
        }
        if let Some(refresh_token) = &result.refresh_token {
            self.storage
                .set(StorageKey::RefreshToken.as_str(), refresh_token, options)?;
        }
        if let Some(username) = &result.username {
            self.storage
                .set(StorageKey::Username.as_str(), username, options)?;
        }
        if let Some(customer_type) = &result.customer_type {
            self.storage
                .set(StorageKey::CustomerType.as_str(), customer_type, options)?;
        }

        let mut tokens = self.tokens.write();
        if result.user_token.is_some() {
            tokens.user_token.clone_from(&result.user_token);
        }
        if result.refresh_token.is_some() {
            tokens.refresh_token.clone_from(&result.refresh_token);
        }
        if result.username.is_some() {
            tokens.username.clone_from(&result.username);
        }
        if result.customer_type.is_some() {
            tokens.customer_type.clone_from(&result.customer_type);
        }
        Ok(())
    }

    /// Drops the in-memory tokens and every persisted auth key.
    fn clear(&self) -> StorageResult<()> {
        *self.tokens.write() = Tokens::default();

        let mut first_error = None;
        for key in StorageKey::AUTH {
            if let Err(e) = self.storage.remove(key.as_str()) {
                tracing::warn!(key = key.as_str(), error = %e, "failed to clear auth key");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn expire(&self, reason: &str) {
        // Storage failures are logged by clear(); the refresh error wins.
        let _ = self.clear();
        tracing::info!(reason, "session expired");
        self.bus
            .emit(EventType::SESSION_EXPIRED, json!({ "reason": reason }));
    }

    async fn run_refresh(this: Arc<Self>) -> SdkResult<AuthResult> {
        let outcome = this.refresh_once().await;
        this.in_flight.lock().take();
        outcome
    }

    async fn refresh_once(&self) -> SdkResult<AuthResult> {
        let refresh_token = self
            .tokens
            .read()
            .refresh_token
            .clone()
            .or_else(|| self.storage.get(StorageKey::RefreshToken.as_str()));
        let Some(refresh_token) = refresh_token else {
            return Err(SdkError::authentication("not logged in"));
        };

        tracing::debug!("refreshing session tokens");
        match self.auth.refresh(&refresh_token).await {
            Ok(result) if result.succeeded => {
                self.persist(&result, self.auth_max_age())?;
                self.bus.emit(
                    EventType::SESSION_REFRESH,
                    json!({ "username": result.username }),
                );
                Ok(result)
            }
            Ok(result) => {
                let message = result
                    .message
                    .unwrap_or_else(|| "refresh token rejected".to_string());
                self.expire(&message);
                Err(SdkError::token_expired(message))
            }
            Err(cause) => {
                tracing::warn!(error = %cause, "token refresh failed");
                self.expire(&cause.to_string());
                Err(SdkError::token_refresh_failed(cause))
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        for id in self.subscriptions.get_mut().drain(..) {
            self.bus.unsubscribe(id);
        }
    }
}
