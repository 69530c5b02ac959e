//! In-memory collaborators for tests and examples.
//!
//! These implement [`AuthApi`], [`UserApi`] and [`CartApi`] without a
//! network so the session and cart managers can be exercised end to end.

use crate::api::{AddItem, AuthApi, AuthResult, Cart, CartApi, CartItem, Credentials, User, UserApi, UserUpdate};
use crate::token::unsigned_token;
use chrono::Utc;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use storefront_core::{SdkError, SdkResult};

/// A user token valid for one hour from now.
#[must_use]
pub fn fresh_user_token() -> String {
    unsigned_token((Utc::now() + chrono::Duration::hours(1)).timestamp())
}

#[derive(Debug, Clone)]
enum RefreshOutcome {
    Succeed,
    Reject(String),
    Fail(SdkError),
}

/// Scripted authentication backend.
///
/// Logins succeed unless [`reject_login`](Self::reject_login) is set.
/// Refreshes succeed with a new token pair unless scripted otherwise, and
/// are counted.
#[derive(Debug)]
pub struct MockAuthApi {
    login_token: Option<String>,
    refresh_user_token: Option<String>,
    login_rejection: Option<String>,
    refresh_outcome: RefreshOutcome,
    refresh_delay: Duration,
    refresh_calls: AtomicUsize,
    issued: AtomicU64,
}

impl Default for MockAuthApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAuthApi {
    /// Creates a backend that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self {
            login_token: None,
            refresh_user_token: None,
            login_rejection: None,
            refresh_outcome: RefreshOutcome::Succeed,
            refresh_delay: Duration::ZERO,
            refresh_calls: AtomicUsize::new(0),
            issued: AtomicU64::new(0),
        }
    }

    /// User token returned by login instead of a fresh one.
    #[must_use]
    pub fn with_login_token(mut self, token: String) -> Self {
        self.login_token = Some(token);
        self
    }

    /// User token returned by refresh instead of a fresh one.
    #[must_use]
    pub fn with_refresh_token(mut self, token: String) -> Self {
        self.refresh_user_token = Some(token);
        self
    }

    /// Makes refresh take `delay` (tokio time).
    #[must_use]
    pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = delay;
        self
    }

    /// Makes login answer `succeeded: false`.
    #[must_use]
    pub fn reject_login(mut self, message: impl Into<String>) -> Self {
        self.login_rejection = Some(message.into());
        self
    }

    /// Makes refresh answer `succeeded: false`.
    #[must_use]
    pub fn reject_refresh(mut self, message: impl Into<String>) -> Self {
        self.refresh_outcome = RefreshOutcome::Reject(message.into());
        self
    }

    /// Makes the refresh call itself fail.
    #[must_use]
    pub fn fail_refresh(mut self, error: SdkError) -> Self {
        self.refresh_outcome = RefreshOutcome::Fail(error);
        self
    }

    /// Number of refresh calls received.
    #[must_use]
    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    fn next_refresh_token(&self) -> String {
        format!("refresh-{}", self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

impl AuthApi for MockAuthApi {
    fn login<'a>(&'a self, credentials: &'a Credentials) -> BoxFuture<'a, SdkResult<AuthResult>> {
        async move {
            if let Some(message) = &self.login_rejection {
                return Ok(AuthResult {
                    succeeded: false,
                    message: Some(message.clone()),
                    ..AuthResult::default()
                });
            }
            Ok(AuthResult {
                succeeded: true,
                user_token: Some(self.login_token.clone().unwrap_or_else(fresh_user_token)),
                refresh_token: Some(self.next_refresh_token()),
                username: Some(credentials.username.clone()),
                customer_type: Some("B2C".to_string()),
                message: None,
            })
        }
        .boxed()
    }

    fn refresh<'a>(&'a self, _refresh_token: &'a str) -> BoxFuture<'a, SdkResult<AuthResult>> {
        async move {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            if !self.refresh_delay.is_zero() {
                tokio::time::sleep(self.refresh_delay).await;
            }
            match &self.refresh_outcome {
                RefreshOutcome::Succeed => Ok(AuthResult {
                    succeeded: true,
                    user_token: Some(
                        self.refresh_user_token
                            .clone()
                            .unwrap_or_else(fresh_user_token),
                    ),
                    refresh_token: Some(self.next_refresh_token()),
                    ..AuthResult::default()
                }),
                RefreshOutcome::Reject(message) => Ok(AuthResult {
                    succeeded: false,
                    message: Some(message.clone()),
                    ..AuthResult::default()
                }),
                RefreshOutcome::Fail(error) => Err(error.clone()),
            }
        }
        .boxed()
    }
}

/// Single-profile user backend.
#[derive(Debug)]
pub struct MockUserApi {
    profile: Mutex<User>,
    last_token: Mutex<Option<String>>,
}

impl Default for MockUserApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockUserApi {
    /// Creates a backend holding the profile `shopper`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            profile: Mutex::new(User {
                id: "user-1".to_string(),
                username: "shopper".to_string(),
                email: Some("shopper@example.com".to_string()),
                ..User::default()
            }),
            last_token: Mutex::new(None),
        }
    }

    /// The token used by the most recent call.
    #[must_use]
    pub fn last_token(&self) -> Option<String> {
        self.last_token.lock().clone()
    }
}

impl UserApi for MockUserApi {
    fn get_user<'a>(&'a self, user_token: &'a str) -> BoxFuture<'a, SdkResult<User>> {
        async move {
            *self.last_token.lock() = Some(user_token.to_string());
            Ok(self.profile.lock().clone())
        }
        .boxed()
    }

    fn update_user<'a>(
        &'a self,
        user_token: &'a str,
        update: &'a UserUpdate,
    ) -> BoxFuture<'a, SdkResult<User>> {
        async move {
            *self.last_token.lock() = Some(user_token.to_string());
            let mut profile = self.profile.lock();
            if let Some(email) = &update.email {
                profile.email = Some(email.clone());
            }
            if let Some(first_name) = &update.first_name {
                profile.first_name = Some(first_name.clone());
            }
            if let Some(last_name) = &update.last_name {
                profile.last_name = Some(last_name.clone());
            }
            Ok(profile.clone())
        }
        .boxed()
    }
}

/// Cart backend keeping carts in a map.
///
/// Ids are sequential: `cart-1`, `cart-2`, ... and `line-1`, `line-2`, ...
#[derive(Debug, Default)]
pub struct InMemoryCartApi {
    carts: Mutex<HashMap<String, Cart>>,
    next_cart: AtomicU64,
    next_line: AtomicU64,
    creates: AtomicUsize,
}

impl InMemoryCartApi {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of a stored cart.
    #[must_use]
    pub fn cart(&self, cart_id: &str) -> Option<Cart> {
        self.carts.lock().get(cart_id).cloned()
    }

    /// Stores `cart` as-is.
    pub fn insert(&self, cart: Cart) {
        self.carts.lock().insert(cart.id.clone(), cart);
    }

    /// Marks a cart as checked out.
    pub fn complete(&self, cart_id: &str) {
        if let Some(cart) = self.carts.lock().get_mut(cart_id) {
            cart.completed = true;
        }
    }

    /// Number of carts created through [`CartApi::create`].
    #[must_use]
    pub fn create_calls(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    fn mutate(&self, cart_id: &str, f: impl FnOnce(&mut Cart) -> SdkResult<()>) -> SdkResult<Cart> {
        let mut carts = self.carts.lock();
        let cart = carts
            .get_mut(cart_id)
            .ok_or_else(|| SdkError::cart(format!("cart {cart_id} not found")))?;
        if cart.completed {
            return Err(SdkError::cart(format!("cart {cart_id} is completed")));
        }
        f(cart)?;
        Ok(cart.clone())
    }
}

fn line_mut<'c>(cart: &'c mut Cart, line_id: &str) -> SdkResult<&'c mut CartItem> {
    cart.items
        .iter_mut()
        .find(|item| item.id == line_id)
        .ok_or_else(|| SdkError::cart(format!("line {line_id} not found")))
}

impl CartApi for InMemoryCartApi {
    fn get<'a>(&'a self, cart_id: &'a str) -> BoxFuture<'a, SdkResult<Option<Cart>>> {
        async move { Ok(self.cart(cart_id)) }.boxed()
    }

    fn create(&self) -> BoxFuture<'_, SdkResult<Cart>> {
        async move {
            self.creates.fetch_add(1, Ordering::SeqCst);
            let id = format!("cart-{}", self.next_cart.fetch_add(1, Ordering::SeqCst) + 1);
            let cart = Cart {
                id,
                ..Cart::default()
            };
            self.insert(cart.clone());
            Ok(cart)
        }
        .boxed()
    }

    fn add_item<'a>(&'a self, cart_id: &'a str, item: &'a AddItem) -> BoxFuture<'a, SdkResult<Cart>> {
        async move {
            let line_id = format!("line-{}", self.next_line.fetch_add(1, Ordering::SeqCst) + 1);
            self.mutate(cart_id, |cart| {
                cart.items.push(CartItem {
                    id: line_id,
                    product_id: Some(format!("product-of-{}", item.sku_id)),
                    sku_id: Some(item.sku_id.clone()),
                    quantity: item.quantity,
                    message: item.message.clone(),
                    ..CartItem::default()
                });
                Ok(())
            })
        }
        .boxed()
    }

    fn update_item<'a>(
        &'a self,
        cart_id: &'a str,
        line_id: &'a str,
        quantity: u32,
    ) -> BoxFuture<'a, SdkResult<Cart>> {
        async move {
            if quantity == 0 {
                return Err(SdkError::cart("quantity must be positive"));
            }
            self.mutate(cart_id, |cart| {
                line_mut(cart, line_id)?.quantity = quantity;
                Ok(())
            })
        }
        .boxed()
    }

    fn delete_item<'a>(&'a self, cart_id: &'a str, line_id: &'a str) -> BoxFuture<'a, SdkResult<Cart>> {
        async move {
            self.mutate(cart_id, |cart| {
                let before = cart.items.len();
                cart.items.retain(|item| item.id != line_id);
                if cart.items.len() == before {
                    return Err(SdkError::cart(format!("line {line_id} not found")));
                }
                Ok(())
            })
        }
        .boxed()
    }

    fn clear<'a>(&'a self, cart_id: &'a str) -> BoxFuture<'a, SdkResult<Cart>> {
        async move {
            self.mutate(cart_id, |cart| {
                cart.items.clear();
                Ok(())
            })
        }
        .boxed()
    }

    fn set_merchant_data<'a>(
        &'a self,
        cart_id: &'a str,
        merchant_data: &'a str,
    ) -> BoxFuture<'a, SdkResult<Cart>> {
        async move {
            self.mutate(cart_id, |cart| {
                cart.merchant_data = Some(merchant_data.to_string());
                Ok(())
            })
        }
        .boxed()
    }
}
