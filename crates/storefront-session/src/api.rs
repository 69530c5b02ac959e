//! Collaborator contracts for the session layer.
//!
//! The session and cart managers never talk to the network directly. They
//! call these traits, which the facade crate implements on top of the
//! middleware pipeline and tests implement in memory (see
//! [`fixtures`](crate::fixtures)).

use futures_util::future::BoxFuture;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use storefront_core::SdkResult;

/// Login credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Account name or email.
    pub username: String,
    /// Account password.
    pub password: String,
    /// Keep the session for the long "remember me" period.
    #[serde(default)]
    pub remember_me: bool,
}

impl Credentials {
    /// Creates credentials with a session-length policy.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            remember_me: false,
        }
    }

    /// Sets the "remember me" policy.
    #[must_use]
    pub fn remember_me(mut self, remember_me: bool) -> Self {
        self.remember_me = remember_me;
        self
    }
}

/// Result of a login or refresh call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResult {
    /// Whether the backend accepted the request.
    pub succeeded: bool,
    /// Short-lived access token (JWT).
    #[serde(default)]
    pub user_token: Option<String>,
    /// Long-lived refresh token.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// The authenticated user's name.
    #[serde(default)]
    pub username: Option<String>,
    /// Customer classification reported by the backend.
    #[serde(default)]
    pub customer_type: Option<String>,
    /// Backend message, usually set on failure.
    #[serde(default)]
    pub message: Option<String>,
}

/// A user profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Backend identifier.
    pub id: String,
    /// Login name.
    pub username: String,
    /// Email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Given name.
    #[serde(default)]
    pub first_name: Option<String>,
    /// Family name.
    #[serde(default)]
    pub last_name: Option<String>,
}

/// Partial profile update. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    /// New email address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// New given name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    /// New family name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

/// One line of a cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    /// Line identifier.
    pub id: String,
    /// Product the SKU belongs to.
    #[serde(default)]
    pub product_id: Option<String>,
    /// Purchased SKU.
    #[serde(default)]
    pub sku_id: Option<String>,
    /// Units on this line. Never zero in a well-formed cart.
    pub quantity: u32,
    /// Gift message or personalisation text.
    #[serde(default)]
    pub message: Option<String>,
    /// Bundle or package key shared by grouped lines.
    #[serde(default)]
    pub group_key: Option<String>,
    /// Price charged.
    #[serde(default)]
    pub price: Decimal,
    /// Price before discounts.
    #[serde(default)]
    pub list_price: Decimal,
    /// Discount applied.
    #[serde(default)]
    pub discount: Decimal,
}

/// A shopping cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    /// Cart identifier.
    pub id: String,
    /// Cart lines.
    #[serde(default)]
    pub items: Vec<CartItem>,
    /// Free-form merchant data, usually JSON.
    #[serde(default)]
    pub merchant_data: Option<String>,
    /// Whether the cart has been checked out.
    #[serde(default)]
    pub completed: bool,
}

impl Cart {
    /// Finds a line by id.
    #[must_use]
    pub fn line(&self, line_id: &str) -> Option<&CartItem> {
        self.items.iter().find(|item| item.id == line_id)
    }

    /// Total units across all lines.
    #[must_use]
    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}

/// An item to add to the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItem {
    /// SKU to add.
    pub sku_id: String,
    /// Units to add.
    pub quantity: u32,
    /// Optional message; lines with different messages stay separate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Existing line to increment, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_id: Option<String>,
}

impl AddItem {
    /// Creates an add request for `quantity` units of `sku_id`.
    #[must_use]
    pub fn new(sku_id: impl Into<String>, quantity: u32) -> Self {
        Self {
            sku_id: sku_id.into(),
            quantity,
            message: None,
            line_id: None,
        }
    }

    /// Attaches a message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Targets an existing line.
    #[must_use]
    pub fn for_line(mut self, line_id: impl Into<String>) -> Self {
        self.line_id = Some(line_id.into());
        self
    }
}

/// Authentication backend.
pub trait AuthApi: Send + Sync {
    /// Exchanges credentials for tokens.
    fn login<'a>(&'a self, credentials: &'a Credentials) -> BoxFuture<'a, SdkResult<AuthResult>>;

    /// Exchanges a refresh token for new tokens.
    fn refresh<'a>(&'a self, refresh_token: &'a str) -> BoxFuture<'a, SdkResult<AuthResult>>;
}

/// User profile backend.
pub trait UserApi: Send + Sync {
    /// Fetches the profile of the token's owner.
    fn get_user<'a>(&'a self, user_token: &'a str) -> BoxFuture<'a, SdkResult<User>>;

    /// Applies a partial update and returns the new profile.
    fn update_user<'a>(
        &'a self,
        user_token: &'a str,
        update: &'a UserUpdate,
    ) -> BoxFuture<'a, SdkResult<User>>;
}

/// Cart backend. Every mutation returns the cart as the backend now sees it.
pub trait CartApi: Send + Sync {
    /// Fetches a cart; `None` if the id is unknown.
    fn get<'a>(&'a self, cart_id: &'a str) -> BoxFuture<'a, SdkResult<Option<Cart>>>;

    /// Creates an empty cart.
    fn create(&self) -> BoxFuture<'_, SdkResult<Cart>>;

    /// Adds a new line.
    fn add_item<'a>(&'a self, cart_id: &'a str, item: &'a AddItem) -> BoxFuture<'a, SdkResult<Cart>>;

    /// Sets a line's quantity (always positive).
    fn update_item<'a>(
        &'a self,
        cart_id: &'a str,
        line_id: &'a str,
        quantity: u32,
    ) -> BoxFuture<'a, SdkResult<Cart>>;

    /// Deletes a line.
    fn delete_item<'a>(&'a self, cart_id: &'a str, line_id: &'a str)
        -> BoxFuture<'a, SdkResult<Cart>>;

    /// Deletes every line.
    fn clear<'a>(&'a self, cart_id: &'a str) -> BoxFuture<'a, SdkResult<Cart>>;

    /// Replaces the merchant data string.
    fn set_merchant_data<'a>(
        &'a self,
        cart_id: &'a str,
        merchant_data: &'a str,
    ) -> BoxFuture<'a, SdkResult<Cart>>;
}
