//! GraphQL-backed collaborators.
//!
//! [`GraphqlApi`] implements the session layer's [`AuthApi`], [`UserApi`] and
//! [`CartApi`] by running operations through the middleware pipeline.

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use storefront_core::{Operation, SdkResult};
use storefront_middleware::Pipeline;
use storefront_session::{AddItem, AuthApi, AuthResult, Cart, CartApi, Credentials, User, UserApi, UserUpdate};

/// Operation documents.
pub mod documents {
    /// Exchanges credentials for tokens.
    pub const LOGIN: &str = "mutation Login($input: LoginInput!) { \
        login(input: $input) { succeeded userToken refreshToken username customerType message } }";

    /// Exchanges a refresh token for new tokens.
    pub const REFRESH_TOKEN: &str = "mutation RefreshToken($refreshToken: String!) { \
        refreshToken(refreshToken: $refreshToken) { succeeded userToken refreshToken username customerType message } }";

    /// The token owner's profile.
    pub const ME: &str = "query Me { me { id username email firstName lastName } }";

    /// Partial profile update.
    pub const UPDATE_USER: &str = "mutation UpdateUser($input: UserUpdateInput!) { \
        updateUser(input: $input) { id username email firstName lastName } }";

    /// Fetches a cart by id.
    pub const CART: &str = "query Cart($cartId: ID!) { cart(id: $cartId) { ...CartFields } } \
        fragment CartFields on Cart { id merchantData completed \
        items { id productId skuId quantity message groupKey price listPrice discount } }";

    /// Creates an empty cart.
    pub const CREATE_CART: &str = "mutation CreateCart { createCart { ...CartFields } } \
        fragment CartFields on Cart { id merchantData completed \
        items { id productId skuId quantity message groupKey price listPrice discount } }";

    /// Adds a line.
    pub const ADD_CART_ITEM: &str = "mutation AddCartItem($cartId: ID!, $input: AddCartItemInput!) { \
        addCartItem(cartId: $cartId, input: $input) { ...CartFields } } \
        fragment CartFields on Cart { id merchantData completed \
        items { id productId skuId quantity message groupKey price listPrice discount } }";

    /// Sets a line's quantity.
    pub const UPDATE_CART_ITEM: &str = "mutation UpdateCartItem($cartId: ID!, $lineId: ID!, $quantity: Int!) { \
        updateCartItem(cartId: $cartId, lineId: $lineId, quantity: $quantity) { ...CartFields } } \
        fragment CartFields on Cart { id merchantData completed \
        items { id productId skuId quantity message groupKey price listPrice discount } }";

    /// Deletes a line.
    pub const DELETE_CART_ITEM: &str = "mutation DeleteCartItem($cartId: ID!, $lineId: ID!) { \
        deleteCartItem(cartId: $cartId, lineId: $lineId) { ...CartFields } } \
        fragment CartFields on Cart { id merchantData completed \
        items { id productId skuId quantity message groupKey price listPrice discount } }";

    /// Deletes every line.
    pub const CLEAR_CART: &str = "mutation ClearCart($cartId: ID!) { \
        clearCart(cartId: $cartId) { ...CartFields } } \
        fragment CartFields on Cart { id merchantData completed \
        items { id productId skuId quantity message groupKey price listPrice discount } }";

    /// Replaces merchant data.
    pub const SET_MERCHANT_DATA: &str = "mutation SetCartMerchantData($cartId: ID!, $merchantData: String!) { \
        setCartMerchantData(cartId: $cartId, merchantData: $merchantData) { ...CartFields } } \
        fragment CartFields on Cart { id merchantData completed \
        items { id productId skuId quantity message groupKey price listPrice discount } }";
}

/// Collaborators that run GraphQL operations through a [`Pipeline`].
#[derive(Debug, Clone)]
pub struct GraphqlApi {
    pipeline: Arc<Pipeline>,
}

impl GraphqlApi {
    /// Creates the collaborators over `pipeline`.
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }

    async fn call<T: DeserializeOwned>(&self, operation: Operation, field: &str) -> SdkResult<T> {
        let response = self.pipeline.execute(&operation).await?;
        response.field(field)
    }
}

impl AuthApi for GraphqlApi {
    fn login<'a>(&'a self, credentials: &'a Credentials) -> BoxFuture<'a, SdkResult<AuthResult>> {
        let operation = Operation::new("Login", documents::LOGIN).with_variables(json!({
            "input": {
                "username": credentials.username,
                "password": credentials.password,
                "rememberMe": credentials.remember_me,
            }
        }));
        self.call(operation, "login").boxed()
    }

    fn refresh<'a>(&'a self, refresh_token: &'a str) -> BoxFuture<'a, SdkResult<AuthResult>> {
        let operation = Operation::new("RefreshToken", documents::REFRESH_TOKEN)
            .with_variables(json!({ "refreshToken": refresh_token }));
        self.call(operation, "refreshToken").boxed()
    }
}

impl UserApi for GraphqlApi {
    fn get_user<'a>(&'a self, user_token: &'a str) -> BoxFuture<'a, SdkResult<User>> {
        let operation = Operation::new("Me", documents::ME).with_token(user_token);
        self.call(operation, "me").boxed()
    }

    fn update_user<'a>(
        &'a self,
        user_token: &'a str,
        update: &'a UserUpdate,
    ) -> BoxFuture<'a, SdkResult<User>> {
        let operation = Operation::new("UpdateUser", documents::UPDATE_USER)
            .with_variables(json!({ "input": update }))
            .with_token(user_token);
        self.call(operation, "updateUser").boxed()
    }
}

impl CartApi for GraphqlApi {
    fn get<'a>(&'a self, cart_id: &'a str) -> BoxFuture<'a, SdkResult<Option<Cart>>> {
        let operation =
            Operation::new("Cart", documents::CART).with_variables(json!({ "cartId": cart_id }));
        self.call(operation, "cart").boxed()
    }

    fn create(&self) -> BoxFuture<'_, SdkResult<Cart>> {
        let operation = Operation::new("CreateCart", documents::CREATE_CART);
        self.call(operation, "createCart").boxed()
    }

    fn add_item<'a>(&'a self, cart_id: &'a str, item: &'a AddItem) -> BoxFuture<'a, SdkResult<Cart>> {
        let operation = Operation::new("AddCartItem", documents::ADD_CART_ITEM).with_variables(json!({
            "cartId": cart_id,
            "input": item,
        }));
        self.call(operation, "addCartItem").boxed()
    }

    fn update_item<'a>(
        &'a self,
        cart_id: &'a str,
        line_id: &'a str,
        quantity: u32,
    ) -> BoxFuture<'a, SdkResult<Cart>> {
        let operation = Operation::new("UpdateCartItem", documents::UPDATE_CART_ITEM).with_variables(json!({
            "cartId": cart_id,
            "lineId": line_id,
            "quantity": quantity,
        }));
        self.call(operation, "updateCartItem").boxed()
    }

    fn delete_item<'a>(&'a self, cart_id: &'a str, line_id: &'a str) -> BoxFuture<'a, SdkResult<Cart>> {
        let operation = Operation::new("DeleteCartItem", documents::DELETE_CART_ITEM)
            .with_variables(json!({ "cartId": cart_id, "lineId": line_id }));
        self.call(operation, "deleteCartItem").boxed()
    }

    fn clear<'a>(&'a self, cart_id: &'a str) -> BoxFuture<'a, SdkResult<Cart>> {
        let operation = Operation::new("ClearCart", documents::CLEAR_CART)
            .with_variables(json!({ "cartId": cart_id }));
        self.call(operation, "clearCart").boxed()
    }

    fn set_merchant_data<'a>(
        &'a self,
        cart_id: &'a str,
        merchant_data: &'a str,
    ) -> BoxFuture<'a, SdkResult<Cart>> {
        let operation = Operation::new("SetCartMerchantData", documents::SET_MERCHANT_DATA)
            .with_variables(json!({ "cartId": cart_id, "merchantData": merchant_data }));
        self.call(operation, "setCartMerchantData").boxed()
    }
}
