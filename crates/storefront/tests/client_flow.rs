//! Client integration tests.
//!
//! A scripted GraphQL backend stands in for the network. It answers by
//! operation name and keeps carts in the session crate's in-memory fixture,
//! so the whole stack runs: session/cart managers, GraphQL collaborators,
//! the standard pipeline and the transport seam.

use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use storefront::prelude::*;
use storefront_core::{Headers, OperationContext};
use storefront_middleware::{FnTransport, Transport};
use storefront_session::fixtures::{fresh_user_token, InMemoryCartApi};
use storefront_session::token::unsigned_token;
use storefront_session::CartApi;

#[derive(Debug, Clone)]
struct Call {
    name: String,
    headers: Headers,
    token: Option<String>,
}

#[derive(Clone)]
struct Backend {
    calls: Arc<Mutex<Vec<Call>>>,
    carts: Arc<InMemoryCartApi>,
    login_token: Arc<Mutex<String>>,
    refreshes: Arc<AtomicU32>,
}

impl Backend {
    fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            carts: Arc::new(InMemoryCartApi::new()),
            login_token: Arc::new(Mutex::new(fresh_user_token())),
            refreshes: Arc::new(AtomicU32::new(0)),
        }
    }

    fn names(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.name.clone()).collect()
    }

    fn last(&self, name: &str) -> Call {
        self.calls
            .lock()
            .iter()
            .rev()
            .find(|c| c.name == name)
            .cloned()
            .unwrap()
    }

    fn transport(&self) -> Arc<dyn Transport> {
        let backend = self.clone();
        Arc::new(FnTransport::new(move |ctx: &OperationContext, op: &Operation| {
            backend.calls.lock().push(Call {
                name: op.name().to_string(),
                headers: ctx.headers().clone(),
                token: op.token().map(str::to_string),
            });
            let backend = backend.clone();
            let name = op.name().to_string();
            let vars = op.variables().clone();
            async move { backend.answer(&name, &vars).await.map(Response::new) }
        }))
    }

    async fn answer(&self, name: &str, vars: &Value) -> SdkResult<Value> {
        let text = |key: &str| vars[key].as_str().unwrap_or_default().to_string();
        let data = match name {
            "Login" => {
                let user_token = self.login_token.lock().clone();
                json!({ "login": {
                    "succeeded": true,
                    "userToken": user_token,
                    "refreshToken": "refresh-1",
                    "username": vars["input"]["username"],
                }})
            }
            "RefreshToken" => {
                let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 2;
                json!({ "refreshToken": {
                    "succeeded": true,
                    "userToken": fresh_user_token(),
                    "refreshToken": format!("refresh-{n}"),
                }})
            }
            "Me" => json!({ "me": { "id": "u-1", "username": "ada" } }),
            "Cart" => {
                let cart = self.carts.get(&text("cartId")).await?;
                json!({ "cart": cart })
            }
            "CreateCart" => {
                let cart = self.carts.create().await?;
                json!({ "createCart": cart })
            }
            "AddCartItem" => {
                let item: AddItem = serde_json::from_value(vars["input"].clone())?;
                let cart = self.carts.add_item(&text("cartId"), &item).await?;
                json!({ "addCartItem": cart })
            }
            "UpdateCartItem" => {
                let quantity = u32::try_from(vars["quantity"].as_u64().unwrap_or_default())
                    .unwrap_or_default();
                let cart = self
                    .carts
                    .update_item(&text("cartId"), &text("lineId"), quantity)
                    .await?;
                json!({ "updateCartItem": cart })
            }
            "DeleteCartItem" => {
                let cart = self.carts.delete_item(&text("cartId"), &text("lineId")).await?;
                json!({ "deleteCartItem": cart })
            }
            other => return Err(SdkError::graphql(format!("unknown operation {other}"), None)),
        };
        Ok(data)
    }
}

fn config() -> ClientConfig {
    let mut config = ClientConfig::builder()
        .endpoint("https://shop.example.com/graphql")
        .sdk_version("9.9.9")
        .log_level(LogLevel::None)
        .build();
    config.retry.jitter = 0.0;
    config
}

fn client(backend: &Backend) -> Client {
    Client::builder(config())
        .transport(backend.transport())
        .build()
        .unwrap()
}

#[tokio::test]
async fn login_then_profile_uses_bearer_token() {
    let backend = Backend::new();
    let client = client(&backend);

    client
        .session()
        .login(&Credentials::new("ada", "pw"))
        .await
        .unwrap();
    let user = client.session().get_user().await.unwrap();

    assert_eq!(user.username, "ada");
    assert_eq!(backend.names(), vec!["Login", "Me"]);

    let login = backend.last("Login");
    assert_eq!(login.headers.get("x-sdk-version").map(String::as_str), Some("9.9.9"));
    assert!(login.headers.contains_key("x-request-id"));
    assert!(login.headers.contains_key("x-idempotency-key"));
    assert!(login.token.is_none());

    let me = backend.last("Me");
    assert!(!me.headers.contains_key("x-idempotency-key"));
    assert_eq!(me.token, client.session().user_token());

    let telemetry = client.telemetry().unwrap();
    assert_eq!(telemetry.total_requests, 2);
    assert_eq!(telemetry.success_count, 2);
}

#[tokio::test]
async fn expired_token_is_refreshed_before_authenticated_call() {
    let backend = Backend::new();
    *backend.login_token.lock() =
        unsigned_token((chrono::Utc::now() - chrono::Duration::minutes(1)).timestamp());
    let client = client(&backend);
    client
        .session()
        .login(&Credentials::new("ada", "pw"))
        .await
        .unwrap();

    let response = client
        .execute_authenticated(Operation::new("Me", "query Me { me { id } }"))
        .await
        .unwrap();

    assert_eq!(response.data["me"]["id"], "u-1");
    assert_eq!(backend.names(), vec!["Login", "RefreshToken", "Me"]);
    assert_eq!(backend.last("Me").token, client.session().user_token());
    assert_eq!(client.session().refresh_token().as_deref(), Some("refresh-2"));
}

#[tokio::test]
async fn cart_quantities_through_the_client() {
    let backend = Backend::new();
    let client = client(&backend);
    let cart = client.cart();

    for _ in 0..3 {
        cart.add(AddItem::new("sku-1", 1)).await.unwrap();
    }
    assert_eq!(cart.get().await.unwrap().items[0].quantity, 3);

    let current = cart.add(AddItem::new("sku-1", 3)).await.unwrap();
    assert_eq!(current.items[0].quantity, 6);

    let line = current.items[0].id.clone();
    let current = cart.remove(&line).await.unwrap();
    assert_eq!(current.items.len(), 1);
    assert_eq!(current.items[0].quantity, 5);

    assert_eq!(
        backend.names().iter().filter(|n| *n == "CreateCart").count(),
        1
    );
    assert_eq!(backend.carts.cart(&current.id).unwrap().total_quantity(), 5);
}

#[tokio::test]
async fn two_clients_share_session_and_cart() {
    let backend = Backend::new();
    let hub = BroadcastHub::new();
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let open = || {
        Client::builder(config())
            .transport(backend.transport())
            .storage(Arc::clone(&storage))
            .event_bus(hub.join())
            .build()
            .unwrap()
    };
    let (first, second) = (open(), open());

    first
        .session()
        .login(&Credentials::new("ada", "pw"))
        .await
        .unwrap();
    assert!(second.session().is_authenticated());

    let cart = first.cart().add(AddItem::new("sku-1", 2)).await.unwrap();
    let seen = second.cart().get().await.unwrap();
    assert_eq!(seen.id, cart.id);
    assert_eq!(seen.total_quantity(), 2);

    second.session().logout().unwrap();
    assert!(!first.session().is_authenticated());
}

#[tokio::test]
async fn request_hook_headers_reach_the_backend() {
    let backend = Backend::new();
    let client = Client::builder(config())
        .transport(backend.transport())
        .interceptors(Interceptors::new().on_request(|ctx| {
            ctx.headers.insert("x-channel".into(), "mobile".into());
            Ok(())
        }))
        .build()
        .unwrap();

    client
        .execute(&Operation::new("Me", "query Me { me { id } }"))
        .await
        .unwrap();

    assert_eq!(
        backend.last("Me").headers.get("x-channel").map(String::as_str),
        Some("mobile")
    );
}

#[tokio::test]
async fn flush_callback_receives_snapshot() {
    let backend = Backend::new();
    let flushed = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&flushed);
    let client = Client::builder(config())
        .transport(backend.transport())
        .on_telemetry_flush(move |snapshot| sink.lock().push(snapshot))
        .build()
        .unwrap();

    client
        .execute(&Operation::new("Me", "query Me { me { id } }"))
        .await
        .unwrap();
    let _ = client.execute(&Operation::new("Nope", "query Nope { nope }")).await;
    client.flush_telemetry();

    let flushed = flushed.lock();
    assert_eq!(flushed.len(), 1);
    assert_eq!(flushed[0].total_requests, 2);
    assert_eq!(flushed[0].error_count, 1);
}
