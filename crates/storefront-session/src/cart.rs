//! Cart state.
//!
//! [`CartSession`] resolves the shopper's cart once and caches it. The cart
//! id is persisted, so another context sharing the storage resolves the same
//! cart; a remote `CART` event drops the cache so the next read re-resolves.

use crate::api::{AddItem, Cart, CartApi, CartItem};
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Map, Value};
use std::sync::{Arc, Weak};
use std::time::Duration;
use storefront_config::SessionConfig;
use storefront_core::events::{BusId, SubscriptionId};
use storefront_core::{EventBus, EventType, SdkError, SdkResult, Storage, StorageKey, StorageOptions};

struct Inner {
    api: Arc<dyn CartApi>,
    storage: Arc<dyn Storage>,
    bus: Arc<EventBus>,
    max_age: Duration,
    cache: RwLock<Option<Cart>>,
    subscription: Mutex<Option<SubscriptionId>>,
}

/// The shopper's cart.
///
/// Cloning is cheap; clones share the cache.
#[derive(Clone)]
pub struct CartSession {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for CartSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartSession")
            .field("cart_id", &self.cart_id())
            .field("cached", &self.inner.cache.read().is_some())
            .finish()
    }
}

impl CartSession {
    /// Creates a cart session. The cart id is kept for the "remember me"
    /// max-age.
    pub fn new(
        api: Arc<dyn CartApi>,
        storage: Arc<dyn Storage>,
        bus: Arc<EventBus>,
        config: &SessionConfig,
    ) -> Self {
        let inner = Arc::new(Inner {
            api,
            storage,
            bus,
            max_age: config.max_age(true),
            cache: RwLock::new(None),
            subscription: Mutex::new(None),
        });

        let weak: Weak<Inner> = Arc::downgrade(&inner);
        let local: BusId = inner.bus.id();
        let id = inner.bus.subscribe(EventType::CART, move |message| {
            if message.origin == local {
                return;
            }
            if let Some(inner) = weak.upgrade() {
                tracing::debug!(origin = %message.origin, "cart changed elsewhere; dropping cache");
                inner.cache.write().take();
            }
        });
        *inner.subscription.lock() = Some(id);

        Self { inner }
    }

    /// The persisted cart id, if any.
    #[must_use]
    pub fn cart_id(&self) -> Option<String> {
        self.inner.storage.get(StorageKey::CartId.as_str())
    }

    /// The cached cart, without resolving.
    #[must_use]
    pub fn cached(&self) -> Option<Cart> {
        self.inner.cache.read().clone()
    }

    /// Drops the cached cart.
    pub fn invalidate(&self) {
        self.inner.cache.write().take();
    }

    /// Returns the current cart.
    ///
    /// Resolution order is the cache, then the persisted id, then a new
    /// cart. A persisted id whose cart is missing or completed is replaced.
    ///
    /// # Errors
    ///
    /// Returns the backend's error or a storage error.
    pub async fn get(&self) -> SdkResult<Cart> {
        if let Some(cart) = self.cached() {
            return Ok(cart);
        }

        if let Some(cart_id) = self.cart_id() {
            match self.inner.api.get(&cart_id).await? {
                Some(cart) if !cart.completed => {
                    self.inner.store(&cart);
                    return Ok(cart);
                }
                Some(_) => tracing::debug!(cart_id, "stored cart is completed; starting a new one"),
                None => tracing::debug!(cart_id, "stored cart not found; starting a new one"),
            }
        }

        self.create().await
    }

    /// Starts a new empty cart and makes it current.
    ///
    /// # Errors
    ///
    /// Returns the backend's error or a storage error.
    pub async fn create(&self) -> SdkResult<Cart> {
        let cart = self.inner.api.create().await?;
        self.inner.storage.set(
            StorageKey::CartId.as_str(),
            &cart.id,
            StorageOptions::max_age(self.inner.max_age),
        )?;
        tracing::info!(cart_id = %cart.id, "cart created");
        self.inner.store(&cart);
        Ok(cart)
    }

    /// Adds units to the cart.
    ///
    /// A line matching `item.line_id`, or else the same SKU with the same
    /// message, is incremented instead of adding a duplicate line. Emits
    /// `CART_ADD`.
    ///
    /// # Errors
    ///
    /// `SdkError::Cart` for a zero quantity, or the backend's error.
    pub async fn add(&self, item: AddItem) -> SdkResult<Cart> {
        if item.quantity == 0 {
            return Err(SdkError::cart("quantity must be positive"));
        }
        let cart = self.get().await?;

        let existing = item
            .line_id
            .as_deref()
            .and_then(|line_id| cart.line(line_id))
            .or_else(|| {
                cart.items.iter().find(|line| {
                    line.sku_id.as_deref() == Some(item.sku_id.as_str()) && line.message == item.message
                })
            });

        let updated = match existing {
            Some(line) => {
                let quantity = line.quantity.saturating_add(item.quantity);
                self.inner.api.update_item(&cart.id, &line.id, quantity).await?
            }
            None => self.inner.api.add_item(&cart.id, &item).await?,
        };

        Ok(self.inner.commit(
            updated,
            EventType::CART_ADD,
            json!({ "skuId": item.sku_id, "quantity": item.quantity }),
        ))
    }

    /// Removes one unit from a line, deleting the line at zero. Emits
    /// `CART_REMOVE`.
    ///
    /// # Errors
    ///
    /// `SdkError::Cart` if the line does not exist, or the backend's error.
    pub async fn remove(&self, line_id: &str) -> SdkResult<Cart> {
        let cart = self.get().await?;
        let line = find_line(&cart, line_id)?;

        let updated = if line.quantity <= 1 {
            self.inner.api.delete_item(&cart.id, line_id).await?
        } else {
            self.inner
                .api
                .update_item(&cart.id, line_id, line.quantity - 1)
                .await?
        };

        Ok(self.inner.commit(
            updated,
            EventType::CART_REMOVE,
            json!({ "lineId": line_id, "quantity": 1 }),
        ))
    }

    /// Sets a line's quantity; zero deletes it. Emits `CART_UPDATE`.
    ///
    /// # Errors
    ///
    /// `SdkError::Cart` if the line does not exist, or the backend's error.
    pub async fn update(&self, line_id: &str, quantity: u32) -> SdkResult<Cart> {
        let cart = self.get().await?;
        find_line(&cart, line_id)?;

        let updated = if quantity == 0 {
            self.inner.api.delete_item(&cart.id, line_id).await?
        } else {
            self.inner.api.update_item(&cart.id, line_id, quantity).await?
        };

        Ok(self.inner.commit(
            updated,
            EventType::CART_UPDATE,
            json!({ "lineId": line_id, "quantity": quantity }),
        ))
    }

    /// Deletes a line. Emits `CART_REMOVE`.
    ///
    /// # Errors
    ///
    /// `SdkError::Cart` if the line does not exist, or the backend's error.
    pub async fn delete(&self, line_id: &str) -> SdkResult<Cart> {
        let cart = self.get().await?;
        let line = find_line(&cart, line_id)?;
        let quantity = line.quantity;

        let updated = self.inner.api.delete_item(&cart.id, line_id).await?;
        Ok(self.inner.commit(
            updated,
            EventType::CART_REMOVE,
            json!({ "lineId": line_id, "quantity": quantity }),
        ))
    }

    /// Deletes every line. Emits `CART_CLEAR`.
    ///
    /// # Errors
    ///
    /// Returns the backend's error.
    pub async fn clear(&self) -> SdkResult<Cart> {
        let cart = self.get().await?;
        let updated = self.inner.api.clear(&cart.id).await?;
        Ok(self
            .inner
            .commit(updated, EventType::CART_CLEAR, json!({ "cartId": cart.id })))
    }

    /// Merges `identity`'s fields into the cart's merchant data. Emits
    /// `CART_UPDATE`.
    ///
    /// Existing merchant data that is not a JSON object is replaced.
    ///
    /// # Errors
    ///
    /// `SdkError::Cart` if `identity` is not an object, or the backend's
    /// error.
    pub async fn associate_user(&self, identity: &Value) -> SdkResult<Cart> {
        let Value::Object(fields) = identity else {
            return Err(SdkError::cart("user identity must be a JSON object"));
        };
        let cart = self.get().await?;

        let merged = merge_merchant_data(cart.merchant_data.as_deref(), fields);
        let merchant_data =
            serde_json::to_string(&merged).map_err(|e| SdkError::serialization(e.to_string()))?;

        let updated = self
            .inner
            .api
            .set_merchant_data(&cart.id, &merchant_data)
            .await?;
        Ok(self
            .inner
            .commit(updated, EventType::CART_UPDATE, json!({ "merchantData": merged })))
    }
}

impl Inner {
    fn store(&self, cart: &Cart) {
        *self.cache.write() = Some(cart.clone());
    }

    fn commit(&self, cart: Cart, subject: EventType, mut payload: Value) -> Cart {
        self.store(&cart);
        if let Value::Object(fields) = &mut payload {
            fields.insert("cartId".to_string(), Value::String(cart.id.clone()));
        }
        tracing::debug!(cart_id = %cart.id, event = %subject, items = cart.items.len(), "cart updated");
        self.bus.emit(subject, payload);
        cart
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(id) = self.subscription.get_mut().take() {
            self.bus.unsubscribe(id);
        }
    }
}

fn find_line<'c>(cart: &'c Cart, line_id: &str) -> SdkResult<&'c CartItem> {
    cart.line(line_id)
        .ok_or_else(|| SdkError::cart(format!("line {line_id} not in cart {}", cart.id)))
}

fn merge_merchant_data(existing: Option<&str>, fields: &Map<String, Value>) -> Value {
    let mut merged = match existing.map(serde_json::from_str::<Value>) {
        Some(Ok(Value::Object(map))) => map,
        Some(_) => {
            tracing::debug!("merchant data is not a JSON object; overwriting");
            Map::new()
        }
        None => Map::new(),
    };
    merged.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
    Value::Object(merged)
}
