//! Process-wide publish/subscribe with optional cross-context broadcast.
//!
//! The [`EventBus`] fans messages out synchronously, in emission order, to
//! local subscribers. A bus may also carry a [`BroadcastTransport`]; every
//! emitted message is handed to it as a second, independent target so that
//! other contexts (tabs, workers, processes) sharing the same storage can
//! react.
//!
//! Event types are hierarchical `PARENT_CHILD` strings. Emitting a child
//! event also emits its parent with the same payload, so subscribers can
//! listen coarsely (`SESSION`) or precisely (`SESSION_REFRESH`).
//!
//! # Example
//!
//! ```
//! use storefront_core::events::{EventBus, EventType};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let bus = EventBus::new();
//! let seen = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&seen);
//! bus.subscribe(EventType::SESSION, move |_| {
//!     counter.fetch_add(1, Ordering::SeqCst);
//! });
//!
//! bus.emit(EventType::SESSION_REFRESH, serde_json::Value::Null);
//! assert_eq!(seen.load(Ordering::SeqCst), 1);
//! ```

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use uuid::Uuid;

/// A hierarchical event type such as `CART_ADD`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventType(Cow<'static, str>);

impl EventType {
    /// Parent of all user events.
    pub const USER: Self = Self::from_static("USER");
    /// A user logged in.
    pub const USER_LOGIN: Self = Self::from_static("USER_LOGIN");
    /// A user logged out.
    pub const USER_LOGOUT: Self = Self::from_static("USER_LOGOUT");
    /// Parent of all session events.
    pub const SESSION: Self = Self::from_static("SESSION");
    /// Tokens were refreshed.
    pub const SESSION_REFRESH: Self = Self::from_static("SESSION_REFRESH");
    /// The session could not be refreshed and was cleared.
    pub const SESSION_EXPIRED: Self = Self::from_static("SESSION_EXPIRED");
    /// Parent of all cart events.
    pub const CART: Self = Self::from_static("CART");
    /// An item was added to the cart.
    pub const CART_ADD: Self = Self::from_static("CART_ADD");
    /// An item was removed from the cart.
    pub const CART_REMOVE: Self = Self::from_static("CART_REMOVE");
    /// An item's quantity or the cart's metadata changed.
    pub const CART_UPDATE: Self = Self::from_static("CART_UPDATE");
    /// The cart was emptied.
    pub const CART_CLEAR: Self = Self::from_static("CART_CLEAR");

    /// Creates an event type from a static name.
    #[must_use]
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// Creates an event type from any name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    /// Returns the name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the parent type (`SESSION` for `SESSION_REFRESH`), if any.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.0
            .split_once('_')
            .filter(|(parent, child)| !parent.is_empty() && !child.is_empty())
            .map(|(parent, _)| Self::new(parent))
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies the bus (execution context) a message originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusId(Uuid);

impl BusId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for BusId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    /// The event type.
    pub subject: EventType,
    /// Arbitrary payload.
    pub payload: serde_json::Value,
    /// The bus that first published this message.
    pub origin: BusId,
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Subscriber callback.
pub type EventHandler = Arc<dyn Fn(&EventMessage) + Send + Sync>;

/// Outbound leg of cross-context delivery.
///
/// Implementations forward messages to peer contexts, which hand them to
/// [`EventBus::deliver`]. Delivery is best effort.
pub trait BroadcastTransport: Send + Sync {
    /// Posts a message to peer contexts.
    fn post(&self, message: &EventMessage);
}

struct Subscription {
    id: SubscriptionId,
    subject: EventType,
    handler: EventHandler,
}

/// Publish/subscribe bus shared by the session, cart and any host code.
pub struct EventBus {
    id: BusId,
    subscribers: RwLock<Vec<Subscription>>,
    next_id: AtomicU64,
    transport: Option<Arc<dyn BroadcastTransport>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("id", &self.id)
            .field("subscribers", &self.subscribers.read().len())
            .field("broadcast", &self.transport.is_some())
            .finish()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Creates a bus with local delivery only.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: BusId::new(),
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            transport: None,
        }
    }

    /// Creates a bus that also posts every message to `transport`.
    #[must_use]
    pub fn with_transport(transport: Arc<dyn BroadcastTransport>) -> Self {
        Self {
            transport: Some(transport),
            ..Self::new()
        }
    }

    /// Returns this bus's identifier.
    #[must_use]
    pub fn id(&self) -> BusId {
        self.id
    }

    /// Registers a handler for exactly `subject`.
    pub fn subscribe<F>(&self, subject: EventType, handler: F) -> SubscriptionId
    where
        F: Fn(&EventMessage) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().push(Subscription {
            id,
            subject,
            handler: Arc::new(handler),
        });
        id
    }

    /// Removes a handler. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        subscribers.len() != before
    }

    /// Returns the number of registered handlers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Publishes `subject` and, if it has one, its parent.
    ///
    /// Local subscribers run synchronously before this returns. Each message
    /// is then posted to the broadcast transport, if configured.
    pub fn emit(&self, subject: EventType, payload: serde_json::Value) {
        let parent = subject.parent();
        let child = EventMessage {
            subject,
            payload,
            origin: self.id,
        };
        let parent = parent.map(|subject| EventMessage {
            subject,
            payload: child.payload.clone(),
            origin: self.id,
        });

        for message in std::iter::once(&child).chain(parent.as_ref()) {
            tracing::trace!(subject = %message.subject, bus = %self.id, "emitting event");
            self.dispatch(message);
            if let Some(transport) = &self.transport {
                transport.post(message);
            }
        }
    }

    /// Delivers a message received from a peer context to local subscribers
    /// only. The parent is not re-derived; peers broadcast it themselves.
    pub fn deliver(&self, message: &EventMessage) {
        self.dispatch(message);
    }

    fn dispatch(&self, message: &EventMessage) {
        // Handlers run without the lock held so they may (un)subscribe.
        let handlers: Vec<EventHandler> = self
            .subscribers
            .read()
            .iter()
            .filter(|s| s.subject == message.subject)
            .map(|s| Arc::clone(&s.handler))
            .collect();

        for handler in handlers {
            handler(message);
        }
    }
}

/// In-process broadcast channel connecting several buses, one per context.
///
/// This is the reference [`BroadcastTransport`]: every bus created with
/// [`BroadcastHub::join`] receives, via [`EventBus::deliver`], each message
/// emitted on any other joined bus.
#[derive(Default)]
pub struct BroadcastHub {
    peers: RwLock<Vec<Weak<EventBus>>>,
}

impl std::fmt::Debug for BroadcastHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastHub")
            .field("peers", &self.peers.read().len())
            .finish()
    }
}

impl BroadcastHub {
    /// Creates an empty hub.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Creates a new bus connected to this hub.
    #[must_use]
    pub fn join(self: &Arc<Self>) -> Arc<EventBus> {
        let link = Arc::new(HubLink {
            hub: Arc::clone(self),
        });
        let bus = Arc::new(EventBus::with_transport(link));
        self.peers.write().push(Arc::downgrade(&bus));
        bus
    }

    /// Returns the number of live buses attached.
    #[must_use]
    pub fn peer_count(&self) -> usize {
        self.peers
            .read()
            .iter()
            .filter(|peer| peer.strong_count() > 0)
            .count()
    }

    fn relay(&self, message: &EventMessage) {
        let peers: Vec<Arc<EventBus>> = {
            let mut peers = self.peers.write();
            peers.retain(|peer| peer.strong_count() > 0);
            peers.iter().filter_map(Weak::upgrade).collect()
        };

        for peer in peers.iter().filter(|peer| peer.id() != message.origin) {
            peer.deliver(message);
        }
    }
}

struct HubLink {
    hub: Arc<BroadcastHub>,
}

impl BroadcastTransport for HubLink {
    fn post(&self, message: &EventMessage) {
        self.hub.relay(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn recorder(bus: &EventBus, subject: EventType) -> Arc<Mutex<Vec<EventMessage>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        bus.subscribe(subject, move |m| sink.lock().push(m.clone()));
        log
    }

    #[test]
    fn test_parent_derivation() {
        assert_eq!(EventType::SESSION_REFRESH.parent(), Some(EventType::SESSION));
        assert_eq!(EventType::CART_ADD.parent(), Some(EventType::CART));
        assert_eq!(EventType::new("ORDER_PAID_LATE").parent(), Some(EventType::new("ORDER")));
        assert_eq!(EventType::SESSION.parent(), None);
        assert_eq!(EventType::new("_X").parent(), None);
    }

    #[test]
    fn test_child_emits_parent_with_same_payload() {
        let bus = EventBus::new();
        let children = recorder(&bus, EventType::CART_ADD);
        let parents = recorder(&bus, EventType::CART);

        bus.emit(EventType::CART_ADD, serde_json::json!({"sku": "x"}));

        assert_eq!(children.lock().len(), 1);
        let parents = parents.lock();
        assert_eq!(parents.len(), 1);
        assert_eq!(parents[0].subject, EventType::CART);
        assert_eq!(parents[0].payload["sku"], "x");
    }

    #[test]
    fn test_emission_order_is_child_then_parent() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for subject in [EventType::SESSION, EventType::SESSION_EXPIRED] {
            let order = Arc::clone(&order);
            bus.subscribe(subject, move |m| order.lock().push(m.subject.clone()));
        }

        bus.emit(EventType::SESSION_EXPIRED, serde_json::Value::Null);
        assert_eq!(
            *order.lock(),
            vec![EventType::SESSION_EXPIRED, EventType::SESSION]
        );
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&log);
        let id = bus.subscribe(EventType::USER_LOGIN, move |_| *sink.lock() += 1);

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(EventType::USER_LOGIN, serde_json::Value::Null);
        assert_eq!(*log.lock(), 0);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_handler_may_subscribe_during_dispatch() {
        let bus = Arc::new(EventBus::new());
        let inner = Arc::clone(&bus);
        bus.subscribe(EventType::CART_CLEAR, move |_| {
            inner.subscribe(EventType::CART_ADD, |_| {});
        });

        bus.emit(EventType::CART_CLEAR, serde_json::Value::Null);
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn test_hub_relays_to_other_buses_only() {
        let hub = BroadcastHub::new();
        let tab_a = hub.join();
        let tab_b = hub.join();

        let seen_a = recorder(&tab_a, EventType::SESSION_REFRESH);
        let seen_b = recorder(&tab_b, EventType::SESSION_REFRESH);
        let parent_b = recorder(&tab_b, EventType::SESSION);

        tab_a.emit(EventType::SESSION_REFRESH, serde_json::Value::Null);

        assert_eq!(seen_a.lock().len(), 1, "local delivery happens once");
        assert_eq!(seen_b.lock().len(), 1);
        assert_eq!(parent_b.lock().len(), 1, "parent is relayed, not re-derived");
        assert_eq!(seen_b.lock()[0].origin, tab_a.id());
    }

    #[test]
    fn test_hub_drops_dead_peers() {
        let hub = BroadcastHub::new();
        let tab_a = hub.join();
        {
            let _tab_b = hub.join();
            assert_eq!(hub.peer_count(), 2);
        }
        tab_a.emit(EventType::USER_LOGOUT, serde_json::Value::Null);
        assert_eq!(hub.peer_count(), 1);
    }
}
