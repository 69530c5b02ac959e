//! The SDK client.

use crate::api::GraphqlApi;
use crate::error::ClientResult;
use crate::transport::HttpTransport;
use std::sync::Arc;
use storefront_config::ClientConfig;
use storefront_core::storage::MemoryStorage;
use storefront_core::{EventBus, Operation, Response, SdkResult, Storage};
use storefront_middleware::{Interceptors, Pipeline, Transport};
use storefront_session::{AuthApi, CartSession, Session, UserApi};
use storefront_telemetry::{FlushCallback, TelemetryCollector, TelemetrySnapshot};

/// Entry point to the SDK.
///
/// Owns the middleware pipeline and the session and cart managers built on
/// it. The storage and event bus are injected so several clients (one per
/// context) can share them.
///
/// # Example
///
/// ```
/// use storefront::Client;
/// use storefront_config::ClientConfig;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::new(ClientConfig::development())?;
/// assert!(!client.session().is_authenticated());
/// assert_eq!(client.pipeline().stage_names()[0], "identity");
/// # Ok(())
/// # }
/// ```
pub struct Client {
    config: ClientConfig,
    pipeline: Arc<Pipeline>,
    collector: Option<Arc<TelemetryCollector>>,
    bus: Arc<EventBus>,
    storage: Arc<dyn Storage>,
    session: Session,
    cart: CartSession,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.config.endpoint)
            .field("pipeline", &self.pipeline)
            .field("session", &self.session)
            .field("cart", &self.cart)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Builds a client with in-memory storage, a private event bus and the
    /// HTTP transport.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`](crate::ClientError) if the configuration is
    /// invalid or the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        Self::builder(config).build()
    }

    /// Starts building a client.
    #[must_use]
    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    /// Runs an operation through the pipeline.
    ///
    /// # Errors
    ///
    /// Returns the pipeline's error.
    pub async fn execute(&self, operation: &Operation) -> SdkResult<Response> {
        self.pipeline.execute(operation).await
    }

    /// Runs an operation with a valid user token attached, refreshing first
    /// if needed.
    ///
    /// # Errors
    ///
    /// Returns the token error or the pipeline's error.
    pub async fn execute_authenticated(&self, operation: Operation) -> SdkResult<Response> {
        let token = self.session.ensure_valid_token().await?;
        self.pipeline.execute(&operation.with_token(token)).await
    }

    /// The session manager.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The cart manager.
    #[must_use]
    pub fn cart(&self) -> &CartSession {
        &self.cart
    }

    /// The event bus shared by the managers.
    #[must_use]
    pub fn events(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// The storage shared by the managers.
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// The middleware pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    /// The validated configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Current telemetry, or `None` when telemetry is disabled.
    #[must_use]
    pub fn telemetry(&self) -> Option<TelemetrySnapshot> {
        self.collector.as_ref().map(|c| c.snapshot())
    }

    /// Sends a snapshot to the flush callback, if one is configured.
    pub fn flush_telemetry(&self) {
        if let Some(collector) = &self.collector {
            collector.flush();
        }
    }
}

/// Builder for [`Client`].
pub struct ClientBuilder {
    config: ClientConfig,
    storage: Option<Arc<dyn Storage>>,
    bus: Option<Arc<EventBus>>,
    interceptors: Interceptors,
    transport: Option<Arc<dyn Transport>>,
    on_flush: Option<FlushCallback>,
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("config", &self.config)
            .field("storage", &self.storage.is_some())
            .field("bus", &self.bus.is_some())
            .field("transport", &self.transport.is_some())
            .field("on_flush", &self.on_flush.is_some())
            .finish_non_exhaustive()
    }
}

impl ClientBuilder {
    /// Creates a builder for `config`.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            storage: None,
            bus: None,
            interceptors: Interceptors::new(),
            transport: None,
            on_flush: None,
        }
    }

    /// Persists through `storage` instead of a private in-memory store.
    #[must_use]
    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Publishes on `bus` instead of a private one.
    #[must_use]
    pub fn event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Installs user hooks.
    #[must_use]
    pub fn interceptors(mut self, interceptors: Interceptors) -> Self {
        self.interceptors = interceptors;
        self
    }

    /// Replaces the HTTP transport.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Receives telemetry snapshots on flush.
    #[must_use]
    pub fn on_telemetry_flush<F>(mut self, callback: F) -> Self
    where
        F: Fn(TelemetrySnapshot) + Send + Sync + 'static,
    {
        self.on_flush = Some(Arc::new(callback));
        self
    }

    /// Validates the configuration and builds the client.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`](crate::ClientError) if the configuration is
    /// invalid or the HTTP client cannot be built.
    pub fn build(self) -> ClientResult<Client> {
        let config = self.config;
        config.validate()?;

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(config.endpoint.clone())?),
        };

        let collector = config.telemetry.enabled.then(|| {
            let mut builder = TelemetryCollector::builder();
            if let Some(interval) = config.telemetry.flush_interval() {
                builder = builder.flush_interval(interval);
            }
            if let Some(callback) = self.on_flush {
                builder = builder.on_flush(move |snapshot| callback(snapshot));
            }
            builder.build()
        });

        let pipeline = Arc::new(Pipeline::standard(
            &config,
            self.interceptors,
            collector.clone(),
            transport,
        ));

        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryStorage::new()));
        let bus = self.bus.unwrap_or_else(|| Arc::new(EventBus::new()));

        let api = Arc::new(GraphqlApi::new(Arc::clone(&pipeline)));
        let session = Session::new(
            Arc::clone(&api) as Arc<dyn AuthApi>,
            Arc::clone(&api) as Arc<dyn UserApi>,
            Arc::clone(&storage),
            Arc::clone(&bus),
            config.session.clone(),
        );
        let cart = CartSession::new(api, Arc::clone(&storage), Arc::clone(&bus), &config.session);

        tracing::debug!(
            endpoint = %config.endpoint,
            stages = ?pipeline.stage_names(),
            telemetry = collector.is_some(),
            "storefront client ready"
        );

        Ok(Client {
            config,
            pipeline,
            collector,
            bus,
            storage,
            session,
            cart,
        })
    }
}
