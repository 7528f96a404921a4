//! Connection manager.
//!
//! The [`ConnectionManager`] owns one transport and handles:
//!
//! - The connection state machine and its events
//! - The `initialize` handshake
//! - Request/response correlation by id
//! - The cached tool list
//! - Automatic reconnection with exponential backoff

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::time::Instant;

use afd_core::error::{AfdError, AfdResultExt, TransportErrorKind};
use afd_core::handshake::{ClientInfo, InitializeRequest, InitializeResult, PROTOCOL_VERSION, ServerInfo};
use afd_core::protocol::{Request, RequestId, Response, methods};
use afd_core::result::CommandResult;
use afd_core::types::{CallToolParams, CallToolResult, ListToolsResult, Tool};
use afd_transport::runtime::{self, AsyncRwLock};
use afd_transport::{HttpTransport, SseTransport, Transport, TransportError};
use futures::channel::oneshot;
use serde_json::Value;
use tracing::{debug, info, trace, warn};

use crate::config::{ClientConfig, TransportKind};
use crate::events::{ClientEvent, Observers, Subscription};
use crate::state::{AtomicState, ConnectionState};

type TransportFactory = Box<dyn Fn(&ClientConfig) -> Result<Arc<dyn Transport>, AfdError> + Send + Sync>;

type Settlement = Result<Response, AfdError>;

/// An outstanding request.
struct PendingRequest {
    method: String,
    sender: oneshot::Sender<Settlement>,
}

/// Stateful connection to a command server.
///
/// Cloning is cheap; clones share the same connection.
///
/// # Example
///
/// ```no_run
/// use afd_client::{ClientConfig, ConnectionManager};
///
/// # async fn example() -> Result<(), afd_core::AfdError> {
/// let manager = ConnectionManager::new(ClientConfig::new("http://localhost:3100/sse"));
/// manager.connect().await?;
///
/// let result = manager
///     .call_tool("todo-create", serde_json::json!({ "title": "Buy milk" }))
///     .await?;
/// assert!(result.is_success());
///
/// manager.disconnect().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

struct Inner {
    config: ClientConfig,
    factory: TransportFactory,
    transport: RwLock<Option<Arc<dyn Transport>>>,
    state: AtomicState,
    /// Pending requests awaiting responses.
    pending: AsyncRwLock<HashMap<RequestId, PendingRequest>>,
    next_id: AtomicU64,
    init: RwLock<Option<InitializeResult>>,
    tools: RwLock<Vec<Tool>>,
    reconnect_attempts: AtomicU32,
    /// Bumped by every manual disconnect; stale close handlers and
    /// reconnect loops compare against it and stand down.
    epoch: AtomicU64,
    events: Observers<ClientEvent>,
}

impl ConnectionManager {
    /// Create a manager that builds the transport named by `config` on
    /// every `connect`.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self::with_factory(config, Box::new(transport_from_config))
    }

    /// Create a manager that reuses `transport` for every connection.
    #[must_use]
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self::with_factory(config, Box::new(move |_| Ok(Arc::clone(&transport))))
    }

    fn with_factory(config: ClientConfig, factory: TransportFactory) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                factory,
                transport: RwLock::new(None),
                state: AtomicState::default(),
                pending: AsyncRwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                init: RwLock::new(None),
                tools: RwLock::new(Vec::new()),
                reconnect_attempts: AtomicU32::new(0),
                epoch: AtomicU64::new(0),
                events: Observers::new(),
            }),
        }
    }

    // ==========================================================================
    // Lifecycle
    // ==========================================================================

    /// Connect the transport and perform the handshake.
    ///
    /// On success the state is `Connected` and the tool list has been
    /// refreshed. On failure the state is `Error`.
    ///
    /// # Errors
    ///
    /// Returns [`AfdError::AlreadyConnected`] when connected, or the
    /// transport or handshake error.
    pub async fn connect(&self) -> Result<(), AfdError> {
        if self.state() == ConnectionState::Connected {
            return Err(AfdError::AlreadyConnected);
        }
        Inner::establish(&self.inner, false).await
    }

    /// Close the transport and reject every outstanding request.
    ///
    /// Any reconnection in progress is abandoned.
    pub async fn disconnect(&self) {
        self.inner.epoch.fetch_add(1, Ordering::AcqRel);
        let transport = self
            .inner
            .transport
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(transport) = transport {
            transport.disconnect().await;
        }
        let rejected = self.inner.reject_all().await;
        self.inner.reconnect_attempts.store(0, Ordering::Release);

        if self.inner.transition(ConnectionState::Disconnected) != ConnectionState::Disconnected {
            info!(rejected, "Disconnected");
            self.inner.events.emit(&ClientEvent::Disconnected);
        }
    }

    /// Disconnect, then connect again. Recovers from the `Error` state.
    ///
    /// # Errors
    ///
    /// Returns the error of the new connection attempt.
    pub async fn reconnect(&self) -> Result<(), AfdError> {
        self.disconnect().await;
        self.connect().await
    }

    /// Register an event observer.
    #[must_use = "dropping the subscription unsubscribes the observer"]
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.inner.events.subscribe(observer)
    }

    // ==========================================================================
    // Accessors
    // ==========================================================================

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.state.load()
    }

    /// Whether the handshake has completed.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Server identity from the last handshake.
    #[must_use]
    pub fn server_info(&self) -> Option<ServerInfo> {
        self.inner
            .init
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|init| init.server_info.clone())
    }

    /// Full result of the last handshake.
    #[must_use]
    pub fn initialize_result(&self) -> Option<InitializeResult> {
        self.inner
            .init
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The cached tool list.
    #[must_use]
    pub fn tools(&self) -> Vec<Tool> {
        self.inner
            .tools
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of outstanding requests.
    pub async fn pending_count(&self) -> usize {
        self.inner.pending.read().await.len()
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    // ==========================================================================
    // Requests
    // ==========================================================================

    /// Send a request with a generated id and return its result.
    ///
    /// # Errors
    ///
    /// Returns an error if not connected, on transport failure, timeout,
    /// disconnect, or a JSON-RPC error response.
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, AfdError> {
        let id = RequestId::Number(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.request_with_id(id, method, params).await
    }

    /// Send a request with a caller-supplied id.
    ///
    /// # Errors
    ///
    /// Returns [`AfdError::DuplicateRequestId`] if `id` is outstanding, and
    /// otherwise the errors of [`request`](Self::request).
    pub async fn request_with_id(
        &self,
        id: impl Into<RequestId>,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, AfdError> {
        let state = self.state();
        if !matches!(state, ConnectionState::Connected | ConnectionState::Connecting) {
            return Err(AfdError::not_connected(state));
        }
        let response = self.inner.send_request(id.into(), method, params).await?;
        response.into_result().map_err(AfdError::from)
    }

    /// Call a tool and decode its [`CommandResult`].
    ///
    /// Business failures, including unknown tool names, are returned as
    /// `Ok(CommandResult::Failure { .. })`.
    ///
    /// # Errors
    ///
    /// Returns an error only when the request itself fails.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<CommandResult, AfdError> {
        let params = serde_json::to_value(CallToolParams::new(name, arguments))?;
        let value = self.request(methods::TOOLS_CALL, Some(params)).await?;
        let result: CallToolResult = serde_json::from_value(value)
            .map_err(AfdError::from)
            .context(format!("Invalid result for tool '{name}'"))?;
        Ok(result.into_command_result())
    }

    /// Fetch the tool list and replace the cache with it.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list_tools(&self) -> Result<Vec<Tool>, AfdError> {
        let value = self.request(methods::TOOLS_LIST, None).await?;
        let result: ListToolsResult = serde_json::from_value(value)
            .map_err(AfdError::from)
            .context("Invalid tools/list result")?;
        self.inner
            .tools
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clone_from(&result.tools);
        Ok(result.tools)
    }

    /// Like [`list_tools`](Self::list_tools), also emitting
    /// [`ClientEvent::ToolsChanged`].
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn refresh_tools(&self) -> Result<Vec<Tool>, AfdError> {
        let tools = self.list_tools().await?;
        self.inner.events.emit(&ClientEvent::tools_changed(&tools));
        Ok(tools)
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.inner.config.endpoint)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

fn transport_from_config(config: &ClientConfig) -> Result<Arc<dyn Transport>, AfdError> {
    let http = config.http_config();
    let transport: Arc<dyn Transport> = match config.transport {
        TransportKind::Sse => Arc::new(SseTransport::new(http)?),
        TransportKind::Http => Arc::new(HttpTransport::new(http)?),
    };
    Ok(transport)
}

// ==========================================================================
// Internals
// ==========================================================================

impl Inner {
    fn transition(&self, to: ConnectionState) -> ConnectionState {
        let from = self.state.swap(to);
        if from != to {
            debug!(%from, %to, "Connection state change");
            self.events.emit(&ClientEvent::StateChange { from, to });
        }
        from
    }

    fn current_transport(&self) -> Option<Arc<dyn Transport>> {
        self.transport
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Connect, handshake and refresh tools.
    ///
    /// While reconnecting the state stays `Reconnecting` until success, and
    /// a failure does not move it to `Error`.
    async fn establish(this: &Arc<Self>, reconnecting: bool) -> Result<(), AfdError> {
        let epoch = this.epoch.load(Ordering::Acquire);
        if !reconnecting {
            this.transition(ConnectionState::Connecting);
        }
        info!(endpoint = %this.config.endpoint, reconnecting, "Connecting");

        match Self::open(this, epoch).await {
            Ok(init) => {
                info!(
                    server = %init.server_info.name,
                    server_version = %init.server_info.version,
                    protocol_version = %init.protocol_version,
                    "Connected"
                );
                let server_info = init.server_info.clone();
                *this.init.write().unwrap_or_else(PoisonError::into_inner) = Some(init);
                this.reconnect_attempts.store(0, Ordering::Release);
                this.transition(ConnectionState::Connected);
                this.events.emit(&ClientEvent::Connected(server_info));

                let manager = ConnectionManager {
                    inner: Arc::clone(this),
                };
                if let Err(e) = manager.refresh_tools().await {
                    warn!(error = %e, "Failed to refresh tools after connecting");
                }
                Ok(())
            }
            Err(e) if this.epoch.load(Ordering::Acquire) != epoch => {
                debug!(error = %e, "Connection attempt abandoned by disconnect");
                Err(e)
            }
            Err(e) => {
                warn!(error = %e, reconnecting, "Connection attempt failed");
                let transport = this
                    .transport
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take();
                if let Some(transport) = transport {
                    transport.disconnect().await;
                }
                if !reconnecting {
                    this.transition(ConnectionState::Error);
                }
                this.events.emit(&ClientEvent::Error(Arc::new(AfdError::connection_failed(
                    e.to_string(),
                ))));
                Err(e)
            }
        }
    }

    /// Open a transport for `epoch`. A `disconnect()` that lands while the
    /// transport is connecting closes it again once `connect` returns.
    async fn open(this: &Arc<Self>, epoch: u64) -> Result<InitializeResult, AfdError> {
        let transport = (this.factory)(&this.config)?;
        Self::wire(this, transport.as_ref(), epoch);
        *this.transport.write().unwrap_or_else(PoisonError::into_inner) =
            Some(Arc::clone(&transport));

        transport.connect().await?;
        if this.epoch.load(Ordering::Acquire) != epoch {
            {
                let mut slot = this.transport.write().unwrap_or_else(PoisonError::into_inner);
                if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, &transport)) {
                    slot.take();
                }
            }
            transport.disconnect().await;
            return Err(AfdError::cancelled("connect"));
        }
        this.handshake().await
    }

    /// Install the transport handlers for `epoch`.
    fn wire(this: &Arc<Self>, transport: &dyn Transport, epoch: u64) {

        let (tx, rx) = runtime::channel::<Response>();
        transport.on_message(Arc::new(move |response| {
            let _ = tx.send(response);
        }));
        spawn_dispatch(Arc::downgrade(this), rx);

        let weak = Arc::downgrade(this);
        transport.on_error(Arc::new(move |error: &TransportError| {
            if let Some(inner) = weak.upgrade() {
                inner.events.emit(&ClientEvent::Error(Arc::new(AfdError::transport(
                    error.kind(),
                    error.to_string(),
                ))));
            }
        }));

        let weak = Arc::downgrade(this);
        transport.on_close(Arc::new(move || {
            let weak = weak.clone();
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        if let Some(inner) = weak.upgrade() {
                            Self::handle_close(&inner, epoch).await;
                        }
                    });
                }
                Err(_) => warn!("Transport closed outside a runtime; cannot reconnect"),
            }
        }));
    }

    async fn handshake(&self) -> Result<InitializeResult, AfdError> {
        let client_info = ClientInfo::new(&self.config.client_name, &self.config.client_version);
        let params = serde_json::to_value(InitializeRequest::new(client_info))?;
        let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::Relaxed));

        let response = self
            .send_request(id, methods::INITIALIZE, Some(params))
            .await
            .map_err(|e| AfdError::handshake_failed_with_source(PROTOCOL_VERSION, e))?;
        let value = response
            .into_result()
            .map_err(|e| AfdError::handshake_failed_with_source(PROTOCOL_VERSION, e.into()))?;
        let init: InitializeResult = serde_json::from_value(value)
            .map_err(|e| AfdError::handshake_failed(format!("Invalid initialize result: {e}")))?;

        if init.protocol_version != PROTOCOL_VERSION {
            warn!(
                server_version = %init.protocol_version,
                client_version = PROTOCOL_VERSION,
                "Server speaks a different protocol version"
            );
        }
        Ok(init)
    }

    /// Register a pending entry, send, and wait for whichever of the direct
    /// return or the message channel settles it first.
    async fn send_request(
        &self,
        id: RequestId,
        method: &str,
        params: Option<Value>,
    ) -> Result<Response, AfdError> {
        let transport = self
            .current_transport()
            .ok_or_else(|| AfdError::not_connected(self.state.load()))?;

        let (sender, mut receiver) = oneshot::channel();
        {
            let mut pending = self.pending.write().await;
            if pending.contains_key(&id) {
                return Err(AfdError::DuplicateRequestId { id: id.to_string() });
            }
            pending.insert(
                id.clone(),
                PendingRequest {
                    method: method.to_string(),
                    sender,
                },
            );
        }

        let request = match params {
            Some(params) => Request::with_params(method.to_string(), id.clone(), params),
            None => Request::new(method.to_string(), id.clone()),
        };
        trace!(%id, method, "Sending request");
        let started = Instant::now();

        let exchange = async {
            tokio::select! {
                biased;
                settled = &mut receiver => return settled,
                sent = transport.send(request) => {
                    self.settle(&id, sent.map_err(AfdError::from)).await;
                }
            }
            receiver.await
        };

        let timeout = self.config.request_timeout;
        let outcome = match tokio::time::timeout(timeout, exchange).await {
            Ok(Ok(settlement)) => settlement,
            // The sender was dropped without settling.
            Ok(Err(_)) => Err(AfdError::Disconnected),
            Err(_) => {
                self.pending.write().await.remove(&id);
                Err(AfdError::timeout(format!("{method} (id {id})"), timeout))
            }
        };

        if self.config.debug {
            debug!(
                %id,
                method,
                elapsed_ms = started.elapsed().as_millis() as u64,
                ok = outcome.is_ok(),
                "Request completed"
            );
        }
        outcome
    }

    /// Settle a pending request. The first settlement wins; later ones for
    /// the same id are ignored.
    async fn settle(&self, id: &RequestId, settlement: Settlement) {
        let entry = self.pending.write().await.remove(id);
        match entry {
            Some(entry) => {
                trace!(%id, method = %entry.method, "Settling request");
                let _ = entry.sender.send(settlement);
            }
            None => trace!(%id, "Response for unknown or settled request"),
        }
    }

    /// Reject every pending request as disconnected.
    async fn reject_all(&self) -> usize {
        let drained: Vec<PendingRequest> = {
            let mut pending = self.pending.write().await;
            pending.drain().map(|(_, entry)| entry).collect()
        };
        let count = drained.len();
        for entry in drained {
            let _ = entry.sender.send(Err(AfdError::Disconnected));
        }
        count
    }

    async fn handle_close(this: &Arc<Self>, epoch: u64) {
        if this.epoch.load(Ordering::Acquire) != epoch
            || this.state.load() != ConnectionState::Connected
        {
            return;
        }
        warn!(endpoint = %this.config.endpoint, "Connection closed unexpectedly");

        this.transport
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        this.reject_all().await;
        this.events.emit(&ClientEvent::Disconnected);

        if this.config.auto_reconnect {
            Self::reconnect_loop(this, epoch).await;
        } else {
            this.transition(ConnectionState::Disconnected);
        }
    }

    async fn reconnect_loop(this: &Arc<Self>, epoch: u64) {
        let max = this.config.max_reconnect_attempts;
        loop {
            if this.epoch.load(Ordering::Acquire) != epoch {
                return;
            }
            let attempt = this.reconnect_attempts.fetch_add(1, Ordering::AcqRel) + 1;
            if attempt > max {
                warn!(max, "Reconnection attempts exhausted");
                this.transition(ConnectionState::Error);
                this.events.emit(&ClientEvent::Error(Arc::new(AfdError::transport(
                    TransportErrorKind::ConnectionClosed,
                    format!("Reconnection failed after {max} attempts"),
                ))));
                return;
            }

            this.transition(ConnectionState::Reconnecting);
            this.events.emit(&ClientEvent::Reconnecting { attempt, max });
            let delay = this.config.reconnect_delay_for(attempt);
            info!(attempt, max, delay_ms = delay.as_millis() as u64, "Scheduling reconnect");
            tokio::time::sleep(delay).await;

            if this.epoch.load(Ordering::Acquire) != epoch {
                return;
            }
            if Self::establish(this, true).await.is_ok() {
                return;
            }
        }
    }
}

/// Route pushed responses to their pending requests.
fn spawn_dispatch(inner: Weak<Inner>, mut rx: runtime::Receiver<Response>) {
    tokio::spawn(async move {
        while let Some(response) = rx.recv().await {
            let Some(inner) = inner.upgrade() else {
                break;
            };
            inner.events.emit(&ClientEvent::Message(response.clone()));
            let id = response.id.clone();
            inner.settle(&id, Ok(response)).await;
        }
    });
}
