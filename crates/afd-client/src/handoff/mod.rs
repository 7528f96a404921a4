//! Handoff connections.
//!
//! A command may answer with a [`HandoffDescriptor`] naming a protocol and
//! an endpoint for a separate live connection. The application registers a
//! [`HandoffHandler`] per protocol in a [`HandoffRegistry`];
//! [`connect_handoff`] picks the handler for a descriptor and lets it
//! establish the connection. [`ReconnectingHandoff`] adds automatic
//! reconnection with backoff on top.

mod reconnect;

pub use reconnect::{ReconnectOptions, ReconnectingHandoff};

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use afd_core::AfdError;
use afd_core::handoff::HandoffDescriptor;
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

// ============================================================================
// Connection
// ============================================================================

/// State of a handoff connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandoffState {
    /// Establishing the connection.
    Connecting,
    /// Open; messages may be sent.
    Connected,
    /// Waiting to retry after an unexpected disconnect.
    Reconnecting,
    /// Closed.
    Disconnected,
    /// Reconnection attempts were exhausted.
    Failed,
}

impl HandoffState {
    /// Lowercase name of the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Disconnected => "disconnected",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for HandoffState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A live connection established by a [`HandoffHandler`].
#[async_trait]
pub trait HandoffConnection: Send + Sync {
    /// Send a message.
    ///
    /// # Errors
    ///
    /// Returns [`AfdError::HandoffNotConnected`] when the connection is not
    /// open, or the protocol's send error.
    async fn send(&self, message: Value) -> Result<(), AfdError>;

    /// Close the connection.
    async fn close(&self);

    /// Current state.
    fn state(&self) -> HandoffState;
}

// ============================================================================
// Callbacks
// ============================================================================

/// Callbacks a handler invokes on connection events.
///
/// Handlers call [`connected`](Self::connected),
/// [`message`](Self::message), [`error`](Self::error) and
/// [`disconnected`](Self::disconnected); unset callbacks are ignored.
#[derive(Clone, Default)]
pub struct HandoffCallbacks {
    on_connect: Option<Arc<dyn Fn() + Send + Sync>>,
    on_message: Option<Arc<dyn Fn(&Value) + Send + Sync>>,
    on_error: Option<Arc<dyn Fn(&AfdError) + Send + Sync>>,
    on_disconnect: Option<Arc<dyn Fn(Option<&str>) + Send + Sync>>,
}

impl HandoffCallbacks {
    /// No callbacks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Called once the connection is open.
    #[must_use]
    pub fn on_connect(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_connect = Some(Arc::new(f));
        self
    }

    /// Called for every received message.
    #[must_use]
    pub fn on_message(mut self, f: impl Fn(&Value) + Send + Sync + 'static) -> Self {
        self.on_message = Some(Arc::new(f));
        self
    }

    /// Called on protocol errors.
    #[must_use]
    pub fn on_error(mut self, f: impl Fn(&AfdError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Called when the connection goes away, with an optional reason.
    #[must_use]
    pub fn on_disconnect(mut self, f: impl Fn(Option<&str>) + Send + Sync + 'static) -> Self {
        self.on_disconnect = Some(Arc::new(f));
        self
    }

    /// Report that the connection is open.
    pub fn connected(&self) {
        if let Some(f) = &self.on_connect {
            f();
        }
    }

    /// Report a received message.
    pub fn message(&self, message: &Value) {
        if let Some(f) = &self.on_message {
            f(message);
        }
    }

    /// Report an error.
    pub fn error(&self, error: &AfdError) {
        if let Some(f) = &self.on_error {
            f(error);
        }
    }

    /// Report that the connection went away.
    pub fn disconnected(&self, reason: Option<&str>) {
        if let Some(f) = &self.on_disconnect {
            f(reason);
        }
    }
}

impl fmt::Debug for HandoffCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandoffCallbacks")
            .field("on_connect", &self.on_connect.is_some())
            .field("on_message", &self.on_message.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_disconnect", &self.on_disconnect.is_some())
            .finish()
    }
}

// ============================================================================
// Handler registry
// ============================================================================

/// Establishes connections for one protocol.
#[async_trait]
pub trait HandoffHandler: Send + Sync {
    /// Connect to the descriptor's endpoint.
    ///
    /// The handler keeps `callbacks` and reports connection events through
    /// them, in particular [`HandoffCallbacks::disconnected`] when the
    /// connection drops.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    async fn connect(
        &self,
        descriptor: &HandoffDescriptor,
        callbacks: HandoffCallbacks,
    ) -> Result<Arc<dyn HandoffConnection>, AfdError>;
}

/// Protocol name to handler mapping, owned by the application.
///
/// Nothing is registered implicitly.
#[derive(Default)]
pub struct HandoffRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn HandoffHandler>>>,
}

impl HandoffRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `protocol`, returning the handler it replaces.
    pub fn register(
        &self,
        protocol: impl Into<String>,
        handler: impl HandoffHandler + 'static,
    ) -> Option<Arc<dyn HandoffHandler>> {
        let protocol = protocol.into();
        debug!(%protocol, "Registering handoff handler");
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(protocol, Arc::new(handler))
    }

    /// Remove the handler for `protocol`. Returns whether one was registered.
    pub fn unregister(&self, protocol: &str) -> bool {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(protocol)
            .is_some()
    }

    /// The handler for `protocol`.
    #[must_use]
    pub fn get(&self, protocol: &str) -> Option<Arc<dyn HandoffHandler>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(protocol)
            .cloned()
    }

    /// Whether a handler is registered for `protocol`.
    #[must_use]
    pub fn has(&self, protocol: &str) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(protocol)
    }

    /// Registered protocol names, sorted.
    #[must_use]
    pub fn protocols(&self) -> Vec<String> {
        let mut protocols: Vec<String> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        protocols.sort();
        protocols
    }

    /// Remove every handler.
    pub fn clear(&self) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl fmt::Debug for HandoffRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandoffRegistry")
            .field("protocols", &self.protocols())
            .finish()
    }
}

/// Connect to a handoff endpoint with the handler registered for its
/// protocol.
///
/// # Errors
///
/// Returns [`AfdError::UnknownProtocol`], listing the registered protocols,
/// when no handler matches, or the handler's error.
pub async fn connect_handoff(
    registry: &HandoffRegistry,
    descriptor: &HandoffDescriptor,
    callbacks: HandoffCallbacks,
) -> Result<Arc<dyn HandoffConnection>, AfdError> {
    let protocol = descriptor.protocol.as_str();
    let Some(handler) = registry.get(protocol) else {
        return Err(AfdError::unknown_protocol(protocol, registry.protocols()));
    };
    debug!(protocol, endpoint = %descriptor.endpoint, "Connecting handoff");
    handler.connect(descriptor, callbacks).await
}
