//! Transport traits.
//!
//! A [`Transport`] carries one request to a command executor and returns its
//! response. Transports may additionally deliver out-of-band responses to a
//! registered message handler, report errors, and report that the
//! connection closed.
//!
//! # Overview
//!
//! - [`Transport`]: request/response contract plus handler registration
//! - [`TransportHandlers`]: the single-slot handler storage every transport
//!   in this crate embeds
//! - [`TransportMetadata`]: descriptive information for logging
//!
//! # Example
//!
//! ```no_run
//! use afd_core::protocol::{Request, methods};
//! use afd_transport::{HttpTransportConfig, SseTransport, Transport, TransportError};
//!
//! # async fn run() -> Result<(), TransportError> {
//! let transport = SseTransport::new(HttpTransportConfig::new("http://localhost:3100/sse"))?;
//! transport.on_message(std::sync::Arc::new(|response| {
//!     tracing::debug!(id = %response.id, "pushed response");
//! }));
//! transport.connect().await?;
//! let response = transport.send(Request::new(methods::TOOLS_LIST, 1u64)).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use afd_core::protocol::{Request, Response};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;

/// Handler for responses delivered by the transport.
pub type MessageHandler = Arc<dyn Fn(Response) + Send + Sync>;

/// Handler for transport errors that are not tied to a request.
pub type ErrorHandler = Arc<dyn Fn(&TransportError) + Send + Sync>;

/// Handler for the connection closing.
pub type CloseHandler = Arc<dyn Fn() + Send + Sync>;

/// Metadata about a transport connection.
#[derive(Debug, Clone, Default)]
pub struct TransportMetadata {
    /// Transport type identifier (`sse`, `http`, `direct`).
    pub transport_type: String,
    /// Remote address, if applicable.
    pub remote_addr: Option<String>,
    /// When the connection was established.
    pub connected_at: Option<Instant>,
    /// Whether the transport can push messages without a request.
    pub push: bool,
}

impl TransportMetadata {
    /// Create new metadata for a transport type.
    #[must_use]
    pub fn new(transport_type: impl Into<String>) -> Self {
        Self {
            transport_type: transport_type.into(),
            remote_addr: None,
            connected_at: None,
            push: false,
        }
    }

    /// Set the remote address.
    #[must_use]
    pub fn remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = Some(addr.into());
        self
    }

    /// Set the connection time.
    #[must_use]
    pub const fn connected_at(mut self, at: Option<Instant>) -> Self {
        self.connected_at = at;
        self
    }

    /// Mark the transport as push-capable.
    #[must_use]
    pub const fn push(mut self, push: bool) -> Self {
        self.push = push;
        self
    }
}

/// Core transport trait.
///
/// Implementations are `Send + Sync` and used behind `Arc<dyn Transport>`,
/// so `send` may be called concurrently from several tasks.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establish the connection.
    async fn connect(&self) -> Result<(), TransportError>;

    /// Tear the connection down. Never fails; errors are logged.
    async fn disconnect(&self);

    /// Send one request and return its response.
    ///
    /// # Errors
    ///
    /// Returns an error if the request could not be delivered or the
    /// response could not be read or had the wrong shape.
    async fn send(&self, request: Request) -> Result<Response, TransportError>;

    /// Like [`send`](Self::send), abandoning the request when `cancel` fires.
    async fn send_with_cancel(
        &self,
        request: Request,
        cancel: CancellationToken,
    ) -> Result<Response, TransportError> {
        let method = request.method.to_string();
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(TransportError::Cancelled { operation: method }),
            result = self.send(request) => result,
        }
    }

    /// Check if the transport is connected.
    fn is_connected(&self) -> bool;

    /// Register the response handler, replacing any previous one.
    fn on_message(&self, handler: MessageHandler);

    /// Register the error handler, replacing any previous one.
    fn on_error(&self, handler: ErrorHandler);

    /// Register the close handler, replacing any previous one.
    fn on_close(&self, handler: CloseHandler);

    /// Get metadata about the transport.
    fn metadata(&self) -> TransportMetadata;
}

/// Single-slot storage for the three transport handlers.
#[derive(Default)]
pub struct TransportHandlers {
    message: RwLock<Option<MessageHandler>>,
    error: RwLock<Option<ErrorHandler>>,
    close: RwLock<Option<CloseHandler>>,
}

impl TransportHandlers {
    /// Create empty handler slots.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the message handler.
    pub fn set_message(&self, handler: MessageHandler) {
        *self.message.write().unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    /// Replace the error handler.
    pub fn set_error(&self, handler: ErrorHandler) {
        *self.error.write().unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    /// Replace the close handler.
    pub fn set_close(&self, handler: CloseHandler) {
        *self.close.write().unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    /// Deliver a response to the message handler, if any.
    pub fn emit_message(&self, response: Response) {
        let handler = self
            .message
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(handler) = handler {
            handler(response);
        }
    }

    /// Report an error to the error handler, if any.
    pub fn emit_error(&self, error: &TransportError) {
        let handler = self
            .error
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(handler) = handler {
            handler(error);
        }
    }

    /// Notify the close handler, if any.
    pub fn emit_close(&self) {
        let handler = self
            .close
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(handler) = handler {
            handler();
        }
    }
}

impl std::fmt::Debug for TransportHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let has = |slot: bool| if slot { "set" } else { "unset" };
        f.debug_struct("TransportHandlers")
            .field(
                "message",
                &has(self.message.read().unwrap_or_else(PoisonError::into_inner).is_some()),
            )
            .field(
                "error",
                &has(self.error.read().unwrap_or_else(PoisonError::into_inner).is_some()),
            )
            .field(
                "close",
                &has(self.close.read().unwrap_or_else(PoisonError::into_inner).is_some()),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_handlers_are_single_slot() {
        let handlers = TransportHandlers::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&first);
        handlers.set_message(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        let counter = Arc::clone(&second);
        handlers.set_message(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        handlers.emit_message(Response::success(1u64, serde_json::json!({})));
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_emit_without_handlers_is_noop() {
        let handlers = TransportHandlers::new();
        handlers.emit_close();
        handlers.emit_error(&TransportError::ConnectionClosed);
        handlers.emit_message(Response::success(1u64, serde_json::json!(null)));
    }

    #[test]
    fn test_metadata_builder() {
        let metadata = TransportMetadata::new("sse")
            .remote_addr("http://localhost:3100/sse")
            .push(true);
        assert_eq!(metadata.transport_type, "sse");
        assert!(metadata.push);
        assert!(metadata.connected_at.is_none());
    }
}
