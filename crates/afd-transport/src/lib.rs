//! Transports for agent-first command runtimes.
//!
//! A transport carries one JSON-RPC request to a command executor and
//! returns its response. Transports may also push responses to a registered
//! handler, which is how a connection manager learns about out-of-band
//! deliveries.
//!
//! # Available Transports
//!
//! | Transport | Use Case | Push channel |
//! |-----------|----------|--------------|
//! | [`http::SseTransport`] | Remote servers with a Server-Sent Events channel | yes |
//! | [`http::HttpTransport`] | Remote servers over plain request/response HTTP | no |
//! | [`direct::DirectTransport`] | In-process registries, no I/O | emulated |
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use afd_core::protocol::{Request, methods};
//! use afd_core::registry::SimpleRegistry;
//! use afd_transport::{DirectTransport, Transport};
//!
//! # tokio_test::block_on(async {
//! let transport = DirectTransport::new(Arc::new(SimpleRegistry::new()));
//! transport.connect().await?;
//!
//! let response = transport.send(Request::new(methods::INITIALIZE, 1u64)).await?;
//! assert!(response.is_success());
//! # Ok::<(), afd_transport::TransportError>(())
//! # });
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

pub mod direct;
pub mod error;
pub mod http;
pub mod runtime;
pub mod traits;

// Re-export commonly used types
pub use direct::DirectTransport;
pub use error::TransportError;
pub use http::{HttpTransport, HttpTransportConfig, SseTransport};
pub use traits::{
    CloseHandler, ErrorHandler, MessageHandler, Transport, TransportHandlers, TransportMetadata,
};

// Re-exported for callers of `Transport::send_with_cancel`.
pub use tokio_util::sync::CancellationToken;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::direct::DirectTransport;
    pub use crate::error::TransportError;
    pub use crate::http::{HttpTransport, HttpTransportConfig, SseTransport};
    pub use crate::traits::{Transport, TransportMetadata};
}
