//! # AFD - client runtime for agent-first command servers
//!
//! An agent-first server exposes named commands that return a structured
//! [`CommandResult`]. This crate is the client side: it connects to such a
//! server, calls its commands, and follows the live connections some
//! commands hand off to.
//!
//! ## Features
//!
//! - **Connection manager** over SSE or plain HTTP, with a state machine,
//!   request correlation, a cached tool list and automatic reconnection
//! - **In-process client** with "did you mean" diagnostics for unknown
//!   commands, input validation, trace ids, middleware and pipelines
//! - **Handoff** handler registry and a reconnecting connection wrapper
//! - **Rich error handling** with miette diagnostics
//!
//! ## Quick Start
//!
//! ```no_run
//! use afd::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), AfdError> {
//!     afd::init_tracing();
//!
//!     let manager = ConnectionManager::new(ClientConfig::new("http://localhost:3100/sse"));
//!     manager.connect().await?;
//!
//!     let result = manager
//!         .call_tool("todo-create", serde_json::json!({ "title": "Buy milk" }))
//!         .await?;
//!     match result.error() {
//!         Some(error) => eprintln!("{}: {}", error.code, error.message),
//!         None => println!("{}", result.data().cloned().unwrap_or_default()),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Crate Organization
//!
//! - [`afd_core`] - Protocol types, results, registry and pipeline types
//! - [`afd_transport`] - Transports (SSE, HTTP, in-process)
//! - [`afd_client`] - Connection manager, direct client and handoff

#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

// Re-export all public items from core
pub use afd_core::*;

// Re-export client types
pub use afd_client::{
    ClientConfig, ClientConfigBuilder, ClientEvent, ConnectionManager, ConnectionState,
    DirectCallOptions, DirectClient, DirectClientOptions, HandoffCallbacks, HandoffConnection,
    HandoffHandler, HandoffRegistry, HandoffState, Middleware, ReconnectOptions,
    ReconnectingHandoff, Subscription, TransportKind, connect_handoff,
};

// Re-export transport types
pub use afd_transport::{DirectTransport, Transport, TransportError, TransportMetadata};

pub mod prelude;

/// Client module re-exports
pub mod client {
    //! Connection manager, direct client and handoff types.
    pub use afd_client::*;
}

/// Transport module re-exports
pub mod transport {
    //! Transport layer types.
    pub use afd_transport::*;
}

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "afd=info,afd_client=info,afd_transport=warn";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Install a human-readable `tracing` subscriber filtered by `RUST_LOG`.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .try_init()
        .is_ok()
}

/// Like [`init_tracing`], emitting one JSON object per event.
pub fn init_json_tracing() -> bool {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter())
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_prelude_imports() {
        use crate::prelude::*;
        let _ = std::any::type_name::<AfdError>();
        let _ = std::any::type_name::<ConnectionManager>();
    }

    #[test]
    fn test_init_tracing_is_idempotent() {
        super::init_tracing();
        assert!(!super::init_tracing());
    }
}
