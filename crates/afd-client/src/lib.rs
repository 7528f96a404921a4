//! Client side of agent-first command runtimes.
//!
//! This crate provides three ways of reaching a command registry:
//!
//! - [`ConnectionManager`]: a stateful connection to a remote server over
//!   SSE or HTTP, with request correlation, a cached tool list and
//!   automatic reconnection
//! - [`DirectClient`]: in-process execution with "did you mean"
//!   diagnostics, input validation, trace ids, middleware and pipelines
//! - [`handoff`]: protocol handlers for the live connections some commands
//!   hand off to, with a reconnecting wrapper
//!
//! # Example
//!
//! ```no_run
//! use afd_client::{ClientConfig, ClientEvent, ConnectionManager, TransportKind};
//!
//! # async fn example() -> Result<(), afd_core::AfdError> {
//! let config = ClientConfig::builder()
//!     .endpoint("http://localhost:3100/message")
//!     .transport(TransportKind::Http)
//!     .name("my-agent")
//!     .build();
//! let manager = ConnectionManager::new(config);
//!
//! let _events = manager.subscribe(|event| {
//!     if let ClientEvent::StateChange { from, to } = event {
//!         tracing::info!(%from, %to, "state change");
//!     }
//! });
//!
//! manager.connect().await?;
//! for tool in manager.tools() {
//!     println!("{}: {}", tool.name, tool.description.unwrap_or_default());
//! }
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

pub mod builder;
pub mod client;
pub mod config;
pub mod direct;
pub mod events;
pub mod handoff;
pub mod state;

// Re-export commonly used types
pub use builder::ClientConfigBuilder;
pub use client::ConnectionManager;
pub use config::{ClientConfig, TransportKind};
pub use direct::{DirectCallOptions, DirectClient, DirectClientOptions, Middleware};
pub use events::{ClientEvent, Observers, Subscription};
pub use handoff::{
    HandoffCallbacks, HandoffConnection, HandoffHandler, HandoffRegistry, HandoffState,
    ReconnectOptions, ReconnectingHandoff, connect_handoff,
};
pub use state::ConnectionState;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::builder::ClientConfigBuilder;
    pub use crate::client::ConnectionManager;
    pub use crate::config::{ClientConfig, TransportKind};
    pub use crate::direct::{
        DirectCallOptions, DirectClient, DirectClientOptions, LoggingMiddleware, Middleware, Next,
    };
    pub use crate::events::{ClientEvent, Subscription};
    pub use crate::handoff::{
        HandoffCallbacks, HandoffConnection, HandoffHandler, HandoffRegistry, HandoffState,
        ReconnectOptions, ReconnectingHandoff, connect_handoff,
    };
    pub use crate::state::ConnectionState;
}
