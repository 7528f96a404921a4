//! Prelude module for convenient imports.
//!
//! ```rust
//! use afd::prelude::*;
//!
//! let config = ClientConfig::builder().name("my-agent").build();
//! let registry = HandoffRegistry::new();
//! assert!(registry.protocols().is_empty());
//! # let _ = config;
//! ```
//!
//! ## Included Types
//!
//! ### Core Types
//! - Protocol and error types (`Request`, `Response`, `AfdError`, `JsonRpcError`)
//! - Results (`CommandResult`, `CommandError`, `TrustSignals`)
//! - Registry types (`CommandRegistry`, `SimpleRegistry`, `CommandDefinition`)
//! - Pipeline, batch and handoff descriptor types
//!
//! ### Client Types
//! - `ConnectionManager`, `ClientConfig` and events
//! - `DirectClient`, its options and middleware
//! - Handoff handlers and `ReconnectingHandoff`
//!
//! ### Transport Types
//! - `Transport` trait and the built-in transports

// Core types
pub use afd_core::prelude::*;

// Client types
pub use afd_client::prelude::*;

// Transport types
pub use afd_transport::prelude::*;
