//! Testing utilities for the AFD client runtime.
//!
//! This crate provides mocks, fixtures, and assertions for testing code
//! built on `afd-client`. It includes:
//!
//! - [`MockTransport`]: a scriptable transport for connection tests
//! - [`MockRegistry`]: a command registry that records every call
//! - A todo application fixture with two commands
//! - Assertions on [`CommandResult`](afd_core::CommandResult)
//!
//! # Overview
//!
//! ## Mock Transport
//!
//! ```rust
//! use afd_testing::MockTransport;
//! use afd_core::{CommandResult, types::Tool};
//!
//! let transport = MockTransport::new()
//!     .with_tool(Tool::new("ping"), CommandResult::success(serde_json::json!("pong")));
//! transport.fail_connects(2);
//! ```
//!
//! ## Fixtures
//!
//! ```rust
//! use afd_testing::fixtures;
//! use afd_core::CommandRegistry;
//!
//! let registry = fixtures::todo_registry();
//! assert!(registry.has_command("todo-create"));
//! ```
//!
//! ## Assertions
//!
//! ```rust
//! use afd_testing::assert_command_ok;
//! use afd_core::CommandResult;
//!
//! let result = CommandResult::success(serde_json::json!(42));
//! assert_command_ok!(result);
//! ```

#![deny(missing_docs)]

pub mod assertions;
pub mod async_helpers;
pub mod fixtures;
pub mod registry;
pub mod transport;

// Re-export commonly used types
pub use assertions::{assert_failure_code, assert_success, assert_tool_error};
pub use async_helpers::{Recorder, wait_until, with_default_timeout, with_timeout};
pub use fixtures::{todo_registry, todo_tools};
pub use registry::{MockRegistry, RecordedCall};
pub use transport::{MOCK_SERVER_NAME, MockTransport, ReplyMode};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::assertions::{assert_failure_code, assert_success, assert_tool_error};
    pub use crate::async_helpers::{Recorder, wait_for, wait_until, with_timeout};
    pub use crate::fixtures::{TODO_COMMANDS, todo_registry, todo_tools};
    pub use crate::registry::{MockRegistry, RecordedCall};
    pub use crate::transport::{MOCK_SERVER_NAME, MockTransport, ReplyMode};
}
