//! Payload types for the three protocol methods a command executor serves.
//!
//! - `initialize` uses the types in [`handshake`](crate::handshake).
//! - `tools/list` answers with a [`ListToolsResult`].
//! - `tools/call` takes [`CallToolParams`] and answers with a
//!   [`CallToolResult`] whose single text block carries a JSON-encoded
//!   [`CommandResult`](crate::result::CommandResult).

pub mod content;
pub mod tool;

pub use content::Content;
pub use tool::{CallToolParams, CallToolResult, ListToolsResult, Tool};
