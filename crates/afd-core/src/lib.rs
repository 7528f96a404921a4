//! # afd-core
//!
//! Core types for agent-first command runtimes.
//!
//! This crate provides the foundational building blocks shared by the
//! transports and clients:
//!
//! - **Protocol types**: JSON-RPC 2.0 requests and responses, the three
//!   protocol methods (`initialize`, `tools/list`, `tools/call`) and their
//!   payloads
//! - **Command results**: the uniform [`CommandResult`] envelope with
//!   structured [`CommandError`]s and optional trust signals
//! - **Command registry**: the [`CommandRegistry`] trait consumed by the
//!   in-process execution path, plus an in-memory [`SimpleRegistry`]
//! - **Diagnostics**: fuzzy "did you mean" suggestions for unknown commands
//! - **Handoff descriptors**: results that describe a live endpoint
//! - **Pipelines**: step, condition and result types with variable
//!   resolution and metadata aggregation
//! - **Batches**: independent commands run together with a summary
//! - **Error handling**: the unified [`AfdError`] type with rich diagnostics
//!
//! This crate is runtime-agnostic and does not depend on any async runtime.
//!
//! # Example
//!
//! ```rust
//! use afd_core::{CommandResult, UnknownCommandDiagnostic};
//!
//! let diagnostic = UnknownCommandDiagnostic::new(
//!     "todo-lsit",
//!     vec!["todo-create".to_string(), "todo-list".to_string()],
//! );
//! assert_eq!(diagnostic.hint.as_deref(), Some("Did you mean 'todo-list'?"));
//!
//! let result: CommandResult = diagnostic.into_result();
//! assert!(!result.is_success());
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

pub mod batch;
pub mod error;
pub mod handoff;
pub mod handshake;
pub mod pipeline;
pub mod protocol;
pub mod registry;
pub mod result;
pub mod suggest;
pub mod types;

// Re-export commonly used types at the crate root
pub use error::{AfdError, AfdResultExt, JsonRpcError, TransportErrorKind};
pub use handoff::{HandoffDescriptor, HandoffProtocol};
pub use handshake::{
    ClientCapabilities, ClientInfo, Implementation, InitializeRequest, InitializeResult, PROTOCOL_VERSION,
    ServerCapabilities, ServerInfo,
};
pub use protocol::{Request, RequestId, Response};
pub use registry::{CommandContext, CommandRegistry, SimpleRegistry};
pub use result::{CommandError, CommandResult, TrustSignals, error_codes};
pub use suggest::UnknownCommandDiagnostic;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use afd_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::batch::{BatchCommand, BatchOptions, BatchRequest, BatchResult, BatchSummary};
    pub use crate::error::{AfdError, AfdResultExt, JsonRpcError, TransportErrorKind};
    pub use crate::handoff::{
        HandoffCredentials, HandoffDescriptor, HandoffMetadata, HandoffProtocol,
        ReconnectPolicy, is_handoff,
    };
    pub use crate::handshake::{ClientInfo, InitializeResult, ServerCapabilities, ServerInfo};
    pub use crate::pipeline::{
        PipelineCondition, PipelineOptions, PipelineRequest, PipelineResult, PipelineStep,
        StepResult, StepStatus,
    };
    pub use crate::protocol::{Request, RequestId, Response};
    pub use crate::registry::{
        CommandContext, CommandDefinition, CommandInfo, CommandParameter, CommandRegistry,
        ParamType, SimpleRegistry,
    };
    pub use crate::result::{CommandError, CommandResult, TrustSignals, Warning, error_codes};
    pub use crate::suggest::UnknownCommandDiagnostic;
    pub use crate::types::{CallToolParams, CallToolResult, ListToolsResult, Tool};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_imports() {
        use crate::prelude::*;

        let _tool = Tool::new("test");
        let _caps = ServerCapabilities::new().with_tools();
        let _step = PipelineStep::new("todo-list");
    }

    #[test]
    fn test_protocol_version() {
        assert_eq!(PROTOCOL_VERSION, "2024-11-05");
    }

    #[test]
    fn test_error_context() {
        fn might_fail() -> Result<(), AfdError> {
            Err(AfdError::internal("something went wrong"))
        }

        let result = might_fail().context("while doing something important");
        let err = result.unwrap_err();
        assert!(err.to_string().contains("while doing something important"));
    }
}
