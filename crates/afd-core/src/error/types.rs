//! The primary error type for connection and protocol failures.
//!
//! Named-command business failures never appear here; they travel as
//! [`CommandResult::Failure`](crate::result::CommandResult) values.

use miette::Diagnostic;
use thiserror::Error;

use super::codes;
use super::details::{BoxError, HandshakeDetails, TransportDetails};
use super::jsonrpc::JsonRpcError;
use super::transport::{TransportContext, TransportErrorKind};

/// The primary error type for the runtime.
///
/// Large error variants are boxed to keep `Result<T, AfdError>` small.
#[derive(Error, Diagnostic, Debug)]
pub enum AfdError {
    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// A payload could not be parsed or serialized.
    #[error("Parse error: {message}")]
    #[diagnostic(
        code(afd::protocol::parse_error),
        help("Ensure the message is valid JSON-RPC 2.0 format")
    )]
    Parse {
        /// Human-readable error message.
        message: String,
        /// The underlying parse error, if available.
        #[source]
        source: Option<BoxError>,
    },

    /// The peer answered with a JSON-RPC error object.
    #[error("Protocol error {}: {}", .0.code, .0.message)]
    #[diagnostic(code(afd::protocol::error))]
    Protocol(Box<JsonRpcError>),

    /// Internal error.
    #[error("Internal error: {message}")]
    #[diagnostic(code(afd::internal), severity(error))]
    Internal {
        /// Human-readable error message.
        message: String,
        /// The underlying error, if available.
        #[source]
        source: Option<BoxError>,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// A read, write, or HTTP exchange failed.
    #[error("{0}")]
    #[diagnostic(code(afd::transport::error))]
    Transport(#[source] Box<TransportDetails>),

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Connection establishment failed.
    #[error("Connection failed: {message}")]
    #[diagnostic(code(afd::connection::failed))]
    ConnectionFailed {
        /// Human-readable error message.
        message: String,
        /// The underlying error, if available.
        #[source]
        source: Option<BoxError>,
    },

    /// `connect()` was called on a connection that is already established.
    #[error("Already connected")]
    #[diagnostic(
        code(afd::connection::already_connected),
        help("Call disconnect() first, or use reconnect()")
    )]
    AlreadyConnected,

    /// A request was issued while the connection cannot carry it.
    #[error("Not connected (state: {state})")]
    #[diagnostic(code(afd::connection::not_connected), help("Call connect() first"))]
    NotConnected {
        /// The connection state at the time of the call.
        state: String,
    },

    /// The client disconnected while the request was outstanding.
    #[error("Client disconnected")]
    #[diagnostic(code(afd::connection::disconnected))]
    Disconnected,

    /// A caller-supplied request id collides with an outstanding request.
    #[error("Request id {id} is already outstanding")]
    #[diagnostic(code(afd::connection::duplicate_id))]
    DuplicateRequestId {
        /// The colliding id.
        id: String,
    },

    /// The `initialize` exchange failed.
    #[error("Handshake failed: {}", .0.message)]
    #[diagnostic(code(afd::handshake::failed))]
    HandshakeFailed(#[source] Box<HandshakeDetails>),

    // ========================================================================
    // Handoff Errors
    // ========================================================================
    /// No handler is registered for a handoff protocol.
    #[error("No handler registered for protocol '{protocol}' (available: {})", .available.join(", "))]
    #[diagnostic(
        code(afd::handoff::unknown_protocol),
        help("Register a protocol handler before connecting")
    )]
    UnknownProtocol {
        /// The requested protocol.
        protocol: String,
        /// Protocols that are currently registered.
        available: Box<[String]>,
    },

    /// A handoff connection was used while not connected.
    #[error("Handoff connection is not connected (state: {state})")]
    #[diagnostic(code(afd::handoff::not_connected))]
    HandoffNotConnected {
        /// The handoff state at the time of the call.
        state: String,
    },

    // ========================================================================
    // Timeout / Cancellation
    // ========================================================================
    /// An operation timed out.
    #[error("Timeout after {duration:?}: {operation}")]
    #[diagnostic(
        code(afd::timeout),
        help("Consider increasing the timeout or checking connectivity")
    )]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// How long we waited before timing out.
        duration: std::time::Duration,
    },

    /// An operation was cancelled.
    #[error("Operation cancelled: {operation}")]
    #[diagnostic(code(afd::cancelled))]
    Cancelled {
        /// The operation that was cancelled.
        operation: String,
    },

    // ========================================================================
    // Context-Wrapped Errors
    // ========================================================================
    /// An error with additional context.
    #[error("{context}: {source}")]
    #[diagnostic(code(afd::context))]
    WithContext {
        /// The context message.
        context: String,
        /// The underlying error.
        #[source]
        source: Box<AfdError>,
    },
}

// ============================================================================
// Error Construction Helpers
// ============================================================================

impl AfdError {
    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            source: None,
        }
    }

    /// Create a parse error with a source.
    pub fn parse_with_source<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::Parse {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Create a transport error.
    pub fn transport(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self::Transport(Box::new(TransportDetails {
            kind,
            message: message.into(),
            context: TransportContext::default(),
            source: None,
        }))
    }

    /// Create a transport error with context.
    pub fn transport_with_context(
        kind: TransportErrorKind,
        message: impl Into<String>,
        context: TransportContext,
    ) -> Self {
        Self::Transport(Box::new(TransportDetails {
            kind,
            message: message.into(),
            context,
            source: None,
        }))
    }

    /// Create a connection failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a not-connected error for the given state.
    pub fn not_connected(state: impl std::fmt::Display) -> Self {
        Self::NotConnected {
            state: state.to_string(),
        }
    }

    /// Create a handshake failed error.
    pub fn handshake_failed(message: impl Into<String>) -> Self {
        Self::HandshakeFailed(Box::new(HandshakeDetails {
            message: message.into(),
            offered_version: None,
            source: None,
        }))
    }

    /// Wrap an error raised during the handshake.
    pub fn handshake_failed_with_source(offered_version: impl Into<String>, source: Self) -> Self {
        Self::HandshakeFailed(Box::new(HandshakeDetails {
            message: source.to_string(),
            offered_version: Some(offered_version.into()),
            source: Some(Box::new(source)),
        }))
    }

    /// Create an unknown handoff protocol error.
    pub fn unknown_protocol(protocol: impl Into<String>, available: Vec<String>) -> Self {
        Self::UnknownProtocol {
            protocol: protocol.into(),
            available: available.into_boxed_slice(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, duration: std::time::Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a cancelled error.
    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    /// Get the JSON-RPC error code for this error.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::Parse { .. } => codes::PARSE_ERROR,
            Self::Protocol(err) => err.code,
            Self::Internal { .. } => codes::INTERNAL_ERROR,
            Self::Transport(_) => codes::TRANSPORT_ERROR,
            Self::ConnectionFailed { .. } => codes::CONNECTION_FAILED,
            Self::AlreadyConnected => codes::ALREADY_CONNECTED,
            Self::NotConnected { .. } => codes::NOT_CONNECTED,
            Self::Disconnected => codes::DISCONNECTED,
            Self::DuplicateRequestId { .. } => codes::INVALID_REQUEST,
            Self::HandshakeFailed(_) => codes::HANDSHAKE_FAILED,
            Self::UnknownProtocol { .. } => codes::UNKNOWN_PROTOCOL,
            Self::HandoffNotConnected { .. } => codes::HANDOFF_NOT_CONNECTED,
            Self::Timeout { .. } => codes::TIMEOUT,
            Self::Cancelled { .. } => codes::CANCELLED,
            Self::WithContext { source, .. } => source.code(),
        }
    }

    /// Whether retrying the same operation later may succeed.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Transport(details) => !matches!(details.kind, TransportErrorKind::InvalidMessage),
            Self::ConnectionFailed { .. } => true,
            Self::Disconnected => true,
            Self::Timeout { .. } => true,
            Self::WithContext { source, .. } => source.is_recoverable(),
            _ => false,
        }
    }

    /// The transport error kind, if this is (or wraps) a transport error.
    #[must_use]
    pub fn transport_kind(&self) -> Option<TransportErrorKind> {
        match self {
            Self::Transport(details) => Some(details.kind),
            Self::WithContext { source, .. } => source.transport_kind(),
            _ => None,
        }
    }
}

// ============================================================================
// Standard Error Conversions
// ============================================================================

impl From<serde_json::Error> for AfdError {
    fn from(err: serde_json::Error) -> Self {
        Self::parse_with_source("JSON serialization/deserialization error", err)
    }
}

impl From<JsonRpcError> for AfdError {
    fn from(err: JsonRpcError) -> Self {
        Self::Protocol(Box::new(err))
    }
}
