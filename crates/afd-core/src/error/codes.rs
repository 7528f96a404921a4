//! Numeric codes carried by [`JsonRpcError`](super::JsonRpcError).
//!
//! The first block is the JSON-RPC 2.0 reserved set. Everything the client
//! runtime raises on its own lives in the implementation-defined range
//! directly below `-32000`, one code per [`AfdError`](super::AfdError) variant.

/// Invalid JSON was received.
pub const PARSE_ERROR: i32 = -32700;
/// The message is not a valid request object.
pub const INVALID_REQUEST: i32 = -32600;
/// The method does not exist.
pub const METHOD_NOT_FOUND: i32 = -32601;
/// Invalid method parameters.
pub const INVALID_PARAMS: i32 = -32602;
/// Internal error.
pub const INTERNAL_ERROR: i32 = -32603;

/// A transport-level read, write, or status failure.
pub const TRANSPORT_ERROR: i32 = -32000;
/// The connection could not be established.
pub const CONNECTION_FAILED: i32 = -32001;
/// `connect` was called on a live connection.
pub const ALREADY_CONNECTED: i32 = -32002;
/// A request was issued outside the `connected` state.
pub const NOT_CONNECTED: i32 = -32003;
/// The connection went away while a request was in flight.
pub const DISCONNECTED: i32 = -32004;
/// The initialize exchange did not complete.
pub const HANDSHAKE_FAILED: i32 = -32005;
/// No handoff handler is registered for the protocol.
pub const UNKNOWN_PROTOCOL: i32 = -32006;
/// A handoff connection refused a send because it was not connected.
pub const HANDOFF_NOT_CONNECTED: i32 = -32007;
/// The operation exceeded its deadline.
pub const TIMEOUT: i32 = -32008;
/// The operation was cancelled by the caller.
pub const CANCELLED: i32 = -32009;

/// Whether `code` falls inside the runtime's own range.
#[must_use]
pub const fn is_client_code(code: i32) -> bool {
    code <= TRANSPORT_ERROR && code >= CANCELLED
}
