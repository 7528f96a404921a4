//! Unified error handling for the runtime.
//!
//! Two families of failure exist and are never conflated:
//!
//! - **Connection and protocol failures** flow through [`AfdError`]:
//!   refused connections, malformed responses, handshake errors, timeouts,
//!   unknown handoff protocols.
//! - **Command failures** are ordinary values: every named-command call
//!   resolves to a [`CommandResult`](crate::result::CommandResult), and a
//!   business-logic failure is `CommandResult::Failure`, never an `Err`.
//!
//! ```rust
//! use afd_core::error::{AfdError, AfdResultExt};
//!
//! fn connect() -> Result<(), AfdError> {
//!     let result: Result<(), AfdError> = Err(AfdError::connection_failed("refused"));
//!     result.context("Failed to reach the command server")?;
//!     Ok(())
//! }
//! ```

pub mod codes;
mod context;
mod details;
mod jsonrpc;
mod transport;
mod types;

pub use codes::*;
pub use context::AfdResultExt;
pub use details::{BoxError, HandshakeDetails, TransportDetails};
pub use jsonrpc::JsonRpcError;
pub use transport::{TransportContext, TransportErrorKind};
pub use types::AfdError;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_size_is_small() {
        let size = std::mem::size_of::<AfdError>();
        assert!(
            size <= 64,
            "AfdError is {size} bytes, should be <= 64 bytes. Consider boxing more variants."
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(AfdError::parse("test").code(), PARSE_ERROR);
        assert_eq!(AfdError::internal("test").code(), INTERNAL_ERROR);
        assert_eq!(
            AfdError::transport(TransportErrorKind::ConnectionFailed, "test").code(),
            TRANSPORT_ERROR
        );
        assert_eq!(
            AfdError::from(JsonRpcError::method_not_found("bogus")).code(),
            METHOD_NOT_FOUND
        );
        assert_eq!(
            AfdError::handshake_failed("test").code(),
            HANDSHAKE_FAILED
        );
    }

    #[test]
    fn test_context_chaining() {
        fn inner() -> Result<(), AfdError> {
            Err(AfdError::Disconnected)
        }

        fn outer() -> Result<(), AfdError> {
            inner().context("Failed in outer")?;
            Ok(())
        }

        let err = outer().unwrap_err();
        assert!(err.to_string().contains("Failed in outer"));
        assert_eq!(err.code(), AfdError::Disconnected.code());
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_protocol_error_round_trips_to_json_rpc() {
        let original = JsonRpcError::method_not_found("tools/bogus")
            .with_data(serde_json::json!({"hint": "x"}));
        let err = AfdError::from(original.clone());
        let back: JsonRpcError = (&err).into();
        assert_eq!(back, original);
    }

    #[test]
    fn test_json_rpc_conversion_for_boxed_variants() {
        let err = AfdError::transport_with_context(
            TransportErrorKind::HttpStatus,
            "502 Bad Gateway",
            TransportContext::new("sse").with_http_status(502),
        );
        let json_err: JsonRpcError = (&err).into();
        assert_eq!(json_err.code, TRANSPORT_ERROR);
        assert!(is_client_code(json_err.code));
        let data = json_err.data.unwrap();
        assert_eq!(data["kind"], "http_status");
        assert_eq!(data["context"]["http_status"], 502);

        let err = AfdError::unknown_protocol("webrtc", vec!["websocket".to_string()]);
        assert!(err.to_string().contains("webrtc"));
        assert!(err.to_string().contains("websocket"));
        let json_err: JsonRpcError = (&err).into();
        assert_eq!(json_err.data.unwrap()["available"][0], "websocket");
    }

    #[test]
    fn test_transport_kind_through_context() {
        let err: Result<(), AfdError> =
            Err(AfdError::transport(TransportErrorKind::Timeout, "slow"));
        let err = err.context("calling todo-list").unwrap_err();
        assert_eq!(err.transport_kind(), Some(TransportErrorKind::Timeout));
    }
}
