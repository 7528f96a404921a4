//! Classification of transport failures.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What kind of transport failure occurred.
///
/// Serialized in `snake_case` into the `data.kind` field of the JSON-RPC
/// error produced from an [`AfdError`](super::AfdError).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    /// The endpoint refused or never answered the connection.
    ConnectionFailed,
    /// An established stream ended.
    ConnectionClosed,
    /// A response body or event stream could not be read.
    ReadFailed,
    /// The operation ran past its deadline.
    Timeout,
    /// A payload was not the JSON-RPC shape we expected.
    InvalidMessage,
    /// The server answered with a non-2xx status.
    HttpStatus,
    /// The caller gave up on the operation.
    Cancelled,
}

impl TransportErrorKind {
    /// The `snake_case` name used on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConnectionFailed => "connection_failed",
            Self::ConnectionClosed => "connection_closed",
            Self::ReadFailed => "read_failed",
            Self::Timeout => "timeout",
            Self::InvalidMessage => "invalid_message",
            Self::HttpStatus => "http_status",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().replace('_', " "))
    }
}

/// Where a transport failure happened.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportContext {
    /// `sse`, `http`, or `direct`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport_type: Option<String>,
    /// The URL being talked to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Status code of a failed HTTP exchange.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
}

impl TransportContext {
    /// Context for the named transport.
    #[must_use]
    pub fn new(transport_type: impl Into<String>) -> Self {
        Self {
            transport_type: Some(transport_type.into()),
            ..Self::default()
        }
    }

    /// Record the endpoint URL.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Record the HTTP status.
    #[must_use]
    pub const fn with_http_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_display_matches_wire_name() {
        assert_eq!(TransportErrorKind::HttpStatus.to_string(), "http status");
        assert_eq!(
            serde_json::to_value(TransportErrorKind::ConnectionClosed).unwrap(),
            serde_json::json!(TransportErrorKind::ConnectionClosed.as_str())
        );
    }

    #[test]
    fn test_context_skips_unset_fields() {
        let context = TransportContext::new("sse").with_endpoint("http://localhost:3100/sse");
        let value = serde_json::to_value(&context).unwrap();
        assert_eq!(value["endpoint"], "http://localhost:3100/sse");
        assert!(value.get("http_status").is_none());
    }
}
