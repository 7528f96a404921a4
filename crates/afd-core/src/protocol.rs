//! JSON-RPC 2.0 envelope types for command invocation.
//!
//! Every exchange between a client and a command executor is a single
//! [`Request`] answered by a single [`Response`]. Push channels deliver
//! additional `Response` values out of band; those are correlated by
//! [`RequestId`] exactly like direct replies.
//!
//! # Example
//!
//! ```rust
//! use afd_core::protocol::{methods, Request, Response, RequestId};
//!
//! let request = Request::new(methods::TOOLS_LIST, RequestId::Number(1));
//!
//! let json = r#"{"jsonrpc": "2.0", "id": 1, "result": {"tools": []}}"#;
//! let response: Response = serde_json::from_str(json).unwrap();
//! assert!(response.is_well_formed());
//! ```

use crate::error::JsonRpcError;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// The JSON-RPC version string. Always "2.0".
pub const JSONRPC_VERSION: &str = "2.0";

/// Method names understood by every command executor.
pub mod methods {
    /// Protocol handshake.
    pub const INITIALIZE: &str = "initialize";
    /// List the available commands.
    pub const TOOLS_LIST: &str = "tools/list";
    /// Invoke a named command.
    pub const TOOLS_CALL: &str = "tools/call";
}

fn default_jsonrpc() -> Cow<'static, str> {
    Cow::Borrowed(JSONRPC_VERSION)
}

/// A JSON-RPC request ID.
///
/// Ids only exist for correlation and are unique among the outstanding
/// requests of one connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Ids minted by the connection manager are numeric.
    Number(u64),
    /// Executors may echo string ids chosen by other clients.
    String(String),
}

impl From<u64> for RequestId {
    fn from(id: u64) -> Self {
        Self::Number(id)
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> Self {
        Self::String(id)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self::String(id.to_string())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => n.fmt(f),
            Self::String(s) => f.write_str(s),
        }
    }
}

/// A JSON-RPC 2.0 request message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// The JSON-RPC version. Always "2.0".
    #[serde(default = "default_jsonrpc")]
    pub jsonrpc: Cow<'static, str>,
    /// The request ID for correlation.
    pub id: RequestId,
    /// The method to invoke.
    pub method: Cow<'static, str>,
    /// The method parameters, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl Request {
    /// A request for `method` without parameters.
    #[must_use]
    pub fn new(method: impl Into<Cow<'static, str>>, id: impl Into<RequestId>) -> Self {
        Self {
            jsonrpc: default_jsonrpc(),
            id: id.into(),
            method: method.into(),
            params: None,
        }
    }

    /// A request for `method` carrying `params`.
    #[must_use]
    pub fn with_params(
        method: impl Into<Cow<'static, str>>,
        id: impl Into<RequestId>,
        params: serde_json::Value,
    ) -> Self {
        Self::new(method, id).params(params)
    }

    /// Replace the parameters.
    #[must_use]
    pub fn params(mut self, params: serde_json::Value) -> Self {
        self.params = Some(params);
        self
    }

    /// The method name.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }
}

/// A JSON-RPC 2.0 response message.
///
/// Exactly one of `result` and `error` is present on a well-formed response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// The JSON-RPC version. Always "2.0".
    #[serde(default = "default_jsonrpc")]
    pub jsonrpc: Cow<'static, str>,
    /// The request ID this response corresponds to.
    pub id: RequestId,
    /// The result on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// The error on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl Response {
    /// Create a successful response.
    #[must_use]
    pub fn success(id: impl Into<RequestId>, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: default_jsonrpc(),
            id: id.into(),
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    #[must_use]
    pub fn error(id: impl Into<RequestId>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: default_jsonrpc(),
            id: id.into(),
            result: None,
            error: Some(error),
        }
    }

    /// A `result` and no `error`.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!((&self.result, &self.error), (Some(_), None))
    }

    /// An `error` is present.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Whether exactly one of `result` and `error` is present.
    #[must_use]
    pub const fn is_well_formed(&self) -> bool {
        self.result.is_some() != self.error.is_some()
    }

    /// Split into the result value or the error object.
    ///
    /// A response carrying neither is reported as an internal error.
    pub fn into_result(self) -> Result<serde_json::Value, JsonRpcError> {
        match (self.error, self.result) {
            (Some(error), _) => Err(error),
            (None, Some(result)) => Ok(result),
            (None, None) => Err(JsonRpcError::internal_error(
                "Response contained neither result nor error",
            )),
        }
    }
}
