//! JSON-RPC error object and conversions from [`AfdError`].

use serde::{Deserialize, Serialize};

use super::codes;
use super::types::AfdError;

/// A JSON-RPC error response object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i32,
    /// Error message.
    pub message: String,
    /// Additional error data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcError {
    /// Create an error with an arbitrary code.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Attach structured data.
    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// The arguments did not match what the method expects.
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(codes::INVALID_PARAMS, message)
    }

    /// The executor failed for reasons of its own.
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(codes::INTERNAL_ERROR, message)
    }

    /// No such method on this executor.
    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::new(codes::METHOD_NOT_FOUND, format!("Method not found: {}", method.into()))
    }
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

impl From<&AfdError> for JsonRpcError {
    fn from(err: &AfdError) -> Self {
        if let AfdError::Protocol(inner) = err {
            return inner.as_ref().clone();
        }

        let data = match err {
            AfdError::Transport(details) => Some(serde_json::json!({
                "kind": details.kind,
                "context": details.context,
            })),
            AfdError::UnknownProtocol {
                protocol,
                available,
            } => Some(serde_json::json!({
                "protocol": protocol,
                "available": available,
            })),
            AfdError::HandshakeFailed(details) => Some(serde_json::json!({
                "offered_version": details.offered_version,
            })),
            AfdError::WithContext { source, .. } => {
                let inner: Self = source.as_ref().into();
                inner.data
            }
            _ => None,
        };

        Self {
            code: err.code(),
            message: err.to_string(),
            data,
        }
    }
}

impl From<AfdError> for JsonRpcError {
    fn from(err: AfdError) -> Self {
        Self::from(&err)
    }
}
