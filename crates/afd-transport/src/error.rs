//! Transport error types.

use afd_core::error::{AfdError, TransportContext, TransportDetails, TransportErrorKind};
use thiserror::Error;

/// Errors that can occur during transport operations.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The connection could not be established or the request could not be
    /// delivered.
    #[error("Connection error: {message}")]
    Connection {
        /// Error message.
        message: String,
    },

    /// The connection was closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The transport is not connected.
    #[error("Not connected")]
    NotConnected,

    /// The peer answered with a non-success HTTP status.
    #[error("HTTP {status}: {message}")]
    HttpStatus {
        /// Status code.
        status: u16,
        /// Status text or response body.
        message: String,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The response did not have the expected shape.
    #[error("Invalid message: {message}")]
    InvalidMessage {
        /// Description of the problem.
        message: String,
    },

    /// Reading the response body or stream failed.
    #[error("Read error: {message}")]
    Read {
        /// Error message.
        message: String,
    },

    /// Timeout occurred.
    #[error("{operation} timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// How long the operation waited.
        duration: std::time::Duration,
    },

    /// The caller cancelled the operation.
    #[error("{operation} was cancelled")]
    Cancelled {
        /// The operation that was cancelled.
        operation: String,
    },
}

impl TransportError {
    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create an invalid message error.
    pub fn invalid_message(message: impl Into<String>) -> Self {
        Self::InvalidMessage {
            message: message.into(),
        }
    }

    /// Get the transport error kind.
    #[must_use]
    pub const fn kind(&self) -> TransportErrorKind {
        match self {
            Self::Connection { .. } | Self::NotConnected => TransportErrorKind::ConnectionFailed,
            Self::ConnectionClosed => TransportErrorKind::ConnectionClosed,
            Self::HttpStatus { .. } => TransportErrorKind::HttpStatus,
            Self::Json(_) | Self::InvalidMessage { .. } => TransportErrorKind::InvalidMessage,
            Self::Read { .. } => TransportErrorKind::ReadFailed,
            Self::Timeout { .. } => TransportErrorKind::Timeout,
            Self::Cancelled { .. } => TransportErrorKind::Cancelled,
        }
    }

    /// The HTTP status, for status errors.
    #[must_use]
    pub const fn http_status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                operation: "HTTP request".to_string(),
                duration: std::time::Duration::ZERO,
            }
        } else if let Some(status) = err.status() {
            Self::HttpStatus {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else if err.is_body() || err.is_decode() {
            Self::Read {
                message: err.to_string(),
            }
        } else {
            Self::Connection {
                message: err.to_string(),
            }
        }
    }
}

impl From<TransportError> for AfdError {
    fn from(err: TransportError) -> Self {
        let mut context = TransportContext::default();
        if let Some(status) = err.http_status() {
            context = context.with_http_status(status);
        }
        Self::Transport(Box::new(TransportDetails {
            kind: err.kind(),
            message: err.to_string(),
            context,
            source: Some(Box::new(err)),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            TransportError::ConnectionClosed.kind(),
            TransportErrorKind::ConnectionClosed
        );
        assert_eq!(
            TransportError::Timeout {
                operation: "test".to_string(),
                duration: std::time::Duration::from_secs(1),
            }
            .kind(),
            TransportErrorKind::Timeout
        );
        assert_eq!(
            TransportError::invalid_message("bad").kind(),
            TransportErrorKind::InvalidMessage
        );
        assert_eq!(
            TransportError::HttpStatus {
                status: 503,
                message: "unavailable".into()
            }
            .kind(),
            TransportErrorKind::HttpStatus
        );
    }

    #[test]
    fn test_afd_error_conversion() {
        let err = TransportError::HttpStatus {
            status: 502,
            message: "bad gateway".into(),
        };
        let afd_err: AfdError = err.into();

        match afd_err {
            AfdError::Transport(details) => {
                assert_eq!(details.kind, TransportErrorKind::HttpStatus);
                assert_eq!(details.context.http_status, Some(502));
            }
            _ => panic!("Expected Transport error"),
        }
    }
}
