//! Payloads for the boxed [`AfdError`](super::AfdError) variants.
//!
//! The larger variants keep their fields behind a `Box` so the error itself
//! stays small enough to pass around by value in every `Result`.

use std::error::Error as StdError;
use std::fmt;

use super::transport::{TransportContext, TransportErrorKind};

/// A thread-safe boxed error used as a `source`.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

fn as_source(source: Option<&BoxError>) -> Option<&(dyn StdError + 'static)> {
    source.map(|e| e.as_ref() as &(dyn StdError + 'static))
}

/// A failed read, write, or HTTP exchange.
#[derive(Debug)]
pub struct TransportDetails {
    /// What went wrong.
    pub kind: TransportErrorKind,
    /// Human-readable message.
    pub message: String,
    /// Transport name, endpoint, and status when known.
    pub context: TransportContext,
    /// Underlying I/O or HTTP error.
    pub source: Option<BoxError>,
}

impl fmt::Display for TransportDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context.transport_type {
            Some(transport) => write!(f, "{transport} transport {}: {}", self.kind, self.message),
            None => write!(f, "transport {}: {}", self.kind, self.message),
        }
    }
}

impl StdError for TransportDetails {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        as_source(self.source.as_ref())
    }
}

/// A failed `initialize` exchange.
#[derive(Debug)]
pub struct HandshakeDetails {
    /// Human-readable message.
    pub message: String,
    /// Protocol version this client offered, when the request got that far.
    pub offered_version: Option<String>,
    /// What the server answered with instead.
    pub source: Option<BoxError>,
}

impl fmt::Display for HandshakeDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handshake failed: {}", self.message)
    }
}

impl StdError for HandshakeDetails {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        as_source(self.source.as_ref())
    }
}
