//! Connection state.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// State of a [`ConnectionManager`](crate::ConnectionManager).
///
/// ```text
/// Disconnected --connect()--> Connecting --handshake--> Connected
/// Connected --close, no auto-reconnect--> Disconnected
/// Connected --close, auto-reconnect--> Reconnecting --success--> Connected
/// Reconnecting --attempts exhausted--> Error
/// any --connect() fails--> Error
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No connection.
    #[default]
    Disconnected,
    /// Transport connect and handshake in progress.
    Connecting,
    /// Handshake complete; requests may be sent.
    Connected,
    /// Waiting to retry after an unexpected close.
    Reconnecting,
    /// Connecting failed or reconnection attempts were exhausted.
    Error,
}

impl ConnectionState {
    /// Lowercase name of the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Error => "error",
        }
    }

    const fn to_u8(self) -> u8 {
        match self {
            Self::Disconnected => 0,
            Self::Connecting => 1,
            Self::Connected => 2,
            Self::Reconnecting => 3,
            Self::Error => 4,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::Reconnecting,
            4 => Self::Error,
            _ => Self::Disconnected,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lock-free cell holding a [`ConnectionState`].
#[derive(Debug, Default)]
pub(crate) struct AtomicState(AtomicU8);

impl AtomicState {
    pub(crate) fn load(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Store `state` and return the previous one.
    pub(crate) fn swap(&self, state: ConnectionState) -> ConnectionState {
        ConnectionState::from_u8(self.0.swap(state.to_u8(), Ordering::AcqRel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_state_round_trip() {
        let cell = AtomicState::default();
        assert_eq!(cell.load(), ConnectionState::Disconnected);
        for state in [
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Reconnecting,
            ConnectionState::Error,
            ConnectionState::Disconnected,
        ] {
            let previous = cell.load();
            assert_eq!(cell.swap(state), previous);
            assert_eq!(cell.load(), state);
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(ConnectionState::Reconnecting.to_string(), "reconnecting");
    }
}
