//! Handoff descriptors.
//!
//! A handoff is a command result that describes a second, independent live
//! connection: a protocol, an endpoint, optional credentials and optional
//! metadata such as an expiry time or a reconnect policy. The client side of
//! establishing that connection lives in `afd-client`.
//!
//! # Example
//!
//! ```rust
//! use afd_core::handoff::{HandoffCredentials, HandoffDescriptor, HandoffProtocol, ReconnectPolicy};
//!
//! let descriptor = HandoffDescriptor::new(HandoffProtocol::Websocket, "wss://chat.example.com/ws")
//!     .with_credentials(HandoffCredentials::new().with_token("jwt").with_session_id("s-1"))
//!     .with_reconnect(ReconnectPolicy::new(true).with_max_attempts(3));
//!
//! assert_eq!(descriptor.protocol.as_str(), "websocket");
//! assert!(!descriptor.is_expired());
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// The protocol of a handoff endpoint.
///
/// Unknown names are kept as [`HandoffProtocol::Custom`] so applications
/// can register handlers for their own protocols.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum HandoffProtocol {
    /// `websocket`
    Websocket,
    /// `webrtc`
    Webrtc,
    /// `sse`
    Sse,
    /// `http-stream`
    HttpStream,
    /// Any other protocol name.
    Custom(String),
}

impl HandoffProtocol {
    /// Wire name of the protocol.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Websocket => "websocket",
            Self::Webrtc => "webrtc",
            Self::Sse => "sse",
            Self::HttpStream => "http-stream",
            Self::Custom(name) => name,
        }
    }
}

impl From<String> for HandoffProtocol {
    fn from(name: String) -> Self {
        match name.as_str() {
            "websocket" => Self::Websocket,
            "webrtc" => Self::Webrtc,
            "sse" => Self::Sse,
            "http-stream" => Self::HttpStream,
            _ => Self::Custom(name),
        }
    }
}

impl From<&str> for HandoffProtocol {
    fn from(name: &str) -> Self {
        Self::from(name.to_string())
    }
}

impl From<HandoffProtocol> for String {
    fn from(protocol: HandoffProtocol) -> Self {
        match protocol {
            HandoffProtocol::Custom(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for HandoffProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credentials for the handoff endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandoffCredentials {
    /// Bearer token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Extra headers to send when connecting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
    /// Session id used to resume the session after a reconnect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl HandoffCredentials {
    /// Create empty credentials.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Add a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(HashMap::new)
            .insert(name.into(), value.into());
        self
    }

    /// Set the session id.
    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Reconnection policy advertised by the command that issued the handoff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectPolicy {
    /// Whether the client may reconnect at all.
    pub allowed: bool,
    /// Maximum reconnect attempts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    /// Base backoff in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff_ms: Option<u64>,
}

impl ReconnectPolicy {
    /// Create a policy.
    #[must_use]
    pub const fn new(allowed: bool) -> Self {
        Self {
            allowed,
            max_attempts: None,
            backoff_ms: None,
        }
    }

    /// Set the maximum attempts.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Set the base backoff.
    #[must_use]
    pub const fn with_backoff_ms(mut self, backoff_ms: u64) -> Self {
        self.backoff_ms = Some(backoff_ms);
        self
    }
}

/// Optional metadata about the handoff endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandoffMetadata {
    /// Expected round-trip latency in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_latency: Option<u64>,
    /// Capabilities of the live channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Vec<String>>,
    /// RFC 3339 expiry time of the endpoint or its credentials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    /// Reconnection policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconnect: Option<ReconnectPolicy>,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Describes a live endpoint returned by a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffDescriptor {
    /// Protocol to connect with.
    pub protocol: HandoffProtocol,
    /// Endpoint address.
    pub endpoint: String,
    /// Credentials, if required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<HandoffCredentials>,
    /// Endpoint metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HandoffMetadata>,
}

impl HandoffDescriptor {
    /// Create a descriptor.
    #[must_use]
    pub fn new(protocol: impl Into<HandoffProtocol>, endpoint: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            endpoint: endpoint.into(),
            credentials: None,
            metadata: None,
        }
    }

    /// Set the credentials.
    #[must_use]
    pub fn with_credentials(mut self, credentials: HandoffCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Set the metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: HandoffMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Set the reconnect policy, creating metadata if needed.
    #[must_use]
    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.metadata.get_or_insert_with(HandoffMetadata::default).reconnect = Some(policy);
        self
    }

    /// Set the expiry time, creating metadata if needed.
    #[must_use]
    pub fn with_expires_at(mut self, expires_at: impl Into<String>) -> Self {
        self.metadata.get_or_insert_with(HandoffMetadata::default).expires_at =
            Some(expires_at.into());
        self
    }

    /// Parse a descriptor out of a command's data payload.
    ///
    /// Returns `None` when the value does not look like a handoff.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        if !is_handoff(value) {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    /// The reconnect policy, if advertised.
    #[must_use]
    pub fn reconnect_policy(&self) -> Option<&ReconnectPolicy> {
        self.metadata.as_ref()?.reconnect.as_ref()
    }

    /// The session id, if the credentials carry one.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.credentials.as_ref()?.session_id.as_deref()
    }

    fn expires_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        let raw = self.metadata.as_ref()?.expires_at.as_deref()?;
        chrono::DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|t| t.with_timezone(&chrono::Utc))
    }

    /// Whether the expiry time has passed.
    ///
    /// Descriptors without an expiry, or with an unparsable one, never expire.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at()
            .is_some_and(|expires| expires < chrono::Utc::now())
    }

    /// Time left until expiry, or `None` when there is no (valid) expiry or
    /// it has already passed.
    #[must_use]
    pub fn ttl(&self) -> Option<Duration> {
        let remaining = self.expires_at()? - chrono::Utc::now();
        remaining.to_std().ok().filter(|d| !d.is_zero())
    }
}

/// Whether a JSON value has the `protocol` and `endpoint` fields of a handoff.
#[must_use]
pub fn is_handoff(value: &Value) -> bool {
    value.get("protocol").is_some_and(Value::is_string)
        && value.get("endpoint").is_some_and(Value::is_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_protocol_names_round_trip() {
        for name in ["websocket", "webrtc", "sse", "http-stream", "mqtt"] {
            let protocol = HandoffProtocol::from(name);
            assert_eq!(protocol.as_str(), name);
            assert_eq!(serde_json::to_value(&protocol).unwrap(), name);
        }
        assert_eq!(HandoffProtocol::from("mqtt"), HandoffProtocol::Custom("mqtt".into()));
    }

    #[test]
    fn test_from_value() {
        let value = serde_json::json!({
            "protocol": "websocket",
            "endpoint": "wss://example.com/ws",
            "credentials": {"token": "t", "sessionId": "s-1"},
            "metadata": {"reconnect": {"allowed": true, "maxAttempts": 3, "backoffMs": 500}}
        });
        let descriptor = HandoffDescriptor::from_value(&value).unwrap();
        assert_eq!(descriptor.protocol, HandoffProtocol::Websocket);
        assert_eq!(descriptor.session_id(), Some("s-1"));
        assert_eq!(descriptor.reconnect_policy().unwrap().max_attempts, Some(3));

        assert!(HandoffDescriptor::from_value(&serde_json::json!({"endpoint": "x"})).is_none());
    }

    #[test]
    fn test_expiry() {
        let past = HandoffDescriptor::new("sse", "https://example.com/events")
            .with_expires_at("2000-01-01T00:00:00Z");
        assert!(past.is_expired());
        assert_eq!(past.ttl(), None);

        let future_time = (chrono::Utc::now() + chrono::Duration::hours(1)).to_rfc3339();
        let future = HandoffDescriptor::new("sse", "https://example.com/events")
            .with_expires_at(future_time);
        assert!(!future.is_expired());
        let ttl = future.ttl().unwrap();
        assert!(ttl > Duration::from_secs(3500) && ttl <= Duration::from_secs(3600));
    }

    #[test]
    fn test_unparsable_expiry_never_expires() {
        let descriptor =
            HandoffDescriptor::new("sse", "https://example.com").with_expires_at("tomorrow");
        assert!(!descriptor.is_expired());
        assert_eq!(descriptor.ttl(), None);
    }

    #[test]
    fn test_is_handoff() {
        assert!(is_handoff(&serde_json::json!({"protocol": "sse", "endpoint": "/e"})));
        assert!(!is_handoff(&serde_json::json!({"protocol": "sse"})));
        assert!(!is_handoff(&serde_json::json!([1, 2])));
    }
}
