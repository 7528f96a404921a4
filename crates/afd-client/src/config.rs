//! Connection manager configuration.

use std::time::Duration;

use afd_transport::HttpTransportConfig;

use crate::builder::ClientConfigBuilder;

/// Default endpoint of a local command server.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:3100/sse";

/// Default client name sent in the handshake.
pub const DEFAULT_CLIENT_NAME: &str = "afd-client";

/// Which network transport a [`ConnectionManager`](crate::ConnectionManager)
/// creates on `connect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    /// Server-Sent Events push channel plus POSTed requests.
    #[default]
    Sse,
    /// Plain request/response HTTP.
    Http,
}

/// Configuration of a [`ConnectionManager`](crate::ConnectionManager).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server endpoint.
    pub endpoint: String,
    /// Transport to create.
    pub transport: TransportKind,
    /// Client name reported in the handshake.
    pub client_name: String,
    /// Client version reported in the handshake.
    pub client_version: String,
    /// How long a request may stay outstanding.
    pub request_timeout: Duration,
    /// Reconnect after an unexpected close.
    pub auto_reconnect: bool,
    /// Reconnect attempts before giving up.
    pub max_reconnect_attempts: u32,
    /// Base delay, doubled on every attempt.
    pub reconnect_delay: Duration,
    /// Headers added to every HTTP request.
    pub headers: Vec<(String, String)>,
    /// Log every request with its timing at debug level.
    pub debug: bool,
}

impl ClientConfig {
    /// Configuration for `endpoint` with default settings.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Start building a configuration.
    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Delay before reconnect attempt `attempt` (1-based).
    #[must_use]
    pub fn reconnect_delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.reconnect_delay.saturating_mul(factor)
    }

    /// HTTP transport configuration derived from this configuration.
    #[must_use]
    pub fn http_config(&self) -> HttpTransportConfig {
        HttpTransportConfig::new(self.endpoint.clone())
            .with_request_timeout(self.request_timeout)
            .with_headers(self.headers.iter().cloned())
            .with_user_agent(format!("{}/{}", self.client_name, self.client_version))
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            transport: TransportKind::default(),
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
            request_timeout: Duration::from_secs(30),
            auto_reconnect: true,
            max_reconnect_attempts: 5,
            reconnect_delay: Duration::from_millis(1000),
            headers: Vec::new(),
            debug: false,
        }
    }
}
