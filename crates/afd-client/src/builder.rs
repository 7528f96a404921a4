//! Fluent construction of [`ClientConfig`].

use std::time::Duration;

use crate::config::{ClientConfig, TransportKind};

/// Builder for [`ClientConfig`].
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use afd_client::{ClientConfig, TransportKind};
///
/// let config = ClientConfig::builder()
///     .endpoint("http://localhost:3100/sse")
///     .name("my-agent")
///     .version("1.0.0")
///     .transport(TransportKind::Sse)
///     .request_timeout(Duration::from_secs(10))
///     .max_reconnect_attempts(3)
///     .build();
///
/// assert_eq!(config.client_name, "my-agent");
/// assert_eq!(config.max_reconnect_attempts, 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Create a builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the endpoint.
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    /// Set the transport kind.
    #[must_use]
    pub const fn transport(mut self, transport: TransportKind) -> Self {
        self.config.transport = transport;
        self
    }

    /// Set the client name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.client_name = name.into();
        self
    }

    /// Set the client version.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.config.client_version = version.into();
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Enable or disable automatic reconnection.
    #[must_use]
    pub const fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.config.auto_reconnect = enabled;
        self
    }

    /// Set the number of reconnect attempts.
    #[must_use]
    pub const fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.config.max_reconnect_attempts = attempts;
        self
    }

    /// Set the base reconnect delay.
    #[must_use]
    pub const fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.config.reconnect_delay = delay;
        self
    }

    /// Add a header to every HTTP request.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.headers.push((name.into(), value.into()));
        self
    }

    /// Enable debug logging of every request.
    #[must_use]
    pub const fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = ClientConfigBuilder::new().build();
        assert_eq!(config.client_name, "afd-client");
        assert!(config.headers.is_empty());
    }

    #[test]
    fn test_builder_fluent() {
        let config = ClientConfigBuilder::new()
            .name("test-client")
            .version("1.0.0")
            .transport(TransportKind::Http)
            .auto_reconnect(false)
            .reconnect_delay(Duration::from_millis(250))
            .header("X-Api-Key", "k")
            .debug(true)
            .build();

        assert_eq!(config.client_name, "test-client");
        assert_eq!(config.client_version, "1.0.0");
        assert_eq!(config.transport, TransportKind::Http);
        assert!(!config.auto_reconnect);
        assert_eq!(config.reconnect_delay, Duration::from_millis(250));
        assert_eq!(config.headers, vec![("X-Api-Key".to_string(), "k".to_string())]);
        assert!(config.debug);
    }
}
