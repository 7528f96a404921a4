//! HTTP transport configuration.

use std::time::Duration;

use url::Url;

use crate::error::TransportError;

/// Path suffix of the server-push channel.
pub const SSE_PATH_SUFFIX: &str = "/sse";

/// Path suffix of the request endpoint paired with [`SSE_PATH_SUFFIX`].
pub const MESSAGE_PATH_SUFFIX: &str = "/message";

/// Path of the reachability probe.
pub const HEALTH_PATH: &str = "/health";

/// Configuration shared by the SSE and plain HTTP transports.
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Configured endpoint. For SSE this is the push channel URL.
    pub endpoint: String,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Custom headers to include in every request.
    pub headers: Vec<(String, String)>,
    /// User agent.
    pub user_agent: String,
    /// Interval of the plain transport's background reachability probe.
    pub health_interval: Option<Duration>,
}

impl HttpTransportConfig {
    /// Create a configuration for the given endpoint.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            headers: Vec::new(),
            user_agent: format!("afd-transport/{}", env!("CARGO_PKG_VERSION")),
            health_interval: None,
        }
    }

    /// Set the connection timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Add a custom header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Add several custom headers.
    #[must_use]
    pub fn with_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Set the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Probe reachability in the background at this interval.
    #[must_use]
    pub const fn with_health_interval(mut self, interval: Duration) -> Self {
        self.health_interval = Some(interval);
        self
    }

    /// URL of the push channel.
    pub fn channel_url(&self) -> Result<Url, TransportError> {
        parse(&self.endpoint)
    }

    /// URL requests are posted to when paired with a push channel.
    ///
    /// A trailing `/sse` path segment is replaced by `/message`; any other
    /// endpoint is used as is.
    pub fn message_url(&self) -> Result<Url, TransportError> {
        let mut url = parse(&self.endpoint)?;
        if let Some(prefix) = url.path().strip_suffix(SSE_PATH_SUFFIX) {
            let path = format!("{prefix}{MESSAGE_PATH_SUFFIX}");
            url.set_path(&path);
        }
        Ok(url)
    }

    /// URL of the reachability probe, at the root of the endpoint's origin.
    pub fn health_url(&self) -> Result<Url, TransportError> {
        parse(&self.endpoint)?
            .join(HEALTH_PATH)
            .map_err(|e| TransportError::connection(format!("Invalid health URL: {e}")))
    }
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self::new("http://localhost:3100/sse")
    }
}

fn parse(endpoint: &str) -> Result<Url, TransportError> {
    Url::parse(endpoint)
        .map_err(|e| TransportError::connection(format!("Invalid endpoint '{endpoint}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_config_builder() {
        let config = HttpTransportConfig::new("http://example.com/sse")
            .with_connect_timeout(Duration::from_secs(3))
            .with_header("Authorization", "Bearer token")
            .with_headers([("X-A", "1"), ("X-B", "2")]);

        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.headers.len(), 3);
    }

    #[test]
    fn test_message_url_replaces_sse_suffix() {
        let config = HttpTransportConfig::new("http://localhost:3100/api/sse");
        assert_eq!(
            config.message_url().unwrap().as_str(),
            "http://localhost:3100/api/message"
        );
    }

    #[test]
    fn test_message_url_without_suffix() {
        let config = HttpTransportConfig::new("http://localhost:3100/rpc");
        assert_eq!(
            config.message_url().unwrap().as_str(),
            "http://localhost:3100/rpc"
        );
    }

    #[test]
    fn test_health_url_is_at_origin_root() {
        let config = HttpTransportConfig::new("http://localhost:3100/api/rpc?x=1");
        assert_eq!(
            config.health_url().unwrap().as_str(),
            "http://localhost:3100/health"
        );
    }

    #[test]
    fn test_invalid_endpoint() {
        let config = HttpTransportConfig::new("not a url");
        assert!(matches!(
            config.channel_url(),
            Err(TransportError::Connection { .. })
        ));
    }
}
