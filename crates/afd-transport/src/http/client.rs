//! Plain HTTP transport and the request/response exchange shared with the
//! SSE transport.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use afd_core::protocol::{Request, Response};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use url::Url;

use super::config::HttpTransportConfig;
use crate::error::TransportError;
use crate::traits::{CloseHandler, ErrorHandler, MessageHandler, Transport, TransportHandlers, TransportMetadata};

// ============================================================================
// Shared exchange
// ============================================================================

/// Build the reqwest client for a configuration.
///
/// Only the connect timeout is set on the client; request timeouts are set
/// per request so the long-lived SSE stream is not cut off.
pub(crate) fn build_client(config: &HttpTransportConfig) -> Result<Client, TransportError> {
    Client::builder()
        .connect_timeout(config.connect_timeout)
        .user_agent(config.user_agent.clone())
        .default_headers(build_headers(config)?)
        .build()
        .map_err(|e| TransportError::connection(format!("Failed to create HTTP client: {e}")))
}

fn build_headers(config: &HttpTransportConfig) -> Result<HeaderMap, TransportError> {
    let mut headers = HeaderMap::new();
    for (name, value) in &config.headers {
        headers.insert(
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                TransportError::connection(format!("Invalid header name '{name}': {e}"))
            })?,
            HeaderValue::from_str(value).map_err(|e| {
                TransportError::connection(format!("Invalid header value for '{name}': {e}"))
            })?,
        );
    }
    Ok(headers)
}

/// POST one request and validate the response shape.
pub(crate) async fn post_request(
    client: &Client,
    url: &Url,
    config: &HttpTransportConfig,
    request: &Request,
) -> Result<Response, TransportError> {
    let body = serde_json::to_vec(request)?;
    trace!(id = %request.id, method = %request.method, url = %url, "POST request");

    let response = client
        .post(url.clone())
        .timeout(config.request_timeout)
        .header(CONTENT_TYPE, "application/json")
        .header(ACCEPT, "application/json")
        .body(body)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout {
                    operation: format!("POST {url}"),
                    duration: config.request_timeout,
                }
            } else {
                TransportError::connection(format!("HTTP POST failed: {e}"))
            }
        })?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(status_error(status, text));
    }

    let bytes = response.bytes().await.map_err(|e| TransportError::Read {
        message: format!("Failed to read response body: {e}"),
    })?;
    parse_response(&bytes)
}

pub(crate) fn status_error(status: StatusCode, body: String) -> TransportError {
    let message = if body.is_empty() {
        status.canonical_reason().unwrap_or("unexpected status").to_string()
    } else {
        body
    };
    TransportError::HttpStatus {
        status: status.as_u16(),
        message,
    }
}

/// Parse and validate a response payload.
pub(crate) fn parse_response(bytes: &[u8]) -> Result<Response, TransportError> {
    let response: Response = serde_json::from_slice(bytes)
        .map_err(|e| TransportError::invalid_message(format!("Response is not a JSON-RPC response: {e}")))?;
    if !response.is_well_formed() {
        return Err(TransportError::invalid_message(
            "Response must carry exactly one of 'result' or 'error'",
        ));
    }
    Ok(response)
}

// ============================================================================
// Plain HTTP transport
// ============================================================================

/// Request/response transport without a push channel.
///
/// `connect` probes `<origin>/health` but never fails because of it;
/// reachability is established by the first real `send`. Every response is
/// also delivered to the message handler.
pub struct HttpTransport {
    config: HttpTransportConfig,
    url: Url,
    client: Client,
    handlers: Arc<TransportHandlers>,
    connected: Arc<AtomicBool>,
    connected_at: Mutex<Option<Instant>>,
    probe: Mutex<Option<CancellationToken>>,
    requests_sent: AtomicU64,
}

impl HttpTransport {
    /// Create the transport. Does not touch the network.
    pub fn new(config: HttpTransportConfig) -> Result<Self, TransportError> {
        let url = config.channel_url()?;
        let client = build_client(&config)?;
        Ok(Self {
            config,
            url,
            client,
            handlers: Arc::new(TransportHandlers::new()),
            connected: Arc::new(AtomicBool::new(false)),
            connected_at: Mutex::new(None),
            probe: Mutex::new(None),
            requests_sent: AtomicU64::new(0),
        })
    }

    /// Number of requests sent.
    #[must_use]
    pub fn requests_sent(&self) -> u64 {
        self.requests_sent.load(Ordering::Relaxed)
    }

    fn start_probe(&self, health_url: Url) {
        let Some(interval) = self.config.health_interval else {
            return;
        };
        let token = CancellationToken::new();
        let previous = self
            .probe
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(token.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }

        let client = self.client.clone();
        let handlers = Arc::clone(&self.handlers);
        let timeout = self.config.connect_timeout;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    () = tokio::time::sleep(interval) => {}
                }
                if let Err(e) = probe(&client, &health_url, timeout).await {
                    debug!(url = %health_url, error = %e, "Health probe failed");
                    handlers.emit_error(&e);
                }
            }
        });
    }
}

async fn probe(client: &Client, url: &Url, timeout: std::time::Duration) -> Result<(), TransportError> {
    let response = client
        .get(url.clone())
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| TransportError::connection(format!("Health probe failed: {e}")))?;
    if response.status().is_success() {
        Ok(())
    } else {
        Err(status_error(response.status(), String::new()))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let health_url = self.config.health_url()?;
        match probe(&self.client, &health_url, self.config.connect_timeout).await {
            Ok(()) => debug!(url = %health_url, "Health probe succeeded"),
            Err(e) => debug!(url = %health_url, error = %e, "Health probe failed, deferring to first request"),
        }
        self.connected.store(true, Ordering::Release);
        *self.connected_at.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
        self.start_probe(health_url);
        Ok(())
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::Release);
        if let Some(token) = self
            .probe
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            token.cancel();
        }
    }

    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        let response = post_request(&self.client, &self.url, &self.config, &request).await?;
        self.requests_sent.fetch_add(1, Ordering::Relaxed);
        self.handlers.emit_message(response.clone());
        Ok(response)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn on_message(&self, handler: MessageHandler) {
        self.handlers.set_message(handler);
    }

    fn on_error(&self, handler: ErrorHandler) {
        self.handlers.set_error(handler);
    }

    fn on_close(&self, handler: CloseHandler) {
        self.handlers.set_close(handler);
    }

    fn metadata(&self) -> TransportMetadata {
        TransportMetadata::new("http")
            .remote_addr(self.url.as_str())
            .connected_at(*self.connected_at.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("url", &self.url.as_str())
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}
