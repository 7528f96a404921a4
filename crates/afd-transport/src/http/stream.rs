//! Streaming transport: an SSE push channel plus per-request POSTs.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use afd_core::protocol::{Request, Response};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::Client;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use url::Url;

use super::client::{build_client, post_request, status_error};
use super::config::HttpTransportConfig;
use super::sse::{SseEvent, SseParser};
use crate::error::TransportError;
use crate::traits::{CloseHandler, ErrorHandler, MessageHandler, Transport, TransportHandlers, TransportMetadata};

/// Transport that receives pushed responses over Server-Sent Events and
/// sends requests with a POST to the sibling message endpoint.
///
/// `connect` resolves once the event stream is open and fails if it cannot
/// be opened. Pushed events are parsed as responses; malformed payloads are
/// dropped. When the stream ends after having been open, the close handler
/// fires.
pub struct SseTransport {
    config: HttpTransportConfig,
    channel_url: Url,
    message_url: Url,
    client: Client,
    handlers: Arc<TransportHandlers>,
    connected: Arc<AtomicBool>,
    connected_at: Mutex<Option<Instant>>,
    reader: Mutex<Option<CancellationToken>>,
    events_received: Arc<AtomicU64>,
}

impl SseTransport {
    /// Create the transport. Does not touch the network.
    pub fn new(config: HttpTransportConfig) -> Result<Self, TransportError> {
        let channel_url = config.channel_url()?;
        let message_url = config.message_url()?;
        let client = build_client(&config)?;
        Ok(Self {
            config,
            channel_url,
            message_url,
            client,
            handlers: Arc::new(TransportHandlers::new()),
            connected: Arc::new(AtomicBool::new(false)),
            connected_at: Mutex::new(None),
            reader: Mutex::new(None),
            events_received: Arc::new(AtomicU64::new(0)),
        })
    }

    /// URL requests are posted to.
    #[must_use]
    pub const fn message_url(&self) -> &Url {
        &self.message_url
    }

    /// Number of pushed events received.
    #[must_use]
    pub fn events_received(&self) -> u64 {
        self.events_received.load(Ordering::Relaxed)
    }

    fn stop_reader(&self) -> bool {
        let token = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        token.is_some_and(|token| {
            token.cancel();
            true
        })
    }
}

#[async_trait]
impl Transport for SseTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        if self.is_connected() {
            return Ok(());
        }
        debug!(url = %self.channel_url, "Opening SSE stream");

        let open = self
            .client
            .get(self.channel_url.clone())
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send();
        let response = tokio::time::timeout(self.config.connect_timeout, open)
            .await
            .map_err(|_| TransportError::Timeout {
                operation: format!("GET {}", self.channel_url),
                duration: self.config.connect_timeout,
            })?
            .map_err(|e| TransportError::connection(format!("Failed to open SSE stream: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }

        let token = CancellationToken::new();
        if let Some(previous) = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(token.clone())
        {
            previous.cancel();
        }
        self.connected.store(true, Ordering::Release);
        *self.connected_at.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
        info!(url = %self.channel_url, "SSE stream open");

        tokio::spawn(read_stream(
            response.bytes_stream(),
            token,
            Arc::clone(&self.handlers),
            Arc::clone(&self.connected),
            Arc::clone(&self.events_received),
        ));
        Ok(())
    }

    async fn disconnect(&self) {
        let was_connected = self.connected.swap(false, Ordering::AcqRel);
        if self.stop_reader() || was_connected {
            debug!(url = %self.channel_url, "SSE stream closed");
        }
    }

    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        post_request(&self.client, &self.message_url, &self.config, &request).await
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
        TransportMetadata::new("sse")
            .remote_addr(self.channel_url.as_str())
            .connected_at(*self.connected_at.lock().unwrap_or_else(PoisonError::into_inner))
            .push(true)
    }
}

impl std::fmt::Debug for SseTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SseTransport")
            .field("channel_url", &self.channel_url.as_str())
            .field("message_url", &self.message_url.as_str())
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

/// Drive the event stream until it ends or `token` is cancelled.
async fn read_stream<S>(
    stream: S,
    token: CancellationToken,
    handlers: Arc<TransportHandlers>,
    connected: Arc<AtomicBool>,
    events_received: Arc<AtomicU64>,
) where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send,
{
    let mut stream = std::pin::pin!(stream);
    let mut parser = SseParser::new();
    let mut decoder = Utf8Decoder::default();

    loop {
        let chunk = tokio::select! {
            biased;
            () = token.cancelled() => return,
            chunk = stream.next() => chunk,
        };
        match chunk {
            Some(Ok(bytes)) => {
                let text = decoder.decode(&bytes);
                for event in parser.push(&text) {
                    events_received.fetch_add(1, Ordering::Relaxed);
                    dispatch_event(&event, &handlers);
                }
            }
            Some(Err(e)) => {
                warn!(error = %e, "SSE stream error");
                handlers.emit_error(&TransportError::Read {
                    message: e.to_string(),
                });
                break;
            }
            None => break,
        }
    }

    // A manual disconnect clears the flag first and does not notify.
    if connected.swap(false, Ordering::AcqRel) {
        info!("SSE stream ended");
        handlers.emit_close();
    }
}

fn dispatch_event(event: &SseEvent, handlers: &TransportHandlers) {
    match serde_json::from_str::<Response>(&event.data) {
        Ok(response) if response.is_well_formed() => {
            trace!(id = %response.id, "Pushed response");
            handlers.emit_message(response);
        }
        Ok(_) => debug!(event = ?event.event, "Dropping response without result or error"),
        Err(e) => debug!(event = ?event.event, error = %e, "Dropping malformed SSE payload"),
    }
}

/// Decodes UTF-8 across chunk boundaries.
#[derive(Debug, Default)]
struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        match std::str::from_utf8(&self.pending) {
            Ok(text) => {
                let text = text.to_string();
                self.pending.clear();
                text
            }
            Err(e) if e.error_len().is_none() => {
                // Incomplete trailing sequence; keep it for the next chunk.
                let valid = e.valid_up_to();
                let tail = self.pending.split_off(valid);
                let text = String::from_utf8_lossy(&self.pending).into_owned();
                self.pending = tail;
                text
            }
            Err(_) => {
                let text = String::from_utf8_lossy(&self.pending).into_owned();
                self.pending.clear();
                text
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_utf8_decoder_splits_multibyte() {
        let mut decoder = Utf8Decoder::default();
        let bytes = "é".as_bytes();
        assert_eq!(decoder.decode(&bytes[..1]), "");
        assert_eq!(decoder.decode(&bytes[1..]), "é");
    }

    #[test]
    fn test_dispatch_drops_malformed() {
        let handlers = TransportHandlers::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        handlers.set_message(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let event = |data: &str| SseEvent {
            data: data.to_string(),
            ..SseEvent::default()
        };
        dispatch_event(&event("not json"), &handlers);
        dispatch_event(&event(r#"{"jsonrpc":"2.0","id":1}"#), &handlers);
        dispatch_event(&event(r#"{"jsonrpc":"2.0","id":1,"result":{}}"#), &handlers);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_send_requires_connection() {
        let transport = SseTransport::new(HttpTransportConfig::new("http://127.0.0.1:9/sse")).unwrap();
        assert_eq!(transport.message_url().as_str(), "http://127.0.0.1:9/message");

        let err = transport
            .send(Request::new(afd_core::protocol::methods::TOOLS_LIST, 1u64))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::NotConnected));
        assert!(transport.metadata().push);
    }
}
