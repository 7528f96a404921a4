//! HTTP transports.
//!
//! Two transports share one configuration type and one request exchange:
//!
//! - [`SseTransport`] opens a Server-Sent Events channel for pushed
//!   responses and POSTs each request to the sibling `/message` endpoint
//! - [`HttpTransport`] POSTs each request to the configured endpoint and has
//!   no push channel; it probes `/health` for reachability
//!
//! # Example
//!
//! ```rust
//! use afd_transport::http::HttpTransportConfig;
//! use std::time::Duration;
//!
//! let config = HttpTransportConfig::new("http://localhost:3100/sse")
//!     .with_connect_timeout(Duration::from_secs(5))
//!     .with_header("Authorization", "Bearer token");
//!
//! assert_eq!(
//!     config.message_url().unwrap().as_str(),
//!     "http://localhost:3100/message"
//! );
//! ```

mod client;
mod config;
mod sse;
mod stream;

pub use client::HttpTransport;
pub use config::{HEALTH_PATH, HttpTransportConfig, MESSAGE_PATH_SUFFIX, SSE_PATH_SUFFIX};
pub use sse::{SseEvent, SseParser};
pub use stream::SseTransport;
