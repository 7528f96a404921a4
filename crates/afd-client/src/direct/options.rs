//! Direct client options.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use super::middleware::Middleware;

/// Options fixed when a [`DirectClient`](super::DirectClient) is built.
#[derive(Clone)]
pub struct DirectClientOptions {
    /// Label attached to every call's context.
    pub source: Option<String>,
    /// Log every call with its timing at debug level.
    pub debug: bool,
    /// Validate inputs against declared parameters before executing.
    pub validate_inputs: bool,
    /// Middleware, outermost first.
    pub middleware: Vec<Arc<dyn Middleware>>,
}

impl DirectClientOptions {
    /// Default options: validation on, no middleware.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the source label.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Enable debug logging.
    #[must_use]
    pub const fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Enable or disable input validation.
    #[must_use]
    pub const fn with_validation(mut self, validate_inputs: bool) -> Self {
        self.validate_inputs = validate_inputs;
        self
    }

    /// Append a middleware. Earlier middleware wraps later ones.
    #[must_use]
    pub fn with_middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }
}

impl Default for DirectClientOptions {
    fn default() -> Self {
        Self {
            source: None,
            debug: false,
            validate_inputs: true,
            middleware: Vec::new(),
        }
    }
}

impl std::fmt::Debug for DirectClientOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectClientOptions")
            .field("source", &self.source)
            .field("debug", &self.debug)
            .field("validate_inputs", &self.validate_inputs)
            .field("middleware", &self.middleware.len())
            .finish()
    }
}

/// Per-call options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectCallOptions {
    /// Trace id to use instead of a generated one.
    pub trace_id: Option<String>,
    /// Execution budget. The call fails with `TIMEOUT` when exceeded.
    pub timeout: Option<Duration>,
    /// Values passed through in the context.
    pub extra: HashMap<String, Value>,
}

impl DirectCallOptions {
    /// Empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use this trace id.
    #[must_use]
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// Bound the call.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Pass an extra value through the context.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}
