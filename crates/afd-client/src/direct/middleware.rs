//! Command middleware.
//!
//! Middleware wraps command execution. Each one receives the command name,
//! input and context plus a [`Next`] handle, and must call
//! [`Next::run`] to continue down the chain. The first configured
//! middleware is the outermost: it runs first on the way in and last on the
//! way out.

use std::sync::Arc;
use std::time::Instant;

use afd_core::registry::{CommandContext, CommandRegistry};
use afd_core::result::CommandResult;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{Level, debug, info, trace};

/// Interceptor around command execution.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Handle a call, usually by delegating to `next`.
    async fn handle(
        &self,
        name: &str,
        input: Value,
        context: CommandContext,
        next: Next<'_>,
    ) -> CommandResult;
}

/// The remainder of a middleware chain.
pub struct Next<'a> {
    registry: &'a dyn CommandRegistry,
    rest: &'a [Arc<dyn Middleware>],
}

impl<'a> Next<'a> {
    pub(crate) fn new(registry: &'a dyn CommandRegistry, chain: &'a [Arc<dyn Middleware>]) -> Self {
        Self {
            registry,
            rest: chain,
        }
    }

    /// Run the rest of the chain, ending at the registry.
    pub async fn run(self, name: &str, input: Value, context: CommandContext) -> CommandResult {
        match self.rest.split_first() {
            Some((first, rest)) => {
                let next = Next {
                    registry: self.registry,
                    rest,
                };
                first.handle(name, input, context, next).await
            }
            None => self.registry.execute(name, input, context).await,
        }
    }
}

impl std::fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next")
            .field("remaining", &self.rest.len())
            .finish_non_exhaustive()
    }
}

/// Logs every call and its outcome.
#[derive(Debug, Clone)]
pub struct LoggingMiddleware {
    level: Level,
    log_input: bool,
}

impl LoggingMiddleware {
    /// Log at `level`.
    #[must_use]
    pub const fn new(level: Level) -> Self {
        Self {
            level,
            log_input: false,
        }
    }

    /// Also log the command input.
    ///
    /// Inputs may contain sensitive data.
    #[must_use]
    pub const fn with_input(mut self, log_input: bool) -> Self {
        self.log_input = log_input;
        self
    }
}

impl Default for LoggingMiddleware {
    fn default() -> Self {
        Self::new(Level::DEBUG)
    }
}

#[async_trait]
impl Middleware for LoggingMiddleware {
    async fn handle(
        &self,
        name: &str,
        input: Value,
        context: CommandContext,
        next: Next<'_>,
    ) -> CommandResult {
        let trace_id = context.trace_id.clone().unwrap_or_default();
        if self.log_input {
            match self.level {
                Level::TRACE => trace!(command = name, %trace_id, ?input, "calling command"),
                Level::INFO => info!(command = name, %trace_id, ?input, "calling command"),
                _ => debug!(command = name, %trace_id, ?input, "calling command"),
            }
        } else {
            match self.level {
                Level::TRACE => trace!(command = name, %trace_id, "calling command"),
                Level::INFO => info!(command = name, %trace_id, "calling command"),
                _ => debug!(command = name, %trace_id, "calling command"),
            }
        }

        let started = Instant::now();
        let result = next.run(name, input, context).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let success = result.is_success();

        match self.level {
            Level::TRACE => trace!(command = name, %trace_id, success, elapsed_ms, "command finished"),
            Level::INFO => info!(command = name, %trace_id, success, elapsed_ms, "command finished"),
            _ => debug!(command = name, %trace_id, success, elapsed_ms, "command finished"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use afd_core::registry::{CommandDefinition, SimpleRegistry};
    use serde_json::json;

    struct Tag(&'static str);

    #[async_trait]
    impl Middleware for Tag {
        async fn handle(
            &self,
            name: &str,
            input: Value,
            context: CommandContext,
            next: Next<'_>,
        ) -> CommandResult {
            let mut path: Vec<Value> = input
                .get("path")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            path.push(json!(self.0));
            next.run(name, json!({ "path": path }), context).await
        }
    }

    fn registry() -> SimpleRegistry {
        SimpleRegistry::new().with_command(CommandDefinition::new("echo", "Echo"), |input, _ctx| async move {
            CommandResult::success(input)
        })
    }

    #[tokio::test]
    async fn test_empty_chain_reaches_registry() {
        let registry = registry();
        let result = Next::new(&registry, &[])
            .run("echo", json!({"x": 1}), CommandContext::new())
            .await;
        assert_eq!(result.data(), Some(&json!({"x": 1})));
    }

    #[tokio::test]
    async fn test_first_configured_runs_first() {
        let registry = registry();
        let chain: Vec<Arc<dyn Middleware>> = vec![Arc::new(Tag("outer")), Arc::new(Tag("inner"))];
        let result = Next::new(&registry, &chain)
            .run("echo", json!({}), CommandContext::new())
            .await;
        assert_eq!(result.data(), Some(&json!({"path": ["outer", "inner"]})));
    }

    #[tokio::test]
    async fn test_logging_middleware_passes_through() {
        let registry = registry();
        let chain: Vec<Arc<dyn Middleware>> =
            vec![Arc::new(LoggingMiddleware::new(Level::INFO).with_input(true))];
        let result = Next::new(&registry, &chain)
            .run("echo", json!({"x": 2}), CommandContext::new().with_trace_id("trace-1"))
            .await;
        assert!(result.is_success());
    }
}
