//! A command registry that records every call.

use std::future::Future;
use std::sync::{Mutex, PoisonError};

use afd_core::registry::{CommandContext, CommandDefinition, CommandInfo, CommandRegistry, SimpleRegistry};
use afd_core::result::CommandResult;
use async_trait::async_trait;
use serde_json::Value;

/// One recorded `execute` call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// Command name.
    pub name: String,
    /// Input as received.
    pub input: Value,
    /// Context as received.
    pub context: CommandContext,
}

/// A [`SimpleRegistry`] that records every `execute` call.
///
/// Tests use it to check that a command ran, with what input and context,
/// or that it never ran at all.
///
/// ```rust
/// use afd_testing::MockRegistry;
/// use afd_core::registry::{CommandContext, CommandDefinition, CommandRegistry};
/// use afd_core::CommandResult;
///
/// # tokio_test::block_on(async {
/// let registry = MockRegistry::new().with_command(
///     CommandDefinition::new("ping", "Ping"),
///     |_input, _ctx| async { CommandResult::success(serde_json::json!("pong")) },
/// );
/// registry.execute("ping", serde_json::json!({}), CommandContext::new()).await;
/// assert_eq!(registry.call_count(), 1);
/// # });
/// ```
#[derive(Debug, Default)]
pub struct MockRegistry {
    inner: SimpleRegistry,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record calls to an existing registry.
    #[must_use]
    pub fn wrap(inner: SimpleRegistry) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Register a command.
    #[must_use]
    pub fn with_command<F, Fut>(mut self, definition: CommandDefinition, handler: F) -> Self
    where
        F: Fn(Value, CommandContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CommandResult> + Send + 'static,
    {
        self.inner.register(definition, handler);
        self
    }

    /// Register a command that always returns `result`.
    #[must_use]
    pub fn with_result(self, definition: CommandDefinition, result: CommandResult) -> Self {
        self.with_command(definition, move |_input, _ctx| {
            let result = result.clone();
            async move { result }
        })
    }

    /// Every recorded call, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Recorded calls to `name`.
    #[must_use]
    pub fn calls_to(&self, name: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.name == name)
            .collect()
    }

    /// Number of recorded calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// The most recent call.
    #[must_use]
    pub fn last_call(&self) -> Option<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    /// Forget every recorded call.
    pub fn clear_calls(&self) {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

#[async_trait]
impl CommandRegistry for MockRegistry {
    async fn execute(&self, name: &str, input: Value, context: CommandContext) -> CommandResult {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedCall {
                name: name.to_string(),
                input: input.clone(),
                context: context.clone(),
            });
        self.inner.execute(name, input, context).await
    }

    fn list_commands(&self) -> Vec<CommandInfo> {
        self.inner.list_commands()
    }

    fn has_command(&self, name: &str) -> bool {
        self.inner.has_command(name)
    }

    fn get_command(&self, name: &str) -> Option<CommandDefinition> {
        self.inner.get_command(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use afd_core::result::{CommandError, error_codes};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn test_records_calls_in_order() {
        let registry = MockRegistry::new()
            .with_result(CommandDefinition::new("a", "A"), CommandResult::success(json!(1)))
            .with_result(
                CommandDefinition::new("b", "B"),
                CommandResult::failure(CommandError::internal("nope")),
            );

        registry.execute("a", json!({"x": 1}), CommandContext::new()).await;
        registry
            .execute("b", json!({}), CommandContext::new().with_trace_id("t-1"))
            .await;

        let calls = registry.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].input, json!({"x": 1}));
        assert_eq!(registry.last_call().unwrap().context.trace_id.as_deref(), Some("t-1"));
        assert_eq!(registry.calls_to("b").len(), 1);

        registry.clear_calls();
        assert_eq!(registry.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_name_is_recorded_and_fails() {
        let registry = MockRegistry::new();
        let result = registry.execute("missing", Value::Null, CommandContext::new()).await;
        assert_eq!(result.error().unwrap().code, error_codes::COMMAND_NOT_FOUND);
        assert_eq!(registry.call_count(), 1);
    }
}
