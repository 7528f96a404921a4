//! In-process command execution.
//!
//! [`DirectClient`] runs commands against a [`CommandRegistry`] in the same
//! process, without serialization or a transport. Before dispatch it
//! answers unknown names with a "did you mean" diagnostic and validates the
//! input against the command's declared parameters.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use afd_client::direct::DirectClient;
//! use afd_core::registry::{CommandDefinition, SimpleRegistry};
//! use afd_core::CommandResult;
//!
//! # tokio_test::block_on(async {
//! let registry = SimpleRegistry::new().with_command(
//!     CommandDefinition::new("todo-list", "List todos"),
//!     |_input, _ctx| async { CommandResult::success(serde_json::json!([])) },
//! );
//! let client = DirectClient::new(Arc::new(registry));
//!
//! assert!(client.call("todo-list", serde_json::json!({})).await.is_success());
//!
//! let typo = client.call("todo-lsit", serde_json::json!({})).await;
//! assert_eq!(typo.error().unwrap().suggestion.as_deref(), Some("Did you mean 'todo-list'?"));
//! # });
//! ```

mod batch;
mod middleware;
mod options;
mod pipeline;
mod validate;

pub use middleware::{LoggingMiddleware, Middleware, Next};
pub use options::{DirectCallOptions, DirectClientOptions};
pub use validate::validate_input;

use std::sync::Arc;
use std::time::Instant;

use afd_core::registry::{CommandContext, CommandInfo, CommandRegistry};
use afd_core::result::{CommandError, CommandResult};
use afd_core::suggest::UnknownCommandDiagnostic;
use serde_json::Value;
use tracing::{debug, trace};

/// Prefix of generated trace ids.
pub const TRACE_ID_PREFIX: &str = "trace-";

/// Executes commands against an in-process registry.
#[derive(Clone)]
pub struct DirectClient {
    registry: Arc<dyn CommandRegistry>,
    options: DirectClientOptions,
}

impl DirectClient {
    /// Create a client with default options.
    #[must_use]
    pub fn new(registry: Arc<dyn CommandRegistry>) -> Self {
        Self::with_options(registry, DirectClientOptions::default())
    }

    /// Create a client with explicit options.
    #[must_use]
    pub fn with_options(registry: Arc<dyn CommandRegistry>, options: DirectClientOptions) -> Self {
        Self { registry, options }
    }

    /// Execute a command.
    ///
    /// Never fails: unknown commands, invalid input and business failures
    /// all come back as [`CommandResult::Failure`].
    pub async fn call(&self, name: &str, input: Value) -> CommandResult {
        self.call_with(name, input, DirectCallOptions::default()).await
    }

    /// Execute a command with per-call options.
    pub async fn call_with(&self, name: &str, input: Value, options: DirectCallOptions) -> CommandResult {
        let started = Instant::now();
        let trace_id = options.trace_id.unwrap_or_else(generate_trace_id);
        trace!(command = name, %trace_id, "Direct call");

        if !self.registry.has_command(name) {
            debug!(command = name, %trace_id, "Unknown command");
            return UnknownCommandDiagnostic::new(name, self.registry.list_command_names())
                .into_result();
        }

        if self.options.validate_inputs {
            if let Some(definition) = self.registry.get_command(name) {
                let issues = validate_input(&definition, &input);
                if !issues.is_empty() {
                    debug!(command = name, %trace_id, ?issues, "Input validation failed");
                    return CommandResult::failure(CommandError::validation(format!(
                        "Invalid input for '{name}': {}",
                        issues.join("; ")
                    )));
                }
            }
        }

        let mut context = CommandContext::new().with_trace_id(trace_id.clone());
        context.source.clone_from(&self.options.source);
        context.timeout = options.timeout;
        context.extra = options.extra;

        let run = Next::new(self.registry.as_ref(), &self.options.middleware).run(name, input, context);
        let result = match options.timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(result) => result,
                Err(_) => CommandResult::failure(CommandError::timeout(
                    name,
                    u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                )),
            },
            None => run.await,
        };

        if self.options.debug {
            debug!(
                command = name,
                %trace_id,
                success = result.is_success(),
                elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
                "Direct call completed"
            );
        }
        result
    }

    /// Name and description of every command.
    #[must_use]
    pub fn list_commands(&self) -> Vec<CommandInfo> {
        self.registry.list_commands()
    }

    /// Every command name.
    #[must_use]
    pub fn list_command_names(&self) -> Vec<String> {
        self.registry.list_command_names()
    }

    /// Whether a command exists.
    #[must_use]
    pub fn has_command(&self, name: &str) -> bool {
        self.registry.has_command(name)
    }

    /// The configured source label.
    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.options.source.as_deref()
    }

    /// The registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<dyn CommandRegistry> {
        &self.registry
    }
}

impl std::fmt::Debug for DirectClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectClient")
            .field("commands", &self.registry.list_command_names())
            .field("options", &self.options)
            .finish()
    }
}

/// Generate a trace id: the prefix followed by 12 hex digits.
#[must_use]
pub fn generate_trace_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{TRACE_ID_PREFIX}{}", &id[..12])
}
