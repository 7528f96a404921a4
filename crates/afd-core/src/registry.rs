//! The command registry seam.
//!
//! A [`CommandRegistry`] is whatever actually executes named commands. The
//! runtime only relies on the trait: existence checks, listing, optional
//! parameter definitions for validation, and execution. [`SimpleRegistry`]
//! is an in-memory implementation suited to tests and embedding.
//!
//! # Example
//!
//! ```rust
//! use afd_core::registry::{CommandDefinition, CommandParameter, ParamType, SimpleRegistry};
//! use afd_core::result::CommandResult;
//!
//! let mut registry = SimpleRegistry::new();
//! registry.register(
//!     CommandDefinition::new("greet", "Say hello")
//!         .with_parameter(CommandParameter::new("name", ParamType::String)),
//!     |input, _ctx| async move {
//!         let name = input["name"].as_str().unwrap_or("world").to_string();
//!         CommandResult::success(serde_json::json!({ "greeting": format!("hello {name}") }))
//!     },
//! );
//! assert!(registry.contains("greet"));
//! ```

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::result::{CommandError, CommandResult};

/// Context passed through to command execution and middleware.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandContext {
    /// Trace id of this invocation.
    pub trace_id: Option<String>,
    /// Static label identifying the calling client.
    pub source: Option<String>,
    /// Caller-requested execution budget.
    pub timeout: Option<Duration>,
    /// Free-form values supplied by the caller.
    pub extra: HashMap<String, Value>,
}

impl CommandContext {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the trace id.
    #[must_use]
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// Set the source label.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Set the timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Primitive JSON types a parameter may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// JSON string.
    String,
    /// JSON number.
    Number,
    /// JSON boolean.
    Boolean,
    /// JSON object.
    Object,
    /// JSON array.
    Array,
    /// JSON null.
    Null,
}

impl ParamType {
    /// The type of a JSON value.
    #[must_use]
    pub const fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Array(_) => Self::Array,
            Value::Bool(_) => Self::Boolean,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Object(_) => Self::Object,
        }
    }

    /// Lowercase name as used in schemas.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::Null => "null",
        }
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const fn default_required() -> bool {
    true
}

/// A declared command parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandParameter {
    /// Parameter name.
    pub name: String,
    /// Expected JSON type.
    #[serde(rename = "type")]
    pub param_type: ParamType,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the parameter must be supplied.
    #[serde(default = "default_required")]
    pub required: bool,
    /// Value used when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Allowed values.
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
}

impl CommandParameter {
    /// A required parameter of the given type.
    #[must_use]
    pub fn new(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: None,
            required: true,
            default: None,
            enum_values: None,
        }
    }

    /// Mark the parameter optional.
    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the default value.
    #[must_use]
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Restrict to a set of allowed values.
    #[must_use]
    pub fn with_enum(mut self, values: Vec<Value>) -> Self {
        self.enum_values = Some(values);
        self
    }
}

/// Name and description of a registered command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandInfo {
    /// Command name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
}

/// A command's full declaration, used for validation and tool listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandDefinition {
    /// Command name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Declared parameters.
    #[serde(default)]
    pub parameters: Vec<CommandParameter>,
}

impl CommandDefinition {
    /// Create a definition without parameters.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    /// Add a parameter.
    #[must_use]
    pub fn with_parameter(mut self, parameter: CommandParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// JSON Schema object describing the parameters.
    #[must_use]
    pub fn input_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for param in &self.parameters {
            let mut prop = serde_json::Map::new();
            prop.insert("type".into(), Value::from(param.param_type.as_str()));
            if let Some(description) = &param.description {
                prop.insert("description".into(), Value::from(description.clone()));
            }
            if let Some(values) = &param.enum_values {
                prop.insert("enum".into(), Value::Array(values.clone()));
            }
            if let Some(default) = &param.default {
                prop.insert("default".into(), default.clone());
            }
            properties.insert(param.name.clone(), Value::Object(prop));
            if param.required {
                required.push(Value::from(param.name.clone()));
            }
        }
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// The name/description pair.
    #[must_use]
    pub fn info(&self) -> CommandInfo {
        CommandInfo {
            name: self.name.clone(),
            description: self.description.clone(),
        }
    }
}

/// The business-logic registry that executes named commands.
#[async_trait]
pub trait CommandRegistry: Send + Sync {
    /// Execute a command. Unknown names and business failures are
    /// reported as [`CommandResult::Failure`].
    async fn execute(&self, name: &str, input: Value, context: CommandContext) -> CommandResult;

    /// Name and description of every command, in registry order.
    fn list_commands(&self) -> Vec<CommandInfo>;

    /// Whether a command exists.
    fn has_command(&self, name: &str) -> bool;

    /// Every command name, in registry order.
    fn list_command_names(&self) -> Vec<String> {
        self.list_commands().into_iter().map(|c| c.name).collect()
    }

    /// Full declaration of a command, when the registry can supply one.
    fn get_command(&self, _name: &str) -> Option<CommandDefinition> {
        None
    }
}

type Handler = Arc<dyn Fn(Value, CommandContext) -> BoxFuture<'static, CommandResult> + Send + Sync>;

struct RegisteredCommand {
    definition: CommandDefinition,
    handler: Handler,
}

/// In-memory registry of async closures, kept in registration order.
#[derive(Default)]
pub struct SimpleRegistry {
    commands: Vec<RegisteredCommand>,
}

impl SimpleRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command, replacing any existing command of the same name.
    pub fn register<F, Fut>(&mut self, definition: CommandDefinition, handler: F)
    where
        F: Fn(Value, CommandContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CommandResult> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |input, ctx| Box::pin(handler(input, ctx)));
        let entry = RegisteredCommand {
            definition,
            handler,
        };
        match self
            .commands
            .iter_mut()
            .find(|c| c.definition.name == entry.definition.name)
        {
            Some(existing) => *existing = entry,
            None => self.commands.push(entry),
        }
    }

    /// Builder-style [`register`](Self::register).
    #[must_use]
    pub fn with_command<F, Fut>(mut self, definition: CommandDefinition, handler: F) -> Self
    where
        F: Fn(Value, CommandContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CommandResult> + Send + 'static,
    {
        self.register(definition, handler);
        self
    }

    /// Whether a command is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Number of registered commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    fn find(&self, name: &str) -> Option<&RegisteredCommand> {
        self.commands.iter().find(|c| c.definition.name == name)
    }
}

impl std::fmt::Debug for SimpleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleRegistry")
            .field(
                "commands",
                &self
                    .commands
                    .iter()
                    .map(|c| c.definition.name.as_str())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[async_trait]
impl CommandRegistry for SimpleRegistry {
    async fn execute(&self, name: &str, input: Value, context: CommandContext) -> CommandResult {
        let Some(command) = self.find(name) else {
            return CommandResult::failure(CommandError::command_not_found(name));
        };
        let handler = Arc::clone(&command.handler);
        handler(input, context).await
    }

    fn list_commands(&self) -> Vec<CommandInfo> {
        self.commands.iter().map(|c| c.definition.info()).collect()
    }

    fn has_command(&self, name: &str) -> bool {
        self.contains(name)
    }

    fn get_command(&self, name: &str) -> Option<CommandDefinition> {
        self.find(name).map(|c| c.definition.clone())
    }
}
