//! Tool types for `tools/list` and `tools/call`.
//!
//! A tool is the protocol-level view of a registered command: a name, an
//! optional description and a JSON Schema for its input.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::content::Content;
use crate::registry::{CommandDefinition, CommandInfo};
use crate::result::{CommandError, CommandResult, error_codes};
use crate::suggest::UnknownCommandDiagnostic;

/// A command as advertised by `tools/list`.
///
/// # Example
///
/// ```rust
/// use afd_core::types::Tool;
///
/// let tool = Tool::new("todo-create").description("Create a todo");
/// assert_eq!(tool.input_schema["type"], "object");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    /// Unique name of the command.
    pub name: String,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema of the command input.
    #[serde(rename = "inputSchema", default = "empty_schema")]
    pub input_schema: Value,
}

fn empty_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

impl Tool {
    /// Create a tool with an empty object schema.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema: empty_schema(),
        }
    }

    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the input schema.
    #[must_use]
    pub fn input_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }
}

impl From<CommandInfo> for Tool {
    fn from(info: CommandInfo) -> Self {
        Self::new(info.name).description(info.description)
    }
}

impl From<&CommandDefinition> for Tool {
    fn from(def: &CommandDefinition) -> Self {
        Self::new(def.name.clone())
            .description(def.description.clone())
            .input_schema(def.input_schema())
    }
}

/// Result of `tools/list`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListToolsResult {
    /// Available tools.
    pub tools: Vec<Tool>,
}

/// Parameters of `tools/call`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallToolParams {
    /// Command name.
    pub name: String,
    /// Command input.
    #[serde(default)]
    pub arguments: Value,
}

impl CallToolParams {
    /// Create call parameters.
    #[must_use]
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// Result of `tools/call`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallToolResult {
    /// Content blocks.
    #[serde(default)]
    pub content: Vec<Content>,
    /// Whether the command reported a failure.
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

impl CallToolResult {
    /// A single text block holding `value` as JSON.
    pub fn json<T: Serialize>(value: &T, is_error: bool) -> Result<Self, serde_json::Error> {
        Ok(Self {
            content: vec![Content::text(serde_json::to_string(value)?)],
            is_error,
        })
    }

    /// Wrap a command result, with `isError` set from its outcome.
    pub fn from_command_result(result: &CommandResult) -> Result<Self, serde_json::Error> {
        Self::json(result, !result.is_success())
    }

    /// The first text block, if any.
    #[must_use]
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(Content::as_text)
    }

    /// Decode the text payload as a [`CommandResult`].
    ///
    /// An unknown-command diagnostic becomes an `UNKNOWN_TOOL` failure
    /// carrying it. Any other payload that is not a valid envelope becomes a
    /// success carrying the raw text, or a `COMMAND_FAILED` failure when
    /// `isError` is set.
    #[must_use]
    pub fn into_command_result(self) -> CommandResult {
        let text = self.first_text().unwrap_or_default();
        if let Ok(result) = serde_json::from_str::<CommandResult>(text) {
            return result;
        }
        if self.is_error {
            if let Ok(diagnostic) = serde_json::from_str::<UnknownCommandDiagnostic>(text) {
                if diagnostic.error == error_codes::UNKNOWN_TOOL {
                    return diagnostic.into_result();
                }
            }
        }
        let raw = serde_json::from_str::<Value>(text).unwrap_or_else(|_| Value::from(text));
        if self.is_error {
            CommandResult::failure_with_data(
                CommandError::new(error_codes::COMMAND_FAILED, "Command reported an error"),
                raw,
            )
        } else {
            CommandResult::success(raw)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{CommandParameter, ParamType};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_tool_from_definition() {
        let def = CommandDefinition::new("todo-create", "Create a todo")
            .with_parameter(CommandParameter::new("title", ParamType::String));
        let tool = Tool::from(&def);
        assert_eq!(tool.description.as_deref(), Some("Create a todo"));
        assert_eq!(tool.input_schema["required"], serde_json::json!(["title"]));
    }

    #[test]
    fn test_call_result_wire_shape() {
        let result = CommandResult::success(serde_json::json!({"id": "todo-1"}));
        let wire = serde_json::to_value(CallToolResult::from_command_result(&result).unwrap()).unwrap();
        assert_eq!(wire["isError"], false);
        assert_eq!(wire["content"][0]["type"], "text");
        let text = wire["content"][0]["text"].as_str().unwrap();
        let decoded: CommandResult = serde_json::from_str(text).unwrap();
        assert_eq!(decoded, result);
    }

    #[test]
    fn test_into_command_result_decodes_envelope() {
        let result = CommandResult::failure(CommandError::validation("bad"));
        let call = CallToolResult::from_command_result(&result).unwrap();
        assert!(call.is_error);
        assert_eq!(call.into_command_result(), result);
    }

    #[test]
    fn test_non_envelope_error_payload() {
        let call = CallToolResult {
            content: vec![Content::text("boom")],
            is_error: true,
        };
        let result = call.into_command_result();
        assert_eq!(result.error().unwrap().code, error_codes::COMMAND_FAILED);
        assert_eq!(result.data(), Some(&Value::from("boom")));
    }

    #[test]
    fn test_diagnostic_payload_becomes_unknown_tool() {
        let diagnostic = UnknownCommandDiagnostic::new("todo-lsit", vec!["todo-list".to_string()]);
        let call = CallToolResult::json(&diagnostic, true).unwrap();
        let result = call.into_command_result();
        assert_eq!(result.error().unwrap().code, error_codes::UNKNOWN_TOOL);
        assert_eq!(result.data().unwrap()["hint"], "Did you mean 'todo-list'?");
    }

    #[test]
    fn test_list_tools_tolerates_missing_schema() {
        let json = serde_json::json!({"tools": [{"name": "ping"}]});
        let list: ListToolsResult = serde_json::from_value(json).unwrap();
        assert_eq!(list.tools[0].input_schema["type"], "object");
    }
}
