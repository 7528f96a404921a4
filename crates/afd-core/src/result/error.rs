//! Structured, actionable command failures.
//!
//! A [`CommandError`] tells the caller what went wrong and, where possible,
//! what to do about it. It is data, not a Rust error: it travels inside
//! [`CommandResult::Failure`](super::CommandResult).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Well-known error codes.
pub mod error_codes {
    /// The requested command does not exist; a diagnostic payload is attached.
    pub const UNKNOWN_TOOL: &str = "UNKNOWN_TOOL";
    /// The registry has no command with this name.
    pub const COMMAND_NOT_FOUND: &str = "COMMAND_NOT_FOUND";
    /// Input failed validation.
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    /// A referenced resource does not exist.
    pub const NOT_FOUND: &str = "NOT_FOUND";
    /// The caller is being rate limited.
    pub const RATE_LIMITED: &str = "RATE_LIMITED";
    /// The operation ran out of time.
    pub const TIMEOUT: &str = "TIMEOUT";
    /// Unexpected internal failure.
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
    /// The command failed without a structured error.
    pub const COMMAND_FAILED: &str = "COMMAND_FAILED";
    /// The command could not be delivered.
    pub const CONNECTION_ERROR: &str = "CONNECTION_ERROR";
}

/// A structured command failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandError {
    /// Machine-readable error code in `SCREAMING_SNAKE_CASE`.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// What the caller can do about it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Whether retrying the same request might succeed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
    /// Additional technical details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, serde_json::Value>>,
    /// The error that caused this one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<CommandError>>,
}

impl CommandError {
    /// Create an error with a code and message.
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            suggestion: None,
            retryable: None,
            details: None,
            cause: None,
        }
    }

    /// Add a suggestion.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Mark the error as retryable or not.
    #[must_use]
    pub const fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = Some(retryable);
        self
    }

    /// Add one detail entry.
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.details
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value);
        self
    }

    /// Chain a cause.
    #[must_use]
    pub fn with_cause(mut self, cause: Self) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// A resource with the given id was not found.
    #[must_use]
    pub fn not_found(resource: &str, id: &str) -> Self {
        Self::new(
            error_codes::NOT_FOUND,
            format!("{resource} with ID '{id}' not found"),
        )
        .with_suggestion(format!(
            "Verify the {} ID exists and try again",
            resource.to_lowercase()
        ))
        .with_retryable(false)
        .with_detail("resourceType", serde_json::json!(resource))
        .with_detail("resourceId", serde_json::json!(id))
    }

    /// Input failed validation.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(error_codes::VALIDATION_ERROR, message)
            .with_suggestion("Check the command's parameters and try again")
            .with_retryable(false)
    }

    /// The requested command is unknown.
    #[must_use]
    pub fn unknown_tool(message: impl Into<String>) -> Self {
        Self::new(error_codes::UNKNOWN_TOOL, message)
    }

    /// The registry has no command with this name.
    #[must_use]
    pub fn command_not_found(name: &str) -> Self {
        Self::new(
            error_codes::COMMAND_NOT_FOUND,
            format!("Command '{name}' not found"),
        )
        .with_suggestion("List the available commands and try again")
        .with_retryable(false)
    }

    /// The caller is rate limited.
    #[must_use]
    pub fn rate_limited(retry_after_seconds: Option<u64>) -> Self {
        let err = Self::new(error_codes::RATE_LIMITED, "Rate limit exceeded").with_retryable(true);
        match retry_after_seconds {
            Some(secs) => err
                .with_suggestion(format!("Wait {secs} seconds and try again"))
                .with_detail("retryAfterSeconds", serde_json::json!(secs)),
            None => err.with_suggestion("Wait a moment and try again"),
        }
    }

    /// An operation timed out.
    #[must_use]
    pub fn timeout(operation: &str, timeout_ms: u64) -> Self {
        Self::new(
            error_codes::TIMEOUT,
            format!("{operation} timed out after {timeout_ms}ms"),
        )
        .with_suggestion("Try again, or raise the timeout")
        .with_retryable(true)
        .with_detail("timeoutMs", serde_json::json!(timeout_ms))
    }

    /// Unexpected internal failure.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(error_codes::INTERNAL_ERROR, message).with_retryable(false)
    }

    /// The command could not be delivered to its executor.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(error_codes::CONNECTION_ERROR, message)
            .with_suggestion("Check the connection and try again")
            .with_retryable(true)
    }

    /// Whether the error is explicitly marked retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.retryable.unwrap_or(false)
    }
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_not_found_carries_details() {
        let err = CommandError::not_found("Todo", "123");
        assert_eq!(err.code, error_codes::NOT_FOUND);
        assert_eq!(err.message, "Todo with ID '123' not found");
        let details = err.details.unwrap();
        assert_eq!(details["resourceId"], serde_json::json!("123"));
    }

    #[test]
    fn test_retryability() {
        assert!(CommandError::timeout("todo-list", 500).is_retryable());
        assert!(CommandError::rate_limited(Some(60)).is_retryable());
        assert!(!CommandError::validation("bad").is_retryable());
        assert!(!CommandError::new("X", "y").is_retryable());
    }

    #[test]
    fn test_camel_case_wire_format() {
        let err = CommandError::internal("boom").with_cause(CommandError::new("IO", "disk"));
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "INTERNAL_ERROR");
        assert_eq!(json["retryable"], false);
        assert_eq!(json["cause"]["code"], "IO");
        assert!(json.get("suggestion").is_none());
    }
}
