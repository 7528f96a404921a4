//! Assertions for command results.

use afd_core::result::{CommandError, CommandResult};
use afd_core::types::CallToolResult;
use serde_json::Value;

/// Assert that `result` succeeded and return its data.
///
/// # Panics
///
/// Panics if the result is a failure.
#[track_caller]
pub fn assert_success(result: &CommandResult) -> &Value {
    match result {
        CommandResult::Success { data, .. } => data,
        CommandResult::Failure { error, .. } => panic!(
            "Expected successful command result, but got error [{}]: {}",
            error.code, error.message
        ),
    }
}

/// Assert that `result` failed with error `code` and return the error.
///
/// # Panics
///
/// Panics if the result succeeded or failed with another code.
#[track_caller]
pub fn assert_failure_code<'a>(result: &'a CommandResult, code: &str) -> &'a CommandError {
    let Some(error) = result.error() else {
        panic!("Expected command failure '{code}', but got success");
    };
    assert!(
        error.code == code,
        "Expected error code '{code}', but got '{}': {}",
        error.code,
        error.message
    );
    error
}

/// Assert that a `tools/call` result is an error whose text contains
/// `expected`.
///
/// # Panics
///
/// Panics if the result is not an error or the text does not match.
#[track_caller]
pub fn assert_tool_error(result: &CallToolResult, expected: &str) {
    assert!(result.is_error, "Expected error tool result, but got success");
    let text = result.first_text().unwrap_or_default();
    assert!(
        text.contains(expected),
        "Expected error text to contain '{expected}', but got '{text}'"
    );
}

/// Assert that a command result succeeded.
///
/// ```rust
/// use afd_testing::assert_command_ok;
/// use afd_core::CommandResult;
///
/// let result = CommandResult::success(serde_json::json!({"id": 1}));
/// let data = assert_command_ok!(result);
/// assert_eq!(data["id"], 1);
/// ```
#[macro_export]
macro_rules! assert_command_ok {
    ($result:expr) => {
        $crate::assertions::assert_success(&$result)
    };
}

/// Assert that a command result failed with the given code.
///
/// ```rust
/// use afd_testing::assert_command_err;
/// use afd_core::{CommandError, CommandResult, error_codes};
///
/// let result = CommandResult::failure(CommandError::validation("bad"));
/// assert_command_err!(result, error_codes::VALIDATION_ERROR);
/// ```
#[macro_export]
macro_rules! assert_command_err {
    ($result:expr, $code:expr) => {
        $crate::assertions::assert_failure_code(&$result, $code)
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use afd_core::result::error_codes;
    use serde_json::json;

    #[test]
    fn test_assert_success_returns_data() {
        let result = CommandResult::success(json!({"ok": true}));
        assert_eq!(assert_success(&result)["ok"], json!(true));
    }

    #[test]
    #[should_panic(expected = "Expected successful command result")]
    fn test_assert_success_fails_on_failure() {
        let result = CommandResult::failure(CommandError::internal("boom"));
        assert_success(&result);
    }

    #[test]
    fn test_assert_failure_code() {
        let result = CommandResult::failure(CommandError::validation("bad input"));
        let error = assert_failure_code(&result, error_codes::VALIDATION_ERROR);
        assert_eq!(error.message, "bad input");
    }

    #[test]
    #[should_panic(expected = "Expected error code")]
    fn test_assert_failure_code_wrong_code() {
        let result = CommandResult::failure(CommandError::internal("boom"));
        assert_failure_code(&result, error_codes::TIMEOUT);
    }

    #[test]
    fn test_assert_tool_error() {
        let result = CallToolResult::json(&json!({"error": "no such tool"}), true).unwrap();
        assert_tool_error(&result, "no such tool");
    }
}
