//! Batch request and result types.
//!
//! A batch is a list of independent command invocations, each tagged with a
//! caller-chosen id. Unlike a pipeline, commands never see each other's
//! output. Execution lives in the direct client; this module holds the wire
//! types and the summary arithmetic.
//!
//! # Example
//!
//! ```rust
//! use afd_core::batch::{BatchCommand, BatchOptions, BatchRequest};
//!
//! let request = BatchRequest::new(vec![
//!     BatchCommand::new("a", "todo-create", serde_json::json!({"title": "Milk"})),
//!     BatchCommand::new("b", "todo-create", serde_json::json!({"title": "Eggs"})),
//! ])
//! .with_options(BatchOptions::default().continue_on_error());
//! assert_eq!(request.commands.len(), 2);
//! ```

use std::collections::HashMap;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::result::{CommandError, CommandResult};

// ============================================================================
// Request Types
// ============================================================================

/// One command of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCommand {
    /// Caller-chosen id, echoed on the matching result.
    pub id: String,
    /// Command to invoke.
    pub command: String,
    /// Command input.
    #[serde(default)]
    pub input: Value,
    /// Free-form labels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Informational priority. Commands still run in list order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
}

impl BatchCommand {
    /// A command with the given id, name and input.
    #[must_use]
    pub fn new(id: impl Into<String>, command: impl Into<String>, input: Value) -> Self {
        Self {
            id: id.into(),
            command: command.into(),
            input,
            tags: None,
            priority: None,
        }
    }

    /// Set the tags.
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = Some(tags);
        self
    }

    /// Set the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }
}

/// How a batch reacts to failures and time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOptions {
    /// Keep going after a failed command (default `false`).
    #[serde(default)]
    pub continue_on_error: bool,
    /// Commands run together in groups of this size. Unset or `0` means one
    /// at a time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,
    /// Wall-clock budget, checked before each group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Stop once this many commands have failed, even when continuing on
    /// error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_failures: Option<usize>,
}

impl BatchOptions {
    /// Keep going after failed commands.
    #[must_use]
    pub const fn continue_on_error(mut self) -> Self {
        self.continue_on_error = true;
        self
    }

    /// Run up to `n` commands at a time.
    #[must_use]
    pub const fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = Some(n);
        self
    }

    /// Set the wall-clock budget.
    #[must_use]
    pub const fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Stop after `n` failures.
    #[must_use]
    pub const fn with_max_failures(mut self, n: usize) -> Self {
        self.max_failures = Some(n);
        self
    }

    /// Group size used for execution.
    #[must_use]
    pub fn group_size(&self) -> usize {
        self.max_concurrency.unwrap_or(1).max(1)
    }
}

/// A batch of commands.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    /// Commands, in execution order.
    pub commands: Vec<BatchCommand>,
    /// Execution options.
    #[serde(default)]
    pub options: BatchOptions,
    /// Values passed to every command through its context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<HashMap<String, Value>>,
}

impl BatchRequest {
    /// A batch with default options.
    #[must_use]
    pub fn new(commands: Vec<BatchCommand>) -> Self {
        Self {
            commands,
            ..Self::default()
        }
    }

    /// Set the options.
    #[must_use]
    pub fn with_options(mut self, options: BatchOptions) -> Self {
        self.options = options;
        self
    }

    /// Add a value to the shared context.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value);
        self
    }
}

// ============================================================================
// Result Types
// ============================================================================

/// Outcome of one command in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCommandResult {
    /// Id of the command this answers.
    pub id: String,
    /// Command name.
    pub command: String,
    /// The command's result; `None` when the command never ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<CommandResult>,
    /// Time spent on the command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl BatchCommandResult {
    /// A command that ran.
    #[must_use]
    pub fn completed(command: &BatchCommand, result: CommandResult, duration_ms: u64) -> Self {
        Self {
            id: command.id.clone(),
            command: command.command.clone(),
            result: Some(result),
            duration_ms: Some(duration_ms),
        }
    }

    /// A command left out after the batch stopped.
    #[must_use]
    pub fn skipped(command: &BatchCommand) -> Self {
        Self {
            id: command.id.clone(),
            command: command.command.clone(),
            result: None,
            duration_ms: None,
        }
    }

    /// Whether the command ran and succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result.as_ref().is_some_and(CommandResult::is_success)
    }

    /// Whether the command never ran.
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        self.result.is_none()
    }
}

/// Counts over a batch's results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    /// Commands in the batch.
    pub total: usize,
    /// Commands that succeeded.
    pub succeeded: usize,
    /// Commands that ran and failed.
    pub failed: usize,
    /// Commands that never ran.
    pub skipped: usize,
    /// Mean confidence of the successful commands that reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_confidence: Option<f64>,
}

impl BatchSummary {
    /// Count `results`.
    #[must_use]
    pub fn from_results(results: &[BatchCommandResult]) -> Self {
        let succeeded = results.iter().filter(|r| r.is_success()).count();
        let skipped = results.iter().filter(|r| r.is_skipped()).count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded - skipped,
            skipped,
            average_confidence: calculate_batch_confidence(results),
        }
    }

    /// Fraction of commands that succeeded, `0.0` for an empty batch.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.succeeded as f64 / self.total as f64
        }
    }
}

/// When a batch ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchTiming {
    /// RFC 3339 start time.
    pub started_at: String,
    /// RFC 3339 end time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
    /// Wall-clock duration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_ms: Option<u64>,
    /// `total_ms` divided by the number of commands.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_ms: Option<u64>,
}

impl BatchTiming {
    /// Timing started now.
    #[must_use]
    pub fn start() -> Self {
        Self {
            started_at: now(),
            ended_at: None,
            total_ms: None,
            average_ms: None,
        }
    }

    /// Stamp the end time and durations.
    #[must_use]
    pub fn finish(mut self, total_ms: u64, commands: usize) -> Self {
        self.ended_at = Some(now());
        self.total_ms = Some(total_ms);
        self.average_ms = (commands > 0).then(|| total_ms / commands as u64);
        self
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Result of a whole batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    /// Every command ran and succeeded.
    pub success: bool,
    /// One entry per command, in request order.
    pub results: Vec<BatchCommandResult>,
    /// Counts over `results`.
    pub summary: BatchSummary,
    /// Start, end and duration.
    pub timing: BatchTiming,
    /// Why the batch as a whole failed or stopped early, if it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<CommandError>,
}

impl BatchResult {
    /// Summarize `results`.
    #[must_use]
    pub fn from_results(
        results: Vec<BatchCommandResult>,
        timing: BatchTiming,
        error: Option<CommandError>,
    ) -> Self {
        let summary = BatchSummary::from_results(&results);
        Self {
            success: error.is_none() && summary.failed == 0 && summary.skipped == 0,
            results,
            summary,
            timing,
            error,
        }
    }

    /// A batch rejected before any command ran.
    #[must_use]
    pub fn rejected(error: CommandError, timing: BatchTiming) -> Self {
        Self::from_results(Vec::new(), timing, Some(error))
    }

    /// The result for command `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&BatchCommandResult> {
        self.results.iter().find(|r| r.id == id)
    }
}

/// Mean confidence over successful results that report one.
#[must_use]
pub fn calculate_batch_confidence(results: &[BatchCommandResult]) -> Option<f64> {
    let confidences: Vec<f64> = results
        .iter()
        .filter_map(|r| r.result.as_ref())
        .filter(|r| r.is_success())
        .filter_map(|r| r.meta().confidence)
        .collect();
    if confidences.is_empty() {
        None
    } else {
        Some(confidences.iter().sum::<f64>() / confidences.len() as f64)
    }
}

/// Whether `value` has the shape of a [`BatchRequest`].
#[must_use]
pub fn is_batch_request(value: &Value) -> bool {
    value.get("commands").is_some_and(Value::is_array)
}
