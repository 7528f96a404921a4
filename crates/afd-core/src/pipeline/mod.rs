//! Pipeline request and result types.
//!
//! A pipeline is an ordered list of command invocations where later steps
//! may reference earlier outputs through `$`-prefixed variables and may be
//! gated by a [`PipelineCondition`]. Execution lives in the direct client;
//! this module holds the wire types, [`resolve`] for variable resolution and
//! condition evaluation, and [`aggregate`] for folding per-step trust
//! signals into pipeline-level metadata.
//!
//! # Example
//!
//! ```rust
//! use afd_core::pipeline::{PipelineCondition, PipelineStep};
//!
//! let steps = vec![
//!     PipelineStep::new("user-get").with_input(serde_json::json!({"id": 7})).with_alias("user"),
//!     PipelineStep::new("email-send")
//!         .with_input(serde_json::json!({"to": "$user.email"}))
//!         .with_when(PipelineCondition::Exists("$user.email".into())),
//! ];
//! assert_eq!(steps[1].command, "email-send");
//! ```

pub mod aggregate;
pub mod resolve;

pub use aggregate::{
    PipelineAlternative, PipelineSource, PipelineWarning, StepConfidence, StepReasoning,
    aggregate_alternatives, aggregate_confidence, aggregate_reasoning, aggregate_sources,
    aggregate_warnings, confidence_breakdown,
};
pub use resolve::{PipelineContext, evaluate_condition, get_nested_value, resolve_variable, resolve_variables};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::result::{CommandError, TrustSignals};

// ============================================================================
// Request Types
// ============================================================================

/// One step of a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStep {
    /// Command to invoke.
    pub command: String,
    /// Input, possibly containing variable references.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    /// Alias other steps can reference this step by.
    #[serde(rename = "as", default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Condition gating whether the step runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<PipelineCondition>,
    /// Overrides the pipeline-wide failure policy for this step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continue_on_failure: Option<bool>,
}

impl PipelineStep {
    /// A step invoking `command` with no input.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            input: None,
            alias: None,
            when: None,
            continue_on_failure: None,
        }
    }

    /// Set the input.
    #[must_use]
    pub fn with_input(mut self, input: Value) -> Self {
        self.input = Some(input);
        self
    }

    /// Set the alias.
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Set the condition.
    #[must_use]
    pub fn with_when(mut self, condition: PipelineCondition) -> Self {
        self.when = Some(condition);
        self
    }

    /// Override the failure policy for this step.
    #[must_use]
    pub const fn with_continue_on_failure(mut self, continue_on_failure: bool) -> Self {
        self.continue_on_failure = Some(continue_on_failure);
        self
    }
}

/// Pipeline-wide options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOptions {
    /// Keep going after a failed step (default `false`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continue_on_failure: Option<bool>,
    /// Wall-clock budget, checked before each step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl PipelineOptions {
    /// Keep going after failed steps.
    #[must_use]
    pub const fn continue_on_failure(mut self) -> Self {
        self.continue_on_failure = Some(true);
        self
    }

    /// Set the wall-clock budget.
    #[must_use]
    pub const fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// A pipeline: steps plus options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineRequest {
    /// Steps, executed in order.
    pub steps: Vec<PipelineStep>,
    /// Options.
    #[serde(default)]
    pub options: PipelineOptions,
}

/// Condition gating a step.
///
/// Serialized the way it is written by hand: `{"$eq": ["$prev.status", "active"]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PipelineCondition {
    /// The reference resolves to a non-null value.
    #[serde(rename = "$exists")]
    Exists(String),
    /// The reference equals the value.
    #[serde(rename = "$eq")]
    Eq(String, Value),
    /// The reference does not equal the value.
    #[serde(rename = "$ne")]
    Ne(String, Value),
    /// The reference is a number greater than the threshold.
    #[serde(rename = "$gt")]
    Gt(String, f64),
    /// The reference is a number at least the threshold.
    #[serde(rename = "$gte")]
    Gte(String, f64),
    /// The reference is a number less than the threshold.
    #[serde(rename = "$lt")]
    Lt(String, f64),
    /// The reference is a number at most the threshold.
    #[serde(rename = "$lte")]
    Lte(String, f64),
    /// All conditions hold.
    #[serde(rename = "$and")]
    And(Vec<PipelineCondition>),
    /// Any condition holds.
    #[serde(rename = "$or")]
    Or(Vec<PipelineCondition>),
    /// The condition does not hold.
    #[serde(rename = "$not")]
    Not(Box<PipelineCondition>),
}

// ============================================================================
// Result Types
// ============================================================================

/// Outcome of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// The command ran and succeeded.
    Success,
    /// The command ran and failed.
    Failure,
    /// The command did not run.
    Skipped,
}

/// Record of one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    /// Position in the pipeline.
    pub index: usize,
    /// Alias of the step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Command name.
    pub command: String,
    /// Outcome.
    pub status: StepStatus,
    /// Data produced, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Error, for failed or timed-out steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<CommandError>,
    /// Time spent in the command.
    pub execution_time_ms: u64,
    /// Trust signals reported by the command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TrustSignals>,
}

impl StepResult {
    /// A step that did not run.
    #[must_use]
    pub fn skipped(index: usize, step: &PipelineStep) -> Self {
        Self {
            index,
            alias: step.alias.clone(),
            command: step.command.clone(),
            status: StepStatus::Skipped,
            data: None,
            error: None,
            execution_time_ms: 0,
            metadata: None,
        }
    }

    /// Whether the step succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Success
    }

    pub(crate) fn confidence(&self) -> f64 {
        self.metadata
            .as_ref()
            .and_then(|m| m.confidence)
            .unwrap_or(1.0)
    }
}

/// Aggregated pipeline metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineMetadata {
    /// Minimum confidence over successful steps.
    pub confidence: f64,
    /// Per-step confidence.
    pub confidence_breakdown: Vec<StepConfidence>,
    /// Per-step reasoning.
    pub reasoning: Vec<StepReasoning>,
    /// Warnings from every step that ran.
    pub warnings: Vec<PipelineWarning>,
    /// Sources from every step that ran.
    pub sources: Vec<PipelineSource>,
    /// Alternatives from every step that ran.
    pub alternatives: Vec<PipelineAlternative>,
    /// Total wall-clock time.
    pub execution_time_ms: u64,
    /// Number of successful steps.
    pub completed_steps: usize,
    /// Number of steps requested.
    pub total_steps: usize,
}

impl PipelineMetadata {
    /// Fold step records into pipeline metadata.
    #[must_use]
    pub fn from_steps(steps: &[StepResult], execution_time_ms: u64) -> Self {
        Self {
            confidence: aggregate_confidence(steps),
            confidence_breakdown: confidence_breakdown(steps),
            reasoning: aggregate_reasoning(steps),
            warnings: aggregate_warnings(steps),
            sources: aggregate_sources(steps),
            alternatives: aggregate_alternatives(steps),
            execution_time_ms,
            completed_steps: steps.iter().filter(|s| s.is_success()).count(),
            total_steps: steps.len(),
        }
    }
}

/// Result of a whole pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    /// Data of the last successful step, `null` if none succeeded.
    pub data: Value,
    /// Aggregated metadata.
    pub metadata: PipelineMetadata,
    /// Every step, in order.
    pub steps: Vec<StepResult>,
}

impl PipelineResult {
    /// Build the result from step records.
    #[must_use]
    pub fn from_steps(steps: Vec<StepResult>, execution_time_ms: u64) -> Self {
        let data = steps
            .iter()
            .rev()
            .find(|s| s.is_success())
            .and_then(|s| s.data.clone())
            .unwrap_or(Value::Null);
        Self {
            data,
            metadata: PipelineMetadata::from_steps(&steps, execution_time_ms),
            steps,
        }
    }

    /// Whether every step succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.steps.iter().all(StepResult::is_success)
    }

    /// Step statuses in order.
    #[must_use]
    pub fn statuses(&self) -> Vec<StepStatus> {
        self.steps.iter().map(|s| s.status).collect()
    }
}
