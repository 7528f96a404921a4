//! Trust signals that may accompany any command result.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kind of source a result drew on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// Web page or online resource.
    Url,
    /// Local or remote file.
    File,
    /// Database record.
    Database,
    /// API endpoint.
    Api,
    /// Knowledge graph or internal model.
    Knowledge,
    /// User-provided input.
    User,
    /// Anything else.
    Other,
}

/// A source consulted while producing a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    /// Human-readable name.
    pub name: String,
    /// Kind of source.
    #[serde(rename = "type")]
    pub source_type: SourceType,
    /// URL or URI of the source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// When the source was accessed (RFC 3339).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accessed_at: Option<String>,
    /// Relevance score between 0 and 1.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance: Option<f64>,
}

impl Source {
    /// Create a source.
    #[must_use]
    pub fn new(name: impl Into<String>, source_type: SourceType) -> Self {
        Self {
            name: name.into(),
            source_type,
            url: None,
            accessed_at: None,
            relevance: None,
        }
    }

    /// Set the URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// Status of a plan step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStepStatus {
    /// Not started.
    Pending,
    /// Executing.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// Not executed.
    Skipped,
}

/// One step of a multi-step plan reported by a command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStep {
    /// 1-based position in the plan.
    pub step: u32,
    /// What the step does.
    pub description: String,
    /// Current status.
    pub status: PlanStepStatus,
    /// Elapsed time, once finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// An option the command considered but did not choose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alternative {
    /// The alternative payload.
    pub data: serde_json::Value,
    /// Why it was not selected.
    pub reason: String,
    /// Confidence in the alternative (0-1).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl Alternative {
    /// Create an alternative.
    #[must_use]
    pub fn new(data: serde_json::Value, reason: impl Into<String>) -> Self {
        Self {
            data,
            reason: reason.into(),
            confidence: None,
        }
    }

    /// Set the confidence.
    #[must_use]
    pub const fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// Warning severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningSeverity {
    /// Informational.
    Low,
    /// Should be reviewed.
    Medium,
    /// Needs attention.
    High,
}

/// A non-fatal issue to surface alongside a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Warning {
    /// Machine-readable code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Severity, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<WarningSeverity>,
}

impl Warning {
    /// Create a warning.
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            severity: None,
        }
    }
}

/// Execution metadata attached to a result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMetadata {
    /// Time taken to execute the command in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<u64>,
    /// Version of the command that produced the result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_version: Option<String>,
    /// Trace id of the invocation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    /// When the command ran (RFC 3339).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Anything else.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// The optional trust fields shared by successful and failed results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustSignals {
    /// Confidence in the result (0-1).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Why the command produced this result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// Sources consulted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Source>>,
    /// Steps the command planned or executed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Vec<PlanStep>>,
    /// Alternatives considered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternatives: Option<Vec<Alternative>>,
    /// Non-fatal warnings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<Warning>>,
    /// Execution metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResultMetadata>,
}

impl TrustSignals {
    /// Whether no trust field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
