//! Folding per-step trust signals into pipeline metadata.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::StepResult;
use crate::result::{Source, Warning};

/// Confidence of one successful step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepConfidence {
    /// Step index.
    pub step: usize,
    /// Step alias.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Command name.
    pub command: String,
    /// Reported confidence, 1.0 when the command reported none.
    pub confidence: f64,
    /// Reported reasoning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// Reasoning reported by one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepReasoning {
    /// Step index.
    pub step_index: usize,
    /// Command name.
    pub command: String,
    /// The reasoning.
    pub reasoning: String,
}

/// A warning tagged with the step that raised it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineWarning {
    /// The warning.
    #[serde(flatten)]
    pub warning: Warning,
    /// Step index.
    pub step_index: usize,
    /// Step alias.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_alias: Option<String>,
}

/// A source tagged with the step that consulted it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSource {
    /// The source.
    #[serde(flatten)]
    pub source: Source,
    /// Step index.
    pub step_index: usize,
}

/// An alternative tagged with the step that considered it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineAlternative {
    /// The alternative payload.
    pub data: Value,
    /// Why it was not selected.
    pub reason: String,
    /// Step index.
    pub step_index: usize,
    /// Confidence in the alternative.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// Minimum confidence over successful steps.
///
/// A step without a reported confidence counts as 1.0; a pipeline where
/// nothing succeeded has confidence 0.
#[must_use]
pub fn aggregate_confidence(steps: &[StepResult]) -> f64 {
    steps
        .iter()
        .filter(|s| s.is_success())
        .map(StepResult::confidence)
        .reduce(f64::min)
        .unwrap_or(0.0)
}

/// Confidence of each successful step.
#[must_use]
pub fn confidence_breakdown(steps: &[StepResult]) -> Vec<StepConfidence> {
    steps
        .iter()
        .filter(|s| s.is_success())
        .map(|s| StepConfidence {
            step: s.index,
            alias: s.alias.clone(),
            command: s.command.clone(),
            confidence: s.confidence(),
            reasoning: s.metadata.as_ref().and_then(|m| m.reasoning.clone()),
        })
        .collect()
}

/// Reasoning of each successful step that reported some.
#[must_use]
pub fn aggregate_reasoning(steps: &[StepResult]) -> Vec<StepReasoning> {
    steps
        .iter()
        .filter(|s| s.is_success())
        .filter_map(|s| {
            let reasoning = s.metadata.as_ref()?.reasoning.clone()?;
            Some(StepReasoning {
                step_index: s.index,
                command: s.command.clone(),
                reasoning,
            })
        })
        .collect()
}

/// Warnings of every step that ran.
#[must_use]
pub fn aggregate_warnings(steps: &[StepResult]) -> Vec<PipelineWarning> {
    steps
        .iter()
        .flat_map(|s| {
            s.metadata
                .iter()
                .flat_map(|m| m.warnings.iter().flatten())
                .map(move |w| PipelineWarning {
                    warning: w.clone(),
                    step_index: s.index,
                    step_alias: s.alias.clone(),
                })
        })
        .collect()
}

/// Sources of every step that ran.
#[must_use]
pub fn aggregate_sources(steps: &[StepResult]) -> Vec<PipelineSource> {
    steps
        .iter()
        .flat_map(|s| {
            s.metadata
                .iter()
                .flat_map(|m| m.sources.iter().flatten())
                .map(move |source| PipelineSource {
                    source: source.clone(),
                    step_index: s.index,
                })
        })
        .collect()
}

/// Alternatives of every step that ran.
#[must_use]
pub fn aggregate_alternatives(steps: &[StepResult]) -> Vec<PipelineAlternative> {
    steps
        .iter()
        .flat_map(|s| {
            s.metadata
                .iter()
                .flat_map(|m| m.alternatives.iter().flatten())
                .map(move |alt| PipelineAlternative {
                    data: alt.data.clone(),
                    reason: alt.reason.clone(),
                    step_index: s.index,
                    confidence: alt.confidence,
                })
        })
        .collect()
}
