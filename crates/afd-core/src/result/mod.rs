//! The uniform envelope returned by every command invocation.
//!
//! Whether a command runs in-process or across a network transport, its
//! outcome is a [`CommandResult`]: either a success carrying data, or a
//! failure carrying a structured [`CommandError`] (and optionally data, such
//! as an unknown-command diagnostic). Both variants may carry
//! [`TrustSignals`] such as confidence, reasoning and warnings.
//!
//! On the wire the envelope is a flat camelCase object:
//!
//! ```json
//! {"success": false, "error": {"code": "UNKNOWN_TOOL", "message": "..."}, "data": {...}}
//! ```
//!
//! # Example
//!
//! ```rust
//! use afd_core::result::{CommandError, CommandResult};
//!
//! let ok = CommandResult::success(serde_json::json!({"id": "todo-1"})).with_confidence(0.9);
//! assert!(ok.is_success());
//!
//! let failed = CommandResult::failure(CommandError::validation("title is required"));
//! assert_eq!(failed.error().map(|e| e.code.as_str()), Some("VALIDATION_ERROR"));
//! ```

mod error;
mod metadata;

pub use error::{CommandError, error_codes};
pub use metadata::{
    Alternative, PlanStep, PlanStepStatus, ResultMetadata, Source, SourceType, TrustSignals,
    Warning, WarningSeverity,
};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of a single command invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireResult", into = "WireResult")]
pub enum CommandResult {
    /// The command succeeded.
    Success {
        /// The command's output (`Value::Null` when it produced none).
        data: Value,
        /// Optional trust signals.
        meta: TrustSignals,
    },
    /// The command failed.
    Failure {
        /// What went wrong.
        error: CommandError,
        /// Structured payload accompanying the failure, if any.
        data: Option<Value>,
        /// Optional trust signals.
        meta: TrustSignals,
    },
}

impl CommandResult {
    /// A successful result.
    #[must_use]
    pub fn success(data: Value) -> Self {
        Self::Success {
            data,
            meta: TrustSignals::default(),
        }
    }

    /// A failed result.
    #[must_use]
    pub fn failure(error: CommandError) -> Self {
        Self::Failure {
            error,
            data: None,
            meta: TrustSignals::default(),
        }
    }

    /// A failed result carrying a structured payload.
    #[must_use]
    pub fn failure_with_data(error: CommandError, data: Value) -> Self {
        Self::Failure {
            error,
            data: Some(data),
            meta: TrustSignals::default(),
        }
    }

    /// Whether this is a success.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The data payload, if any.
    #[must_use]
    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::Success { data, .. } if !data.is_null() => Some(data),
            Self::Success { .. } => None,
            Self::Failure { data, .. } => data.as_ref(),
        }
    }

    /// The error, if this is a failure.
    #[must_use]
    pub const fn error(&self) -> Option<&CommandError> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error, .. } => Some(error),
        }
    }

    /// Trust signals of either variant.
    #[must_use]
    pub const fn meta(&self) -> &TrustSignals {
        match self {
            Self::Success { meta, .. } | Self::Failure { meta, .. } => meta,
        }
    }

    /// Mutable trust signals of either variant.
    pub fn meta_mut(&mut self) -> &mut TrustSignals {
        match self {
            Self::Success { meta, .. } | Self::Failure { meta, .. } => meta,
        }
    }

    /// Convert into a `Result`, dropping trust signals.
    pub fn into_result(self) -> Result<Value, CommandError> {
        match self {
            Self::Success { data, .. } => Ok(data),
            Self::Failure { error, .. } => Err(error),
        }
    }

    /// Set the confidence.
    #[must_use]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.meta_mut().confidence = Some(confidence);
        self
    }

    /// Set the reasoning.
    #[must_use]
    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.meta_mut().reasoning = Some(reasoning.into());
        self
    }

    /// Append a warning.
    #[must_use]
    pub fn with_warning(mut self, warning: Warning) -> Self {
        self.meta_mut()
            .warnings
            .get_or_insert_with(Vec::new)
            .push(warning);
        self
    }

    /// Append a source.
    #[must_use]
    pub fn with_source(mut self, source: Source) -> Self {
        self.meta_mut()
            .sources
            .get_or_insert_with(Vec::new)
            .push(source);
        self
    }

    /// Append an alternative.
    #[must_use]
    pub fn with_alternative(mut self, alternative: Alternative) -> Self {
        self.meta_mut()
            .alternatives
            .get_or_insert_with(Vec::new)
            .push(alternative);
        self
    }

    /// Set the plan.
    #[must_use]
    pub fn with_plan(mut self, plan: Vec<PlanStep>) -> Self {
        self.meta_mut().plan = Some(plan);
        self
    }

    /// Set the execution metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: ResultMetadata) -> Self {
        self.meta_mut().metadata = Some(metadata);
        self
    }
}

/// Flat wire representation of [`CommandResult`].
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResult {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<CommandError>,
    #[serde(flatten)]
    meta: TrustSignals,
}

impl From<WireResult> for CommandResult {
    fn from(wire: WireResult) -> Self {
        if wire.success {
            Self::Success {
                data: wire.data.unwrap_or(Value::Null),
                meta: wire.meta,
            }
        } else {
            Self::Failure {
                error: wire.error.unwrap_or_else(|| {
                    CommandError::new(
                        error_codes::COMMAND_FAILED,
                        "Command failed without an error payload",
                    )
                }),
                data: wire.data,
                meta: wire.meta,
            }
        }
    }
}

impl From<CommandResult> for WireResult {
    fn from(result: CommandResult) -> Self {
        match result {
            CommandResult::Success { data, meta } => Self {
                success: true,
                data: (!data.is_null()).then_some(data),
                error: None,
                meta,
            },
            CommandResult::Failure { error, data, meta } => Self {
                success: false,
                data,
                error: Some(error),
                meta,
            },
        }
    }
}
