//! "Did you mean" diagnostics for unknown command names.
//!
//! When a caller names a command that does not exist, the runtime answers
//! with an [`UnknownCommandDiagnostic`] instead of an opaque error so an
//! automated caller can correct itself.

use serde::{Deserialize, Serialize};

use crate::result::{CommandError, CommandResult, error_codes};

/// Minimum similarity for a name to be suggested.
pub const SUGGESTION_THRESHOLD: f64 = 0.4;

/// Maximum number of suggestions returned.
pub const MAX_SUGGESTIONS: usize = 3;

/// Diagnostic produced for an unknown command name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnknownCommandDiagnostic {
    /// Always `"UNKNOWN_TOOL"`.
    pub error: String,
    /// Human-readable message.
    pub message: String,
    /// The name the caller asked for.
    pub requested_tool: String,
    /// Every name the registry knows.
    pub available_tools: Vec<String>,
    /// Up to three close matches, best first.
    pub suggestions: Vec<String>,
    /// `Did you mean '<best>'?` when a suggestion exists.
    pub hint: Option<String>,
}

impl UnknownCommandDiagnostic {
    /// Build the diagnostic for `requested` against the available names.
    #[must_use]
    pub fn new(requested: &str, available: Vec<String>) -> Self {
        let suggestions = find_similar(requested, &available);
        let hint = suggestions
            .first()
            .map(|best| format!("Did you mean '{best}'?"));
        Self {
            error: error_codes::UNKNOWN_TOOL.to_string(),
            message: format!("Tool '{requested}' not found in registry"),
            requested_tool: requested.to_string(),
            available_tools: available,
            suggestions,
            hint,
        }
    }

    /// The failed envelope carrying this diagnostic as its data.
    #[must_use]
    pub fn into_result(self) -> CommandResult {
        let error = CommandError::unknown_tool(self.message.clone());
        let error = match &self.hint {
            Some(hint) => error.with_suggestion(hint.clone()),
            None => error,
        };
        // Serializing a struct of strings cannot fail.
        let data = serde_json::to_value(&self).unwrap_or(serde_json::Value::Null);
        CommandResult::failure_with_data(error, data)
    }
}

/// Case-insensitive normalized Levenshtein similarity in `0.0..=1.0`.
///
/// Identical strings (including two empty strings) score 1.0.
#[must_use]
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    if a == b {
        return 1.0;
    }
    let max_len = a.len().max(b.len());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein(&a, &b) as f64 / max_len as f64
}

fn levenshtein(a: &[char], b: &[char]) -> usize {
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Names scoring at least [`SUGGESTION_THRESHOLD`], best first, at most
/// [`MAX_SUGGESTIONS`]. Ties keep registry order.
#[must_use]
pub fn find_similar(requested: &str, available: &[String]) -> Vec<String> {
    let mut scored: Vec<(f64, &String)> = available
        .iter()
        .map(|name| (similarity(requested, name), name))
        .filter(|(score, _)| *score >= SUGGESTION_THRESHOLD)
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .map(|(_, name)| name.clone())
        .collect()
}
