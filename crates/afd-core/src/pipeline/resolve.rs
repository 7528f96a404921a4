//! Variable resolution and condition evaluation.
//!
//! References start with `$`:
//!
//! | Reference | Resolves to |
//! |---|---|
//! | `$input` | the pipeline input |
//! | `$prev` | data of the most recent step that ran |
//! | `$first` | data of the first step |
//! | `$steps[n]` | data of step `n` |
//! | `$steps.alias` | data of the step with that alias |
//! | `$alias` | same as `$steps.alias` |
//!
//! Each may be followed by a path such as `.user.tags[0]`. Steps that were
//! skipped have no data, so references to them resolve to nothing.

use serde_json::Value;

use super::{PipelineCondition, StepResult, StepStatus};

/// Accumulated state visible to step inputs and conditions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineContext {
    /// The input the pipeline was started with.
    pub input: Option<Value>,
    /// Steps recorded so far, in order.
    pub steps: Vec<StepResult>,
    /// Index into `steps` of the last step that ran. Skipped steps leave it
    /// where it was.
    previous: Option<usize>,
}

impl PipelineContext {
    /// A context for a pipeline started with `input`.
    #[must_use]
    pub fn new(input: Option<Value>) -> Self {
        Self {
            input,
            steps: Vec::new(),
            previous: None,
        }
    }

    /// Record a finished (or skipped) step.
    pub fn push(&mut self, step: StepResult) {
        if step.status != StepStatus::Skipped {
            self.previous = Some(self.steps.len());
        }
        self.steps.push(step);
    }

    /// The most recent step that ran, ignoring skipped ones.
    #[must_use]
    pub fn previous(&self) -> Option<&StepResult> {
        self.steps.get(self.previous?)
    }

    fn by_alias(&self, alias: &str) -> Option<&StepResult> {
        self.steps
            .iter()
            .rev()
            .find(|s| s.alias.as_deref() == Some(alias))
    }
}

/// Resolve a single reference. Strings without a leading `$` resolve to
/// themselves.
#[must_use]
pub fn resolve_variable(reference: &str, context: &PipelineContext) -> Option<Value> {
    let Some(body) = reference.strip_prefix('$') else {
        return Some(Value::String(reference.to_string()));
    };

    if let Some(rest) = body.strip_prefix("steps[") {
        let close = rest.find(']')?;
        let index: usize = rest[..close].parse().ok()?;
        let data = context.steps.get(index)?.data.as_ref()?;
        return follow(data, &rest[close + 1..]);
    }

    let (head, tail) = split_head(body);
    match head {
        "input" => follow(context.input.as_ref()?, tail),
        "prev" => follow(context.previous()?.data.as_ref()?, tail),
        "first" => follow(context.steps.first()?.data.as_ref()?, tail),
        "steps" => {
            let (alias, tail) = split_head(tail.strip_prefix('.')?);
            follow(context.by_alias(alias)?.data.as_ref()?, tail)
        }
        alias => follow(context.by_alias(alias)?.data.as_ref()?, tail),
    }
}

/// Split `name.rest` or `name[0].rest` into the leading name and the
/// remainder (which keeps its `.` or `[`).
fn split_head(s: &str) -> (&str, &str) {
    let end = s.find(['.', '[']).unwrap_or(s.len());
    s.split_at(end)
}

fn follow(value: &Value, tail: &str) -> Option<Value> {
    if tail.is_empty() {
        return Some(value.clone());
    }
    get_nested_value(value, tail.strip_prefix('.').unwrap_or(tail))
}

/// Walk a dotted path with optional array indices (`user.tags[0]`).
#[must_use]
pub fn get_nested_value(value: &Value, path: &str) -> Option<Value> {
    let mut current = value;
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        let (key, mut indices) = split_head(segment);
        if !key.is_empty() {
            current = current.get(key)?;
        }
        while let Some(rest) = indices.strip_prefix('[') {
            let close = rest.find(']')?;
            let index: usize = rest[..close].parse().ok()?;
            current = current.get(index)?;
            indices = &rest[close + 1..];
        }
        if !indices.is_empty() {
            return None;
        }
    }
    Some(current.clone())
}

/// Resolve every `$` reference inside `input`, recursing through arrays and
/// objects. Unresolvable references become `null`.
#[must_use]
pub fn resolve_variables(input: &Value, context: &PipelineContext) -> Value {
    match input {
        Value::String(s) if s.starts_with('$') => {
            resolve_variable(s, context).unwrap_or(Value::Null)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| resolve_variables(item, context))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_variables(v, context)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Evaluate a step condition against the context.
#[must_use]
pub fn evaluate_condition(condition: &PipelineCondition, context: &PipelineContext) -> bool {
    let number = |reference: &str| resolve_variable(reference, context).and_then(|v| v.as_f64());
    match condition {
        PipelineCondition::Exists(reference) => {
            resolve_variable(reference, context).is_some_and(|v| !v.is_null())
        }
        PipelineCondition::Eq(reference, expected) => {
            resolve_variable(reference, context).as_ref() == Some(expected)
        }
        PipelineCondition::Ne(reference, expected) => {
            resolve_variable(reference, context).as_ref() != Some(expected)
        }
        PipelineCondition::Gt(reference, threshold) => number(reference).is_some_and(|n| n > *threshold),
        PipelineCondition::Gte(reference, threshold) => {
            number(reference).is_some_and(|n| n >= *threshold)
        }
        PipelineCondition::Lt(reference, threshold) => number(reference).is_some_and(|n| n < *threshold),
        PipelineCondition::Lte(reference, threshold) => {
            number(reference).is_some_and(|n| n <= *threshold)
        }
        PipelineCondition::And(all) => all.iter().all(|c| evaluate_condition(c, context)),
        PipelineCondition::Or(any) => any.iter().any(|c| evaluate_condition(c, context)),
        PipelineCondition::Not(inner) => !evaluate_condition(inner, context),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn step(index: usize, alias: Option<&str>, data: Option<Value>) -> StepResult {
        StepResult {
            index,
            alias: alias.map(String::from),
            command: format!("cmd-{index}"),
            status: if data.is_some() {
                StepStatus::Success
            } else {
                StepStatus::Skipped
            },
            data,
            error: None,
            execution_time_ms: 0,
            metadata: None,
        }
    }

    fn context() -> PipelineContext {
        let mut ctx = PipelineContext::new(Some(json!({"userId": 7})));
        ctx.push(step(
            0,
            Some("user"),
            Some(json!({"email": "a@example.com", "tags": ["x", "y"], "age": 30})),
        ));
        ctx.push(step(1, None, Some(json!({"items": [{"id": 1}, {"id": 2}]}))));
        ctx
    }

    #[test]
    fn test_reserved_references() {
        let ctx = context();
        assert_eq!(resolve_variable("$input.userId", &ctx), Some(json!(7)));
        assert_eq!(resolve_variable("$prev.items[1].id", &ctx), Some(json!(2)));
        assert_eq!(resolve_variable("$first.email", &ctx), Some(json!("a@example.com")));
        assert_eq!(resolve_variable("$steps[0].tags[1]", &ctx), Some(json!("y")));
        assert_eq!(resolve_variable("$steps.user.age", &ctx), Some(json!(30)));
        assert_eq!(resolve_variable("$steps[5]", &ctx), None);
    }

    #[test]
    fn test_bare_alias() {
        let ctx = context();
        assert_eq!(resolve_variable("$user.email", &ctx), Some(json!("a@example.com")));
        assert_eq!(resolve_variable("$nobody", &ctx), None);
    }

    #[test]
    fn test_literal_passes_through() {
        assert_eq!(
            resolve_variable("plain", &PipelineContext::default()),
            Some(json!("plain"))
        );
    }

    #[test]
    fn test_skipped_step_resolves_to_nothing() {
        let mut ctx = context();
        ctx.push(step(2, Some("maybe"), None));
        assert_eq!(resolve_variable("$maybe.id", &ctx), None);
        assert_eq!(resolve_variable("$steps[2]", &ctx), None);
    }

    #[test]
    fn test_prev_skips_over_skipped_steps() {
        let mut ctx = context();
        ctx.push(step(2, Some("maybe"), None));
        assert_eq!(resolve_variable("$prev.items[1].id", &ctx), Some(json!(2)));
        assert_eq!(ctx.previous().map(|s| s.index), Some(1));

        let mut only_skipped = PipelineContext::default();
        only_skipped.push(step(0, None, None));
        assert_eq!(resolve_variable("$prev", &only_skipped), None);
    }

    #[test]
    fn test_resolve_variables_recurses() {
        let ctx = context();
        let input = json!({"to": "$user.email", "ids": ["$prev.items[0].id", 3], "missing": "$nope"});
        assert_eq!(
            resolve_variables(&input, &ctx),
            json!({"to": "a@example.com", "ids": [1, 3], "missing": null})
        );
    }

    #[test]
    fn test_nested_value_paths() {
        let value = json!({"a": {"b": [[1, 2], [3]]}});
        assert_eq!(get_nested_value(&value, "a.b[1][0]"), Some(json!(3)));
        assert_eq!(get_nested_value(&value, "a.c"), None);
        assert_eq!(get_nested_value(&value, "a.b[x]"), None);
    }

    #[test]
    fn test_conditions() {
        let ctx = context();
        assert!(evaluate_condition(&PipelineCondition::Exists("$user.email".into()), &ctx));
        assert!(!evaluate_condition(&PipelineCondition::Exists("$user.phone".into()), &ctx));
        assert!(evaluate_condition(&PipelineCondition::Gte("$user.age".into(), 18.0), &ctx));
        assert!(!evaluate_condition(&PipelineCondition::Lt("$user.email".into(), 1.0), &ctx));
        assert!(evaluate_condition(
            &PipelineCondition::And(vec![
                PipelineCondition::Eq("$input.userId".into(), json!(7)),
                PipelineCondition::Not(Box::new(PipelineCondition::Ne(
                    "$first.age".into(),
                    json!(30)
                ))),
            ]),
            &ctx
        ));
        assert!(evaluate_condition(
            &PipelineCondition::Or(vec![
                PipelineCondition::Gt("$user.age".into(), 100.0),
                PipelineCondition::Exists("$prev.items".into()),
            ]),
            &ctx
        ));
    }
}
