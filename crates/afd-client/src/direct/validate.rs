//! Input validation against declared parameters.

use afd_core::registry::{CommandDefinition, CommandParameter, ParamType};
use serde_json::Value;

/// Check `input` against the parameters of `definition`.
///
/// Returns every issue found, in parameter order. `null` input counts as an
/// empty object.
pub fn validate_input(definition: &CommandDefinition, input: &Value) -> Vec<String> {
    let empty = serde_json::Map::new();
    let fields = match input {
        Value::Object(fields) => fields,
        Value::Null => &empty,
        other => {
            return vec![format!(
                "input must be an object, got {}",
                ParamType::of(other)
            )];
        }
    };

    let mut issues = Vec::new();
    for parameter in &definition.parameters {
        match fields.get(&parameter.name) {
            None if parameter.required => {
                issues.push(format!("required parameter '{}' is missing", parameter.name));
            }
            None => {}
            Some(value) => check_value(parameter, value, &mut issues),
        }
    }
    issues
}

fn check_value(parameter: &CommandParameter, value: &Value, issues: &mut Vec<String>) {
    let actual = ParamType::of(value);
    if actual != parameter.param_type {
        issues.push(format!(
            "'{}' must be {} {}, got {actual}",
            parameter.name,
            article(parameter.param_type),
            parameter.param_type
        ));
    }

    if let Some(allowed) = &parameter.enum_values {
        if !allowed.contains(value) {
            let listed: Vec<String> = allowed.iter().map(Value::to_string).collect();
            issues.push(format!(
                "'{}' must be one of: {}",
                parameter.name,
                listed.join(", ")
            ));
        }
    }
}

const fn article(param_type: ParamType) -> &'static str {
    match param_type {
        ParamType::Object | ParamType::Array => "an",
        _ => "a",
    }
}
