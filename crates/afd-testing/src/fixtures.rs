//! Test fixtures.
//!
//! [`todo_registry`] builds a small in-memory todo application with two
//! commands:
//!
//! - `todo-create`: `{title: string, priority?: "low"|"medium"|"high"}`,
//!   returns the new todo with a generated id
//! - `todo-list`: `{completed?: boolean}`, returns every matching todo

use std::sync::{Arc, Mutex, PoisonError};

use afd_core::registry::{CommandDefinition, CommandParameter, ParamType, SimpleRegistry};
use afd_core::result::{CommandError, CommandResult};
use afd_core::types::Tool;
use serde_json::{Value, json};

/// Names of the todo fixture commands, in registration order.
pub const TODO_COMMANDS: [&str; 2] = ["todo-create", "todo-list"];

/// Definition of `todo-create`.
#[must_use]
pub fn todo_create_definition() -> CommandDefinition {
    CommandDefinition::new("todo-create", "Create a todo item")
        .with_parameter(
            CommandParameter::new("title", ParamType::String).with_description("What needs doing"),
        )
        .with_parameter(
            CommandParameter::new("priority", ParamType::String)
                .optional()
                .with_default(json!("medium"))
                .with_enum(vec![json!("low"), json!("medium"), json!("high")]),
        )
}

/// Definition of `todo-list`.
#[must_use]
pub fn todo_list_definition() -> CommandDefinition {
    CommandDefinition::new("todo-list", "List todo items").with_parameter(
        CommandParameter::new("completed", ParamType::Boolean)
            .optional()
            .with_description("Only todos with this completion state"),
    )
}

/// An in-memory todo application.
#[must_use]
pub fn todo_registry() -> SimpleRegistry {
    let store: Arc<Mutex<Vec<Value>>> = Arc::default();
    let create_store = Arc::clone(&store);
    let list_store = store;

    SimpleRegistry::new()
        .with_command(todo_create_definition(), move |input, _ctx| {
            let store = Arc::clone(&create_store);
            async move {
                let title = input.get("title").and_then(Value::as_str).unwrap_or_default().trim();
                if title.is_empty() {
                    return CommandResult::failure(CommandError::validation("Title cannot be empty"));
                }
                let todo = json!({
                    "id": format!("todo-{}", uuid::Uuid::new_v4().simple()),
                    "title": title,
                    "priority": input.get("priority").cloned().unwrap_or_else(|| json!("medium")),
                    "completed": false,
                });
                store
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(todo.clone());
                CommandResult::success(todo).with_confidence(1.0)
            }
        })
        .with_command(todo_list_definition(), move |input, _ctx| {
            let store = Arc::clone(&list_store);
            async move {
                let filter = input.get("completed").and_then(Value::as_bool);
                let todos: Vec<Value> = store
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .iter()
                    .filter(|todo| filter.is_none_or(|want| todo["completed"] == json!(want)))
                    .cloned()
                    .collect();
                CommandResult::success(json!({ "total": todos.len(), "todos": todos }))
            }
        })
}

/// The todo commands as tools.
#[must_use]
pub fn todo_tools() -> Vec<Tool> {
    vec![
        Tool::from(&todo_create_definition()),
        Tool::from(&todo_list_definition()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use afd_core::registry::{CommandContext, CommandRegistry};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_create_then_list() {
        let registry = todo_registry();
        let created = registry
            .execute("todo-create", json!({"title": "Buy milk"}), CommandContext::new())
            .await;
        let todo = created.data().unwrap();
        assert!(todo["id"].as_str().unwrap().starts_with("todo-"));
        assert_eq!(todo["priority"], json!("medium"));

        let listed = registry
            .execute("todo-list", json!({}), CommandContext::new())
            .await;
        assert_eq!(listed.data().unwrap()["total"], json!(1));

        let done = registry
            .execute("todo-list", json!({"completed": true}), CommandContext::new())
            .await;
        assert_eq!(done.data().unwrap()["total"], json!(0));
    }

    #[tokio::test]
    async fn test_blank_title_fails() {
        let result = todo_registry()
            .execute("todo-create", json!({"title": "  "}), CommandContext::new())
            .await;
        assert!(!result.is_success());
    }

    #[test]
    fn test_tools_match_commands() {
        let names: Vec<String> = todo_tools().into_iter().map(|t| t.name).collect();
        assert_eq!(names, TODO_COMMANDS);
    }
}
