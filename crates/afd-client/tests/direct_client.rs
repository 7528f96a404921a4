//! In-process client against the todo fixture.

use std::sync::Arc;
use std::time::Duration;

use afd_client::direct::{LoggingMiddleware, Middleware, Next};
use afd_client::{DirectCallOptions, DirectClient, DirectClientOptions};
use afd_core::batch::{BatchCommand, BatchOptions, BatchRequest};
use afd_core::pipeline::{PipelineCondition, PipelineOptions, PipelineRequest, PipelineStep, StepStatus};
use afd_core::registry::{CommandContext, CommandDefinition};
use afd_core::{CommandError, CommandResult, error_codes};
use afd_testing::{MockRegistry, Recorder, assert_failure_code, assert_success, todo_registry};
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

fn todo_client() -> DirectClient {
    DirectClient::new(Arc::new(todo_registry()))
}

// =============================================================================
// Calls
// =============================================================================

#[tokio::test]
async fn test_todo_create_then_list() {
    let client = todo_client();

    let created = client.call("todo-create", json!({"title": "Buy milk"})).await;
    let todo = assert_success(&created);
    assert!(todo["id"].as_str().unwrap().starts_with("todo-"));
    assert_eq!(created.meta().confidence, Some(1.0));

    let listed = client.call("todo-list", json!({})).await;
    assert_eq!(assert_success(&listed)["total"], json!(1));
}

#[tokio::test]
async fn test_typo_gets_did_you_mean_hint() {
    let result = todo_client().call("todo-lsit", json!({})).await;

    let error = assert_failure_code(&result, error_codes::UNKNOWN_TOOL);
    assert_eq!(error.suggestion.as_deref(), Some("Did you mean 'todo-list'?"));

    let data = result.data().unwrap();
    assert_eq!(data["available_tools"], json!(["todo-create", "todo-list"]));
    assert_eq!(data["suggestions"][0], json!("todo-list"));
}

#[tokio::test]
async fn test_unrelated_name_has_no_suggestions() {
    let result = todo_client().call("zzzzzz", json!({})).await;
    let error = assert_failure_code(&result, error_codes::UNKNOWN_TOOL);
    assert!(error.suggestion.is_none());
    assert_eq!(result.data().unwrap()["suggestions"], json!([]));
}

#[tokio::test]
async fn test_invalid_input_never_reaches_handler() {
    let registry = Arc::new(MockRegistry::wrap(todo_registry()));
    let client = DirectClient::new(registry.clone());

    let missing = client.call("todo-create", json!({})).await;
    let error = assert_failure_code(&missing, error_codes::VALIDATION_ERROR);
    assert!(error.message.contains("required parameter 'title' is missing"));

    let bad_enum = client
        .call("todo-create", json!({"title": "x", "priority": "urgent"}))
        .await;
    let error = assert_failure_code(&bad_enum, error_codes::VALIDATION_ERROR);
    assert!(error.message.contains("'priority' must be one of"));

    assert_eq!(registry.call_count(), 0);
}

#[tokio::test]
async fn test_trace_id_reaches_handler() {
    let registry = Arc::new(MockRegistry::wrap(todo_registry()));
    let client = DirectClient::with_options(registry.clone(), DirectClientOptions::new().with_source("agent"));

    client.call("todo-list", json!({})).await;
    client
        .call_with(
            "todo-list",
            json!({}),
            DirectCallOptions::new().with_trace_id("trace-mine"),
        )
        .await;

    let calls = registry.calls_to("todo-list");
    let generated = calls[0].context.trace_id.clone().unwrap();
    assert!(generated.starts_with("trace-"));
    assert_eq!(generated.len(), "trace-".len() + 12);
    assert_eq!(calls[1].context.trace_id.as_deref(), Some("trace-mine"));
    assert_eq!(calls[1].context.source.as_deref(), Some("agent"));
}

#[tokio::test(start_paused = true)]
async fn test_call_timeout() {
    let registry = MockRegistry::new().with_command(CommandDefinition::new("slow", "Sleeps"), |_input, _ctx| async {
        tokio::time::sleep(Duration::from_secs(60)).await;
        CommandResult::success(Value::Null)
    });
    let client = DirectClient::new(Arc::new(registry));

    let result = client
        .call_with("slow", json!({}), DirectCallOptions::new().with_timeout(Duration::from_secs(1)))
        .await;
    assert_failure_code(&result, error_codes::TIMEOUT);
}

// =============================================================================
// Middleware
// =============================================================================

struct Trace {
    label: &'static str,
    log: Recorder<String>,
}

#[async_trait]
impl Middleware for Trace {
    async fn handle(&self, name: &str, input: Value, context: CommandContext, next: Next<'_>) -> CommandResult {
        self.log.record(format!("{} before {name}", self.label));
        let result = next.run(name, input, context).await;
        self.log.record(format!("{} after {name}", self.label));
        result
    }
}

struct Deny;

#[async_trait]
impl Middleware for Deny {
    async fn handle(&self, name: &str, _input: Value, _context: CommandContext, _next: Next<'_>) -> CommandResult {
        CommandResult::failure(CommandError::new("FORBIDDEN", format!("'{name}' is not allowed")))
    }
}

#[tokio::test]
async fn test_middleware_wraps_in_configured_order() {
    let log = Recorder::new();
    let options = DirectClientOptions::new()
        .with_middleware(LoggingMiddleware::default())
        .with_middleware(Trace { label: "outer", log: log.clone() })
        .with_middleware(Trace { label: "inner", log: log.clone() });
    let client = DirectClient::with_options(Arc::new(todo_registry()), options);

    let result = client.call("todo-list", json!({})).await;
    assert!(result.is_success());
    assert_eq!(
        log.values(),
        vec![
            "outer before todo-list",
            "inner before todo-list",
            "inner after todo-list",
            "outer after todo-list",
        ]
    );
}

#[tokio::test]
async fn test_middleware_can_short_circuit() {
    let registry = Arc::new(MockRegistry::wrap(todo_registry()));
    let client = DirectClient::with_options(registry.clone(), DirectClientOptions::new().with_middleware(Deny));

    let result = client.call("todo-create", json!({"title": "x"})).await;
    assert_failure_code(&result, "FORBIDDEN");
    assert_eq!(registry.call_count(), 0);
}

// =============================================================================
// Pipelines
// =============================================================================

#[tokio::test]
async fn test_pipeline_threads_previous_output() {
    let client = todo_client();
    let request = PipelineRequest {
        steps: vec![
            PipelineStep::new("todo-create")
                .with_input(json!({"title": "$input.title", "priority": "high"}))
                .with_alias("created"),
            PipelineStep::new("todo-list")
                .with_when(PipelineCondition::Eq("$prev.priority".into(), json!("high"))),
            PipelineStep::new("todo-list")
                .with_input(json!({"completed": true}))
                .with_when(PipelineCondition::Exists("$created.missing".into())),
        ],
        options: PipelineOptions::default(),
    };

    let result = client.pipe_with_input(request, json!({"title": "Ship it"})).await;

    assert_eq!(
        result.statuses(),
        vec![StepStatus::Success, StepStatus::Success, StepStatus::Skipped]
    );
    assert_eq!(result.data["total"], json!(1));
    assert_eq!(result.data["todos"][0]["title"], json!("Ship it"));
    assert_eq!(result.metadata.completed_steps, 2);
}

#[tokio::test]
async fn test_pipeline_stops_on_failure() {
    let client = todo_client();
    let request = PipelineRequest {
        steps: vec![
            PipelineStep::new("todo-create").with_input(json!({"title": ""})),
            PipelineStep::new("todo-list"),
        ],
        options: PipelineOptions::default(),
    };

    let result = client.pipe(request).await;
    assert_eq!(result.statuses(), vec![StepStatus::Failure, StepStatus::Skipped]);
    assert!(!result.all_succeeded());
    assert_eq!(result.data, Value::Null);
}

#[tokio::test]
async fn test_pipeline_continue_on_failure() {
    let client = todo_client();
    let request = PipelineRequest {
        steps: vec![
            PipelineStep::new("todo-lsit"),
            PipelineStep::new("todo-list"),
        ],
        options: PipelineOptions::default().continue_on_failure(),
    };

    let result = client.pipe(request).await;
    assert_eq!(result.statuses(), vec![StepStatus::Failure, StepStatus::Success]);
    assert_eq!(
        result.steps[0].error.as_ref().unwrap().code,
        error_codes::UNKNOWN_TOOL
    );
}

// =============================================================================
// Batches
// =============================================================================

#[tokio::test]
async fn test_batch_of_creates_skips_invalid_input() {
    let registry = Arc::new(MockRegistry::wrap(todo_registry()));
    let client = DirectClient::new(registry.clone());

    let result = client
        .batch(
            BatchRequest::new(vec![
                BatchCommand::new("milk", "todo-create", json!({"title": "Milk"})),
                BatchCommand::new("bad", "todo-create", json!({})),
                BatchCommand::new("eggs", "todo-create", json!({"title": "Eggs"})),
            ])
            .with_options(BatchOptions::default().continue_on_error()),
        )
        .await;

    assert!(!result.success);
    assert_eq!((result.summary.succeeded, result.summary.failed), (2, 1));
    let bad = result.get("bad").unwrap().result.as_ref().unwrap();
    assert_failure_code(bad, error_codes::VALIDATION_ERROR);
    assert_eq!(registry.call_count(), 2);

    let listed = client.call("todo-list", json!({})).await;
    assert_eq!(assert_success(&listed)["total"], json!(2));
}
