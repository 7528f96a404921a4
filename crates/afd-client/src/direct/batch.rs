//! Batch execution.

use std::collections::HashMap;
use std::time::Duration;

use afd_core::batch::{BatchCommand, BatchCommandResult, BatchRequest, BatchResult, BatchTiming};
use afd_core::result::{CommandError, error_codes};
use futures::future::join_all;
use serde_json::Value;
use tokio::time::Instant;
use tracing::debug;

use super::{DirectCallOptions, DirectClient};

impl DirectClient {
    /// Run a batch of independent commands.
    ///
    /// Each command goes through [`call_with`](Self::call_with), so unknown
    /// names and invalid input fail that command only. Commands run in
    /// request order, in groups of `max_concurrency` (one at a time by
    /// default). After a group with a failure the batch stops unless
    /// `continue_on_error` is set; it also stops once `max_failures` is
    /// reached. The `timeout_ms` budget is checked before each group.
    /// Commands left when the batch stops are recorded as skipped.
    pub async fn batch(&self, request: BatchRequest) -> BatchResult {
        let BatchRequest {
            commands,
            options,
            context,
        } = request;
        let timing = BatchTiming::start();
        let started = Instant::now();

        if commands.is_empty() {
            return BatchResult::rejected(CommandError::validation("Batch contains no commands"), timing);
        }

        let budget = options.timeout_ms.map(Duration::from_millis);
        let extra = context.unwrap_or_default();
        let mut results = Vec::with_capacity(commands.len());
        let mut failures = 0;
        let mut stopped = None;

        for group in commands.chunks(options.group_size()) {
            if stopped.is_some() {
                results.extend(group.iter().map(BatchCommandResult::skipped));
                continue;
            }

            if let Some(budget) = budget {
                if started.elapsed() >= budget {
                    debug!(done = results.len(), budget_ms = budget.as_millis() as u64, "Batch out of time");
                    stopped = Some(CommandError::timeout("batch", budget.as_millis() as u64));
                    results.extend(group.iter().map(BatchCommandResult::skipped));
                    continue;
                }
            }

            let ran = join_all(group.iter().map(|command| self.run_batch_command(command, &extra))).await;
            failures += ran.iter().filter(|r| !r.is_success()).count();
            results.extend(ran);

            let limit_reached = options.max_failures.is_some_and(|max| failures >= max);
            if failures > 0 && (!options.continue_on_error || limit_reached) {
                debug!(failures, "Batch stopping after failure");
                stopped = Some(CommandError::new(
                    error_codes::COMMAND_FAILED,
                    format!("Batch stopped after {failures} failed command(s)"),
                ));
            }
        }

        let total_ms = started.elapsed().as_millis() as u64;
        let result = BatchResult::from_results(results, timing.finish(total_ms, commands.len()), stopped);
        if self.options.debug {
            debug!(
                total = result.summary.total,
                succeeded = result.summary.succeeded,
                failed = result.summary.failed,
                skipped = result.summary.skipped,
                elapsed_ms = total_ms,
                "Batch completed"
            );
        }
        result
    }

    async fn run_batch_command(
        &self,
        command: &BatchCommand,
        extra: &HashMap<String, Value>,
    ) -> BatchCommandResult {
        let mut options = DirectCallOptions::new();
        options.extra.clone_from(extra);

        let started = Instant::now();
        let result = self.call_with(&command.command, command.input.clone(), options).await;
        BatchCommandResult::completed(command, result, started.elapsed().as_millis() as u64)
    }
}

#[cfg(test)]
mod tests {
    use crate::direct::DirectClient;
    use afd_core::batch::{BatchCommand, BatchOptions, BatchRequest};
    use afd_core::registry::{CommandDefinition, SimpleRegistry};
    use afd_core::result::{CommandError, CommandResult, error_codes};
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::time::Duration;

    fn client() -> DirectClient {
        let registry = SimpleRegistry::new()
            .with_command(CommandDefinition::new("echo", "Echo"), |input, _ctx| async move {
                CommandResult::success(input).with_confidence(0.8)
            })
            .with_command(CommandDefinition::new("tenant", "Context value"), |_input, ctx| async move {
                CommandResult::success(ctx.extra.get("tenant").cloned().unwrap_or(Value::Null))
            })
            .with_command(CommandDefinition::new("fail", "Always fails"), |_input, _ctx| async {
                CommandResult::failure(CommandError::internal("boom"))
            })
            .with_command(CommandDefinition::new("slow", "Sleeps"), |_input, _ctx| async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                CommandResult::success(Value::Null)
            });
        DirectClient::new(Arc::new(registry))
    }

    fn command(id: &str, name: &str) -> BatchCommand {
        BatchCommand::new(id, name, json!({"id": id}))
    }

    #[tokio::test]
    async fn test_every_command_gets_its_own_result() {
        let result = client()
            .batch(BatchRequest::new(vec![command("a", "echo"), command("b", "echo")]))
            .await;

        assert!(result.success);
        assert_eq!(result.summary.total, 2);
        assert_eq!(result.summary.average_confidence, Some(0.8));
        assert_eq!(result.get("b").unwrap().result.as_ref().unwrap().data(), Some(&json!({"id": "b"})));
        assert!(result.timing.ended_at.is_some());
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_failure_stops_by_default() {
        let result = client()
            .batch(BatchRequest::new(vec![
                command("a", "echo"),
                command("b", "fail"),
                command("c", "echo"),
            ]))
            .await;

        assert!(!result.success);
        assert_eq!(
            (result.summary.succeeded, result.summary.failed, result.summary.skipped),
            (1, 1, 1)
        );
        assert!(result.get("c").unwrap().is_skipped());
        assert_eq!(result.error.as_ref().unwrap().code, error_codes::COMMAND_FAILED);
    }

    #[tokio::test]
    async fn test_continue_on_error_runs_everything() {
        let result = client()
            .batch(
                BatchRequest::new(vec![command("a", "fail"), command("b", "ech"), command("c", "echo")])
                    .with_options(BatchOptions::default().continue_on_error()),
            )
            .await;

        assert_eq!(result.summary.failed, 2);
        assert_eq!(result.summary.succeeded, 1);
        assert!((result.summary.success_rate() - 1.0 / 3.0).abs() < 1e-9);
        let typo = result.get("b").unwrap().result.as_ref().unwrap();
        assert_eq!(typo.error().unwrap().code, error_codes::UNKNOWN_TOOL);
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_max_failures_stops_continuing_batch() {
        let result = client()
            .batch(
                BatchRequest::new(vec![
                    command("a", "fail"),
                    command("b", "fail"),
                    command("c", "echo"),
                ])
                .with_options(BatchOptions::default().continue_on_error().with_max_failures(2)),
            )
            .await;

        assert_eq!(result.summary.failed, 2);
        assert!(result.get("c").unwrap().is_skipped());
    }

    #[tokio::test]
    async fn test_context_reaches_every_command() {
        let result = client()
            .batch(
                BatchRequest::new(vec![command("a", "tenant"), command("b", "tenant")])
                    .with_context("tenant", json!("acme")),
            )
            .await;

        for entry in &result.results {
            assert_eq!(entry.result.as_ref().unwrap().data(), Some(&json!("acme")));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_groups_and_budget() {
        let result = client()
            .batch(
                BatchRequest::new(vec![
                    command("a", "slow"),
                    command("b", "slow"),
                    command("c", "slow"),
                ])
                .with_options(BatchOptions::default().with_max_concurrency(2).with_timeout_ms(150)),
            )
            .await;

        // The first group of two sleeps together, so only 100ms pass before
        // the budget check for the second group.
        assert_eq!(result.summary.succeeded, 3);
        assert!(result.success);

        let result = client()
            .batch(
                BatchRequest::new(vec![command("a", "slow"), command("b", "slow")])
                    .with_options(BatchOptions::default().with_timeout_ms(50)),
            )
            .await;
        assert!(result.get("b").unwrap().is_skipped());
        assert_eq!(result.error.as_ref().unwrap().code, error_codes::TIMEOUT);
    }

    #[tokio::test]
    async fn test_empty_batch_is_rejected() {
        let result = client().batch(BatchRequest::new(Vec::new())).await;
        assert!(!result.success);
        assert_eq!(result.error.unwrap().code, error_codes::VALIDATION_ERROR);
    }
}
