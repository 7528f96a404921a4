//! Pipeline execution.

use std::time::Duration;

use afd_core::pipeline::{
    PipelineContext, PipelineRequest, PipelineResult, PipelineStep, StepResult, StepStatus,
    evaluate_condition, resolve_variables,
};
use afd_core::result::{CommandError, CommandResult};
use serde_json::Value;
use tokio::time::Instant;
use tracing::debug;

use super::DirectClient;

impl DirectClient {
    /// Run a pipeline.
    ///
    /// Steps run one at a time, in order. A step whose `when` condition is
    /// false is skipped. A failed step stops the pipeline unless the step or
    /// the pipeline continues on failure; the steps left over are recorded
    /// as skipped. When a `timeout_ms` budget is set it is checked before
    /// each step, and steps left when it runs out are skipped with a
    /// `TIMEOUT` error.
    pub async fn pipe(&self, request: PipelineRequest) -> PipelineResult {
        self.run_pipeline(request, None).await
    }

    /// Run a pipeline whose steps may reference `input` as `$input`.
    pub async fn pipe_with_input(&self, request: PipelineRequest, input: Value) -> PipelineResult {
        self.run_pipeline(request, Some(input)).await
    }

    async fn run_pipeline(&self, request: PipelineRequest, input: Option<Value>) -> PipelineResult {
        let PipelineRequest { steps, options } = request;
        let started = Instant::now();
        let budget = options.timeout_ms.map(Duration::from_millis);
        let pipeline_continues = options.continue_on_failure.unwrap_or(false);
        let mut context = PipelineContext::new(input);

        let mut index = 0;
        while index < steps.len() {
            let step = &steps[index];

            if let Some(budget) = budget {
                if started.elapsed() >= budget {
                    debug!(step = index, budget_ms = budget.as_millis() as u64, "Pipeline out of time");
                    let error = CommandError::timeout("pipeline", budget.as_millis() as u64);
                    for (rest, step) in steps.iter().enumerate().skip(index) {
                        let mut skipped = StepResult::skipped(rest, step);
                        skipped.error = Some(error.clone());
                        context.push(skipped);
                    }
                    break;
                }
            }

            if let Some(condition) = &step.when {
                if !evaluate_condition(condition, &context) {
                    debug!(step = index, command = %step.command, "Condition false, skipping step");
                    context.push(StepResult::skipped(index, step));
                    index += 1;
                    continue;
                }
            }

            let record = self.run_step(index, step, &context).await;
            let failed = record.status == StepStatus::Failure;
            context.push(record);
            index += 1;

            if failed && !step.continue_on_failure.unwrap_or(pipeline_continues) {
                debug!(step = index - 1, command = %step.command, "Step failed, stopping pipeline");
                for (rest, step) in steps.iter().enumerate().skip(index) {
                    context.push(StepResult::skipped(rest, step));
                }
                break;
            }
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        PipelineResult::from_steps(context.steps, elapsed_ms)
    }

    async fn run_step(&self, index: usize, step: &PipelineStep, context: &PipelineContext) -> StepResult {
        let input = step
            .input
            .as_ref()
            .map_or_else(|| Value::Object(serde_json::Map::new()), |input| resolve_variables(input, context));

        let started = Instant::now();
        let result = self.call(&step.command, input).await;
        let execution_time_ms = started.elapsed().as_millis() as u64;

        let mut record = StepResult::skipped(index, step);
        record.execution_time_ms = execution_time_ms;
        match result {
            CommandResult::Success { data, meta } => {
                record.status = StepStatus::Success;
                record.data = Some(data);
                record.metadata = (!meta.is_empty()).then_some(meta);
            }
            CommandResult::Failure { error, .. } => {
                record.status = StepStatus::Failure;
                record.error = Some(error);
            }
        }
        record
    }
}
