use std::{any::Any, collections::HashMap, panic::AssertUnwindSafe, sync::Arc};

use futures::FutureExt;
use serde_json::Value;
use tokio::time::Instant;

use super::{FailureStrategy, Scenario, ScenarioResult, ScenarioStep, StepResult};
use crate::{
    extract::ExtractPath,
    http::{DetailedRequestResult, DetailedResponse, DetailedTransport, ErrorType, RequestSpec},
    progress::{Noop, StepCallback},
    variable::{VariableContext, VariableResolver},
};

/// Runs one iteration of a scenario.
///
/// Steps run strictly in order; each one is resolved against the iteration's
/// own [`VariableContext`], sent, classified, and its extractions stored for
/// the steps after it. A step fails on a transport failure, a non-2xx status,
/// its timeout, or a panic inside the transport; what happens next is decided
/// by the scenario's [`FailureStrategy`].
///
/// Nothing escapes a step: every failure ends up as a [`StepResult`].
pub struct ScenarioExecutor<T: DetailedTransport> {
    transport: Arc<T>,
    resolver: VariableResolver,
}

impl<T: DetailedTransport> ScenarioExecutor<T> {
    pub fn new(transport: T) -> Self {
        Self::from_shared(Arc::new(transport))
    }

    pub fn from_shared(transport: Arc<T>) -> Self {
        Self {
            transport,
            resolver: VariableResolver::new(),
        }
    }

    pub async fn execute(&self, scenario: &Scenario) -> ScenarioResult {
        self.execute_with(scenario, &Noop).await
    }

    /// Runs the iteration, reporting every step result that lands in the
    /// result list to `on_step`.
    pub async fn execute_with<C>(&self, scenario: &Scenario, on_step: &C) -> ScenarioResult
    where
        C: StepCallback + ?Sized,
    {
        let started = Instant::now();
        let mut context = VariableContext::new();
        let mut results = Vec::with_capacity(scenario.step_count());

        for step in &scenario.steps {
            let result = self.run_step(step, &mut context).await;
            on_step.on_step_complete(&step.id, &result);
            let error = (!result.success).then(|| result.error.clone().unwrap_or_default());
            results.push(result);

            let Some(error) = error else { continue };
            match scenario.failure_strategy {
                FailureStrategy::Skip => {
                    tracing::debug!("Step {} failed, skipping: {error}", step.id);
                }
                FailureStrategy::Stop => {
                    return ScenarioResult::failure(
                        &scenario.name,
                        elapsed_ms(started),
                        results,
                        scenario.step_count(),
                        &step.id,
                        error,
                    );
                }
                FailureStrategy::Retry => match self.retry_step(scenario, step, &mut context).await {
                    Some(retried) => {
                        on_step.on_step_complete(&step.id, &retried);
                        if let Some(last) = results.last_mut() {
                            *last = retried;
                        }
                    }
                    None => {
                        return ScenarioResult::failure(
                            &scenario.name,
                            elapsed_ms(started),
                            results,
                            scenario.step_count(),
                            &step.id,
                            format!("Retry exhausted: {error}"),
                        );
                    }
                },
            }
        }

        ScenarioResult::success(&scenario.name, elapsed_ms(started), results)
    }

    /// Re-runs `step` up to `retry_count` times, sleeping before each attempt.
    /// Returns the first successful attempt.
    async fn retry_step(
        &self,
        scenario: &Scenario,
        step: &ScenarioStep,
        context: &mut VariableContext,
    ) -> Option<StepResult> {
        for attempt in 1..=scenario.retry_count {
            tokio::time::sleep(scenario.retry_delay()).await;
            let result = self.run_step(step, context).await;
            if result.success {
                return Some(result);
            }
            tracing::debug!(
                "Retry {attempt}/{} of step {} failed: {}",
                scenario.retry_count,
                step.id,
                result.error.as_deref().unwrap_or_default()
            );
        }
        None
    }

    async fn run_step(&self, step: &ScenarioStep, context: &mut VariableContext) -> StepResult {
        let started = Instant::now();
        let request = RequestSpec::new(
            self.resolver.resolve(&step.url, context),
            step.method,
            self.resolver.resolve_headers(&step.headers, context),
            step.body
                .as_deref()
                .map(|body| self.resolver.resolve(body, context).into_owned()),
        );

        let sent = AssertUnwindSafe(self.transport.send_detailed(&request)).catch_unwind();
        let outcome = match tokio::time::timeout(step.timeout(), sent).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(panic)) => {
                return StepResult::failure(
                    &step.id,
                    step.display_name(),
                    None,
                    elapsed_ms(started),
                    format!("panic: {}", panic_message(panic.as_ref())),
                );
            }
            Err(_) => {
                return StepResult::failure(
                    &step.id,
                    step.display_name(),
                    None,
                    elapsed_ms(started),
                    format!("{}: step timed out after {}ms", ErrorType::Timeout, step.timeout().as_millis()),
                );
            }
        };

        match outcome {
            DetailedRequestResult::Success(response) if !response.is_http_success() => {
                StepResult::failure(
                    &step.id,
                    step.display_name(),
                    Some(response.status_code),
                    response.latency_ms,
                    format!("HTTP {}", response.status_code),
                )
            }
            DetailedRequestResult::Success(response) => {
                let extracted = extract_all(&response, &step.extract);
                for (name, value) in &extracted {
                    context.put(&step.id, name, value.clone());
                }
                StepResult::success(
                    &step.id,
                    step.display_name(),
                    response.status_code,
                    response.latency_ms,
                    extracted,
                )
            }
            DetailedRequestResult::Failure {
                error_message,
                error_type,
                latency_ms,
            } => StepResult::failure(
                &step.id,
                step.display_name(),
                None,
                latency_ms,
                format!("{error_type}: {error_message}"),
            ),
        }
    }
}

/// Runs every declared extraction; paths that yield nothing are left out.
fn extract_all(response: &DetailedResponse, paths: &HashMap<String, String>) -> HashMap<String, Value> {
    paths
        .iter()
        .filter_map(|(name, path)| {
            let value = ExtractPath::parse(path).extract(response);
            if value.is_none() {
                tracing::debug!("Extraction {name} = {path} produced no value");
            }
            Some((name.clone(), value?))
        })
        .collect()
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
