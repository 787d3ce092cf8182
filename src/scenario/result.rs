use std::collections::HashMap;

use barrage_macros::report;
use serde_json::Value;

/// Outcome of one step attempt.
#[report]
pub struct StepResult {
    pub step_id: String,
    pub step_name: String,
    pub success: bool,
    /// `None` when no response was received.
    pub status_code: Option<u16>,
    pub latency_ms: u64,
    /// Variables this step produced, empty on failure.
    pub extracted_values: HashMap<String, Value>,
    pub error: Option<String>,
}

impl StepResult {
    pub fn success(
        step_id: impl Into<String>,
        step_name: impl Into<String>,
        status_code: u16,
        latency_ms: u64,
        extracted_values: HashMap<String, Value>,
    ) -> Self {
        Self {
            step_id: step_id.into(),
            step_name: step_name.into(),
            success: true,
            status_code: Some(status_code),
            latency_ms,
            extracted_values,
            error: None,
        }
    }

    pub fn failure(
        step_id: impl Into<String>,
        step_name: impl Into<String>,
        status_code: Option<u16>,
        latency_ms: u64,
        error: impl Into<String>,
    ) -> Self {
        Self {
            step_id: step_id.into(),
            step_name: step_name.into(),
            success: false,
            status_code,
            latency_ms,
            extracted_values: HashMap::new(),
            error: Some(error.into()),
        }
    }
}

/// Outcome of one scenario iteration.
///
/// `step_results` holds one entry per executed step in execution order; it
/// covers every declared step only when the iteration ran to the end.
#[report]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub success: bool,
    pub total_duration_ms: u64,
    pub step_results: Vec<StepResult>,
    pub completed_steps: usize,
    pub total_steps: usize,
    pub failed_at_step: Option<String>,
    pub failure_reason: Option<String>,
}

impl ScenarioResult {
    pub fn success(
        scenario_name: impl Into<String>,
        total_duration_ms: u64,
        step_results: Vec<StepResult>,
    ) -> Self {
        let steps = step_results.len();
        Self {
            scenario_name: scenario_name.into(),
            success: true,
            total_duration_ms,
            step_results,
            completed_steps: steps,
            total_steps: steps,
            failed_at_step: None,
            failure_reason: None,
        }
    }

    pub fn failure(
        scenario_name: impl Into<String>,
        total_duration_ms: u64,
        step_results: Vec<StepResult>,
        total_steps: usize,
        failed_at_step: impl Into<String>,
        failure_reason: impl Into<String>,
    ) -> Self {
        Self {
            scenario_name: scenario_name.into(),
            success: false,
            total_duration_ms,
            completed_steps: step_results.len(),
            step_results,
            total_steps,
            failed_at_step: Some(failed_at_step.into()),
            failure_reason: Some(failure_reason.into()),
        }
    }

    /// Share of declared steps that succeeded, as a percentage.
    pub fn success_rate(&self) -> f64 {
        if self.total_steps == 0 {
            return 0.0;
        }
        let succeeded = self.step_results.iter().filter(|r| r.success).count();
        succeeded as f64 / self.total_steps as f64 * 100.0
    }
}
