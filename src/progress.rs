//! Progress sinks.
//!
//! Callbacks are best-effort and invoked synchronously on the task that just
//! completed, so keep them cheap: anything slow here directly eats into the
//! throughput being measured. Closures implement the traits out of the box.
use std::sync::atomic::{AtomicI64, Ordering};

use crate::{
    error::{Error, Result},
    http::RequestResult,
    scenario::{ScenarioResult, StepResult},
};

/// Notified once per completed bulk request.
pub trait ProgressCallback: Send + Sync {
    fn on_progress(&self, completed: usize, total: usize, result: &RequestResult);
}

/// Notified once per completed scenario iteration.
pub trait ScenarioProgressCallback: Send + Sync {
    fn on_progress(&self, completed: usize, total: usize, result: &ScenarioResult);
}

/// Notified for every step result that lands in a scenario iteration's result list.
pub trait StepCallback: Send + Sync {
    fn on_step_complete(&self, step_id: &str, result: &StepResult);
}

impl<F> ProgressCallback for F
where
    F: Fn(usize, usize, &RequestResult) + Send + Sync,
{
    fn on_progress(&self, completed: usize, total: usize, result: &RequestResult) {
        self(completed, total, result)
    }
}

impl<F> ScenarioProgressCallback for F
where
    F: Fn(usize, usize, &ScenarioResult) + Send + Sync,
{
    fn on_progress(&self, completed: usize, total: usize, result: &ScenarioResult) {
        self(completed, total, result)
    }
}

impl<F> StepCallback for F
where
    F: Fn(&str, &StepResult) + Send + Sync,
{
    fn on_step_complete(&self, step_id: &str, result: &StepResult) {
        self(step_id, result)
    }
}

/// Ignores everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct Noop;

impl ProgressCallback for Noop {
    fn on_progress(&self, _: usize, _: usize, _: &RequestResult) {}
}

impl ScenarioProgressCallback for Noop {
    fn on_progress(&self, _: usize, _: usize, _: &ScenarioResult) {}
}

impl StepCallback for Noop {
    fn on_step_complete(&self, _: &str, _: &StepResult) {}
}

/// Percentage of `total` that `completed` represents, 0 when `total` is 0.
pub fn percentage(completed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    completed as f64 / total as f64 * 100.0
}

/// Logs progress through `tracing` every `interval_percent` percent.
///
/// Completions arrive concurrently and out of order, so the last logged interval
/// is advanced with a CAS: each interval is logged at most once, and 100% is
/// always logged exactly once.
pub struct LoggingProgressCallback {
    interval_percent: u32,
    last_logged: AtomicI64,
}

impl LoggingProgressCallback {
    pub const DEFAULT_INTERVAL_PERCENT: u32 = 10;

    pub fn new(interval_percent: u32) -> Result<Self> {
        if !(1..=100).contains(&interval_percent) {
            return Err(Error::InvalidLogInterval(interval_percent));
        }
        Ok(Self {
            interval_percent,
            last_logged: AtomicI64::new(-1),
        })
    }

    pub fn reset(&self) {
        self.last_logged.store(-1, Ordering::Relaxed);
    }

    /// Returns true when this call won the right to log `completed`.
    fn should_log(&self, completed: usize, total: usize) -> bool {
        if total == 0 {
            return false;
        }
        let interval = i64::from(self.interval_percent);
        let percent = (completed.saturating_mul(100) / total) as i64;
        // Completion sits past every interval so no partial one can claim it.
        let index = if completed >= total {
            100 / interval + 1
        } else {
            percent / interval
        };

        let mut last = self.last_logged.load(Ordering::Relaxed);
        while index > last {
            match self.last_logged.compare_exchange_weak(
                last,
                index,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => last = actual,
            }
        }
        false
    }

    fn log(&self, completed: usize, total: usize) {
        if self.should_log(completed, total) {
            tracing::info!(
                "Progress: {completed}/{total} ({:.0}%)",
                percentage(completed, total)
            );
        }
    }
}

impl Default for LoggingProgressCallback {
    fn default() -> Self {
        Self {
            interval_percent: Self::DEFAULT_INTERVAL_PERCENT,
            last_logged: AtomicI64::new(-1),
        }
    }
}

impl ProgressCallback for LoggingProgressCallback {
    fn on_progress(&self, completed: usize, total: usize, _: &RequestResult) {
        self.log(completed, total);
    }
}

impl ScenarioProgressCallback for LoggingProgressCallback {
    fn on_progress(&self, completed: usize, total: usize, _: &ScenarioResult) {
        self.log(completed, total);
    }
}
