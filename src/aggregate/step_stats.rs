use std::sync::atomic::{AtomicU64, Ordering};

use super::histogram::{update_max, update_min};
use crate::{metric::Metric, report::StepStats};

/// Accumulates every result of one scenario step across all iterations.
///
/// Same lock-free discipline as the bulk aggregator: counters are atomic adds,
/// min/max are CAS loops.
pub struct StepStatsCollector {
    step_id: String,
    step_name: String,
    total: AtomicU64,
    success: AtomicU64,
    fail: AtomicU64,
    latency_sum: AtomicU64,
    min_latency: AtomicU64,
    max_latency: AtomicU64,
}

impl StepStatsCollector {
    pub fn new(step_id: impl Into<String>, step_name: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            step_name: step_name.into(),
            total: AtomicU64::new(0),
            success: AtomicU64::new(0),
            fail: AtomicU64::new(0),
            latency_sum: AtomicU64::new(0),
            min_latency: AtomicU64::new(u64::MAX),
            max_latency: AtomicU64::new(0),
        }
    }

    pub fn step_id(&self) -> &str {
        &self.step_id
    }

    pub fn record<M: Metric>(&self, metric: &M) {
        let latency = metric.latency_ms();
        self.total.fetch_add(1, Ordering::Relaxed);
        self.latency_sum.fetch_add(latency, Ordering::Relaxed);
        if metric.is_success() {
            self.success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.fail.fetch_add(1, Ordering::Relaxed);
        }
        update_min(&self.min_latency, latency);
        update_max(&self.max_latency, latency);
    }

    pub fn snapshot(&self) -> StepStats {
        let total = self.total.load(Ordering::Relaxed);
        let avg_latency_ms = if total > 0 {
            self.latency_sum.load(Ordering::Relaxed) as f64 / total as f64
        } else {
            0.0
        };
        let min_latency_ms = match self.min_latency.load(Ordering::Relaxed) {
            u64::MAX => 0,
            min => min,
        };

        StepStats {
            step_id: self.step_id.clone(),
            step_name: self.step_name.clone(),
            total_count: total,
            success_count: self.success.load(Ordering::Relaxed),
            fail_count: self.fail.load(Ordering::Relaxed),
            min_latency_ms,
            max_latency_ms: self.max_latency.load(Ordering::Relaxed),
            avg_latency_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::StepResult;

    #[test]
    fn untouched_collector_snapshots_to_zero() {
        let stats = StepStatsCollector::new("login", "Log in").snapshot();
        assert_eq!(stats.step_id, "login");
        assert_eq!(stats.step_name, "Log in");
        assert_eq!(stats.total_count, 0);
        assert_eq!(stats.min_latency_ms, 0);
        assert_eq!(stats.max_latency_ms, 0);
        assert_eq!(stats.avg_latency_ms, 0.0);
    }

    #[test]
    fn mixes_successes_and_failures() {
        let collector = StepStatsCollector::new("login", "login");
        collector.record(&StepResult::success("login", "login", 200, 20, Default::default()));
        collector.record(&StepResult::success("login", "login", 200, 40, Default::default()));
        collector.record(&StepResult::failure("login", "login", Some(500), 60, "HTTP 500"));
        let stats = collector.snapshot();

        assert_eq!(stats.total_count, 3);
        assert_eq!(stats.success_count, 2);
        assert_eq!(stats.fail_count, 1);
        assert_eq!(stats.min_latency_ms, 20);
        assert_eq!(stats.max_latency_ms, 60);
        assert_eq!(stats.avg_latency_ms, 40.0);
    }
}
