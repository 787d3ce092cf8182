use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use tokio::time::Instant;

use super::LatencyHistogram;
use crate::{
    metric::Metric,
    report::{LatencyStats, Percentiles, TestResult},
};

const UNSET: u64 = u64::MAX;

/// Collects every sample of one bulk run into counters and a latency histogram.
///
/// One instance per run, shared by reference (usually behind an `Arc`) with every
/// worker task. `record` is lock-free and safe to call from any number of tasks
/// at once; `start`/`end` are meant to be called by the single task driving the
/// run. Derived values (rates, percentiles) are only computed in [`aggregate`].
///
/// [`aggregate`]: MetricAggregator::aggregate
pub struct MetricAggregator {
    total: AtomicU64,
    success: AtomicU64,
    fail: AtomicU64,
    histogram: LatencyHistogram,
    origin: Instant,
    // nanoseconds since `origin`, `UNSET` until marked
    started_at: AtomicU64,
    ended_at: AtomicU64,
}

impl Default for MetricAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricAggregator {
    pub fn new() -> Self {
        Self {
            total: AtomicU64::new(0),
            success: AtomicU64::new(0),
            fail: AtomicU64::new(0),
            histogram: LatencyHistogram::new(),
            origin: Instant::now(),
            started_at: AtomicU64::new(UNSET),
            ended_at: AtomicU64::new(UNSET),
        }
    }

    /// Mark the wall-clock start of the run.
    pub fn start(&self) {
        self.started_at.store(self.now_nanos(), Ordering::Release);
    }

    /// Mark the wall-clock end of the run.
    pub fn end(&self) {
        self.ended_at.store(self.now_nanos(), Ordering::Release);
    }

    pub fn record<M: Metric>(&self, metric: &M) {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.histogram.record(metric.latency_ms());
        if metric.is_success() {
            self.success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.fail.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn recorded(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn histogram(&self) -> &LatencyHistogram {
        &self.histogram
    }

    /// Time between `start` and `end`. An unfinished run measures up to now; a run
    /// that never started measures zero.
    pub fn elapsed(&self) -> Duration {
        let started = self.started_at.load(Ordering::Acquire);
        if started == UNSET {
            return Duration::ZERO;
        }
        let ended = match self.ended_at.load(Ordering::Acquire) {
            UNSET => self.now_nanos(),
            ended => ended,
        };
        Duration::from_nanos(ended.saturating_sub(started))
    }

    /// Snapshot everything recorded so far into a [`TestResult`].
    pub fn aggregate(&self) -> TestResult {
        let total = self.total.load(Ordering::Relaxed);
        let duration = self.elapsed();
        let elapsed_ms = duration.as_millis();
        let requests_per_second = if elapsed_ms > 0 {
            total as f64 / elapsed_ms as f64 * 1000.0
        } else {
            0.0
        };

        TestResult {
            total_requests: total,
            success_count: self.success.load(Ordering::Relaxed),
            fail_count: self.fail.load(Ordering::Relaxed),
            total_duration: duration,
            requests_per_second,
            latency_stats: self.latency_stats(),
        }
    }

    fn latency_stats(&self) -> LatencyStats {
        if self.histogram.count() == 0 {
            return LatencyStats::default();
        }

        let min = self.histogram.min();
        let max = self.histogram.max();
        LatencyStats {
            min,
            max,
            avg: self.histogram.mean(),
            percentiles: Percentiles {
                p50: self.histogram.percentile(50.0),
                p90: self.histogram.percentile(90.0),
                p95: self.histogram.percentile(95.0),
                p99: self.histogram.percentile(99.0),
                min,
                max,
            },
        }
    }

    fn now_nanos(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }
}
