//! Final results and the reporters that publish them.
//!
//! Reports are *pure data*: they are built once from an aggregate at the end of a
//! run, carry derived statistics (averages, percentiles, rates) and no I/O. A
//! [`Reporter`] is the I/O boundary that sends a report somewhere.
use std::{collections::BTreeMap, fmt::Write as _, io, time::Duration};

use barrage_macros::report;
use serde::Serialize;

/// Latency percentiles in milliseconds.
#[report]
#[derive(Copy, Default, Eq)]
pub struct Percentiles {
    pub p50: u64,
    pub p90: u64,
    pub p95: u64,
    pub p99: u64,
    pub min: u64,
    pub max: u64,
}

/// Latency summary in milliseconds. All zero when nothing was recorded.
#[report]
#[derive(Copy, Default)]
pub struct LatencyStats {
    pub min: u64,
    pub max: u64,
    pub avg: f64,
    pub percentiles: Percentiles,
}

/// The terminal artifact of one bulk run.
#[report]
pub struct TestResult {
    pub total_requests: u64,
    pub success_count: u64,
    pub fail_count: u64,
    pub total_duration: Duration,
    pub requests_per_second: f64,
    pub latency_stats: LatencyStats,
}

impl TestResult {
    /// Percentage of requests that succeeded, 0 when nothing ran.
    pub fn success_rate(&self) -> f64 {
        rate(self.success_count, self.total_requests)
    }

    pub fn fail_rate(&self) -> f64 {
        100.0 - self.success_rate()
    }

    pub fn summary(&self) -> String {
        let stats = &self.latency_stats;
        let p = &stats.percentiles;
        let mut out = String::new();
        let _ = writeln!(out, "{}", "=".repeat(60));
        let _ = writeln!(out, "Load Test Result");
        let _ = writeln!(out, "{}", "=".repeat(60));
        let _ = writeln!(out, "  Total Requests:      {}", self.total_requests);
        let _ = writeln!(
            out,
            "  Success:             {} ({:.1}%)",
            self.success_count,
            self.success_rate()
        );
        let _ = writeln!(out, "  Failed:              {}", self.fail_count);
        let _ = writeln!(
            out,
            "  Total Duration:      {}ms",
            self.total_duration.as_millis()
        );
        let _ = writeln!(out, "  Requests/sec:        {:.2}", self.requests_per_second);
        let _ = writeln!(out);
        let _ = writeln!(out, "Latency (ms):");
        let _ = writeln!(out, "  min {}  avg {:.2}  max {}", stats.min, stats.avg, stats.max);
        let _ = writeln!(
            out,
            "  p50 {}  p90 {}  p95 {}  p99 {}",
            p.p50, p.p90, p.p95, p.p99
        );
        let _ = writeln!(out, "{}", "=".repeat(60));
        out
    }
}

/// Cross-iteration statistics of one scenario step.
#[report]
pub struct StepStats {
    pub step_id: String,
    pub step_name: String,
    pub total_count: u64,
    pub success_count: u64,
    pub fail_count: u64,
    pub min_latency_ms: u64,
    pub max_latency_ms: u64,
    pub avg_latency_ms: f64,
}

impl StepStats {
    pub fn success_rate(&self) -> f64 {
        rate(self.success_count, self.total_count)
    }
}

/// The terminal artifact of one scenario run.
#[report]
pub struct ScenarioTestResult {
    pub scenario_name: String,
    pub total_iterations: u64,
    pub success_count: u64,
    pub fail_count: u64,
    pub total_duration_ms: u64,
    pub avg_duration_ms: f64,
    pub success_rate: f64,
    pub scenarios_per_second: f64,
    /// Keyed by step id. `step_order` keeps declaration order for display.
    pub step_stats: BTreeMap<String, StepStats>,
    pub step_order: Vec<String>,
}

impl ScenarioTestResult {
    /// Step statistics in the order the steps were declared.
    pub fn ordered_step_stats(&self) -> impl Iterator<Item = &StepStats> {
        self.step_order
            .iter()
            .filter_map(|id| self.step_stats.get(id))
    }

    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", "=".repeat(60));
        let _ = writeln!(out, "Scenario Test Result: {}", self.scenario_name);
        let _ = writeln!(out, "{}", "=".repeat(60));
        let _ = writeln!(out, "  Total Iterations:    {}", self.total_iterations);
        let _ = writeln!(
            out,
            "  Success:             {} ({:.1}%)",
            self.success_count, self.success_rate
        );
        let _ = writeln!(out, "  Failed:              {}", self.fail_count);
        let _ = writeln!(out, "  Total Duration:      {}ms", self.total_duration_ms);
        let _ = writeln!(out, "  Avg Duration:        {:.2}ms", self.avg_duration_ms);
        let _ = writeln!(out, "  Scenarios/sec:       {:.2}", self.scenarios_per_second);
        let _ = writeln!(out);
        let _ = writeln!(out, "Step Statistics:");
        let _ = writeln!(out, "{}", "-".repeat(60));
        let _ = writeln!(
            out,
            "  {:<15} {:>8} {:>10} {:>10}",
            "Step", "Success%", "Avg(ms)", "Max(ms)"
        );
        let _ = writeln!(out, "{}", "-".repeat(60));
        for stats in self.ordered_step_stats() {
            let _ = writeln!(
                out,
                "  {:<15} {:>7.1}% {:>10.0} {:>10}",
                stats.step_id,
                stats.success_rate(),
                stats.avg_latency_ms,
                stats.max_latency_ms
            );
        }
        let _ = writeln!(out, "{}", "=".repeat(60));
        out
    }
}

pub(crate) fn rate(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    part as f64 / total as f64 * 100.0
}

/// Anything that can render itself as a human-readable block.
pub trait Report: Serialize {
    fn summary(&self) -> String;
}

impl Report for TestResult {
    fn summary(&self) -> String {
        TestResult::summary(self)
    }
}

impl Report for ScenarioTestResult {
    fn summary(&self) -> String {
        ScenarioTestResult::summary(self)
    }
}

/// A [`Reporter`] consumes a [`Report`] and performs side effects: printing it,
/// writing it to a file, shipping it to a service.
///
/// Reporters are the I/O boundary. Keeping them separate from the report types
/// lets the engine stay pure and lets one result feed several sinks.
pub trait Reporter<R: Report> {
    fn report(&mut self, report: &R) -> io::Result<()>;
}

/// Prints the human-readable summary to stdout.
pub struct StdoutReporter;

impl<R: Report> Reporter<R> for StdoutReporter {
    fn report(&mut self, report: &R) -> io::Result<()> {
        println!("{}", report.summary());
        Ok(())
    }
}

/// Writes the report as pretty-printed JSON to any writer.
pub struct JsonReporter<W: io::Write> {
    writer: W,
}

impl<W: io::Write> JsonReporter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<R: Report, W: io::Write> Reporter<R> for JsonReporter<W> {
    fn report(&mut self, report: &R) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut self.writer, report)?;
        writeln!(self.writer)
    }
}
