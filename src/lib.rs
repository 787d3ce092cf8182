//! Barrage: a bounded-concurrency HTTP load generator.
//!
//! Barrage fires large numbers of concurrent HTTP requests under a fixed
//! concurrency budget, measures latency and throughput with percentile
//! statistics, and drives multi-step scenarios: ordered chains of dependent
//! requests where later steps consume values extracted from earlier responses.
//!
//! # Architecture
//!
//! The main building blocks are:
//!
//! - [`RequestExecutionEngine`]: fires N copies of one request, at most C in
//!   flight, through a [`http::Transport`]. [`LoadTester`] wraps it with
//!   validation and aggregation for the common case.
//! - [`Metric`]: the latency/success view of a single sample. Both bulk
//!   [`http::RequestResult`]s and scenario [`scenario::StepResult`]s are metrics.
//! - [`aggregate`]: lock-free collectors ([`aggregate::LatencyHistogram`],
//!   [`aggregate::MetricAggregator`], [`aggregate::StepStatsCollector`]) shared
//!   by every worker of a run.
//! - [`Report`]: the terminal artifacts ([`report::TestResult`],
//!   [`report::ScenarioTestResult`]); a [`Reporter`] sends them somewhere.
//! - [`Scenario`]: steps plus a failure strategy. [`scenario::ScenarioExecutor`]
//!   runs one iteration, [`ScenarioLoadTester`] runs many concurrently.
//! - [`variable`] and [`extract`]: `${step.var}` substitution and the
//!   JSONPath / header / regex extractors feeding it.
//!
//! Only configuration problems are errors ([`Error`]), and they are raised
//! before anything is sent. Everything that goes wrong during a run (timeouts,
//! refused connections, non-2xx responses, missing extractions) is a value in
//! the results.
//!
//! # Feature flags
//! - `internals`: expose the bounded-spawn building blocks the runners share
//!   (unstable)
//!
//! # Where to start
//!
//! Read the docs for [`LoadTester`] and [`ScenarioLoadTester`]; both carry a
//! minimal example.

/// Metric aggregators
pub mod aggregate;
/// Bulk run configuration
pub mod config;
mod error;
/// Bounded-concurrency orchestration
pub mod executor;
/// Extraction of values from step responses
pub mod extract;
/// Requests, results and transports
pub mod http;
mod load_tester;
/// Single metrics
pub mod metric;
/// Progress sinks
pub mod progress;
/// Reports and Reporters
pub mod report;
/// Multi-step scenarios
pub mod scenario;
/// Per-iteration variables and placeholder substitution
pub mod variable;

pub use error::{Error, Result};
pub use executor::{ExecutionContext, RequestExecutionEngine};
pub use load_tester::LoadTester;
pub use metric::Metric;
pub use report::{Report, Reporter};
pub use scenario::{Scenario, ScenarioLoadTester};
