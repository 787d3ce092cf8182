//! Lock-free collectors that turn individual [`crate::Metric`]s into run totals.
//!
//! Aggregates store compact raw data (counters, sums, a histogram) and are shared
//! by every worker of a run. Final statistics are derived from them once, at the
//! end, into the types in [`crate::report`].
mod aggregator;
pub mod histogram;
mod step_stats;

pub use aggregator::MetricAggregator;
pub use histogram::LatencyHistogram;
pub use step_stats::StepStatsCollector;
