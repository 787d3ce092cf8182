use crate::{
    http::{RequestResult, is_http_success},
    scenario::StepResult,
};

/// A `Metric` is a single observed sample produced by one operation against the
/// system under test: one bulk request, or one scenario step.
///
/// Metrics are the most granular level of data. They are recorded into an
/// aggregate ([`crate::aggregate::MetricAggregator`] or
/// [`crate::aggregate::StepStatsCollector`]) which turns them into counters and a
/// latency distribution; a [`crate::Report`] then derives the final statistics.
///
/// ## Success
/// `is_success` is the business rule, not the transport outcome. A request that
/// got an HTTP 500 back completed fine at the transport level and is still a
/// failed sample.
///
/// ## Example
/// ```rust
/// use barrage::{Metric, http::RequestResult};
///
/// let ok = RequestResult::success(200, 12);
/// let server_error = RequestResult::success(503, 3);
/// assert!(ok.is_success());
/// assert!(!server_error.is_success());
/// assert_eq!(server_error.latency_ms(), 3);
/// ```
pub trait Metric: Send + Sync {
    /// Wall-clock latency of the operation in milliseconds.
    fn latency_ms(&self) -> u64;

    /// Whether the sample counts as a success.
    fn is_success(&self) -> bool;
}

impl Metric for RequestResult {
    fn latency_ms(&self) -> u64 {
        match self {
            RequestResult::Success { latency_ms, .. } => *latency_ms,
            RequestResult::Failure { latency_ms, .. } => *latency_ms,
        }
    }

    fn is_success(&self) -> bool {
        match self {
            RequestResult::Success { status_code, .. } => is_http_success(*status_code),
            RequestResult::Failure { .. } => false,
        }
    }
}

impl Metric for StepResult {
    fn latency_ms(&self) -> u64 {
        self.latency_ms
    }

    fn is_success(&self) -> bool {
        self.success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::ErrorType;

    #[test]
    fn transport_failures_never_count_as_success() {
        let result = RequestResult::failure("refused", ErrorType::ConnectionRefused, 4);
        assert!(!result.is_success());
        assert_eq!(result.latency_ms(), 4);
    }

    #[test]
    fn only_2xx_responses_count_as_success() {
        assert!(RequestResult::success(200, 1).is_success());
        assert!(RequestResult::success(299, 1).is_success());
        assert!(!RequestResult::success(302, 1).is_success());
        assert!(!RequestResult::success(404, 1).is_success());
    }
}
