use std::sync::Arc;

use typed_builder::TypedBuilder;

use super::{ExecutionContext, internals::*};
use crate::{
    aggregate::MetricAggregator,
    error::{Error, Result},
    http::{RequestResult, RequestSpec, Transport},
    progress::ProgressCallback,
};

/// Fires N independent copies of one request with at most `concurrency` in flight.
///
/// - One task per request; a [`tokio::sync::Semaphore`] with `concurrency`
///   permits gates admission. No batching and no ordering is imposed.
/// - Each completed request is recorded into the optional shared
///   [`MetricAggregator`], counted in the [`ExecutionContext`], and handed to the
///   progress sink, all before its permit is released.
/// - Transports never fail, so every admitted request yields exactly one result.
///
/// ```rust,no_run
/// use barrage::{executor::RequestExecutionEngine, http::{RequestSpec, ReqwestTransport}, progress::Noop};
/// use std::time::Duration;
///
/// # async fn run() -> barrage::Result<()> {
/// let engine = RequestExecutionEngine::builder()
///     .transport(ReqwestTransport::new(Duration::from_secs(5))?)
///     .concurrency(64)
///     .build();
/// let results = engine
///     .execute(RequestSpec::get("http://localhost:3000"), 10_000, Noop)
///     .await?;
/// assert_eq!(results.len(), 10_000);
/// # Ok(())
/// # }
/// ```
#[derive(TypedBuilder)]
pub struct RequestExecutionEngine<T: Transport> {
    /// NEVER build heavy clients per request; the transport is shared by every task.
    #[builder(setter(transform = |transport: T| Arc::new(transport)))]
    transport: Arc<T>,
    /// Maximum number of requests in flight at any instant.
    #[builder(default = 10)]
    concurrency: usize,
    /// Shared aggregator every completed request is recorded into.
    #[builder(default, setter(strip_option))]
    aggregator: Option<Arc<MetricAggregator>>,
}

impl<T: Transport> RequestExecutionEngine<T> {
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Send `spec` `total_requests` times and return every result.
    pub async fn execute<C>(
        &self,
        spec: RequestSpec,
        total_requests: usize,
        on_progress: C,
    ) -> Result<Vec<RequestResult>>
    where
        C: ProgressCallback + 'static,
    {
        let ctx = ExecutionContext::new(total_requests);
        self.execute_in(&ctx, spec, on_progress).await
    }

    /// Like [`execute`](Self::execute) but within a caller-owned context, which
    /// lets the caller watch progress or cancel the run from another task.
    pub async fn execute_in<C>(
        &self,
        ctx: &ExecutionContext,
        spec: RequestSpec,
        on_progress: C,
    ) -> Result<Vec<RequestResult>>
    where
        C: ProgressCallback + 'static,
    {
        let total = ctx.total();
        if total < 1 {
            return Err(Error::InvalidTotalRequests(total));
        }
        if self.concurrency < 1 {
            return Err(Error::InvalidConcurrency(self.concurrency));
        }

        let spec = Arc::new(spec);
        let on_progress = Arc::new(on_progress);
        let semaphore = semaphore_for(self.concurrency);

        tracing::info!(
            "Spawning {total} requests to {} {} with concurrency {}...",
            spec.method(),
            spec.url(),
            self.concurrency
        );
        let handles = spawn_bounded(ctx, &semaphore, |_| {
            let ctx = ctx.clone();
            let spec = spec.clone();
            let transport = self.transport.clone();
            let aggregator = self.aggregator.clone();
            let on_progress = on_progress.clone();
            async move {
                let result = transport.send(&spec).await;
                if let Some(aggregator) = &aggregator {
                    aggregator.record(&result);
                }
                let completed = ctx.increment_completed();
                on_progress.on_progress(completed, total, &result);
                result
            }
        });

        let results = join_bounded(handles).await;
        tracing::info!("Done: {}/{total} requests completed.", results.len());
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::ErrorType;
    use std::{
        sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    struct AlwaysOk;

    impl Transport for AlwaysOk {
        async fn send(&self, _: &RequestSpec) -> RequestResult {
            tokio::task::yield_now().await;
            RequestResult::success(200, 1)
        }
    }

    /// Tracks the highest number of concurrent `send` calls.
    #[derive(Default)]
    struct InFlightTracker {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Transport for InFlightTracker {
        async fn send(&self, _: &RequestSpec) -> RequestResult {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(2)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            RequestResult::success(200, 2)
        }
    }

    struct AlwaysRefused;

    impl Transport for AlwaysRefused {
        async fn send(&self, _: &RequestSpec) -> RequestResult {
            RequestResult::failure("connection refused", ErrorType::ConnectionRefused, 0)
        }
    }

    fn spec() -> RequestSpec {
        RequestSpec::get("http://localhost/test")
    }

    #[tokio::test]
    async fn returns_one_result_per_request() {
        let engine = RequestExecutionEngine::builder()
            .transport(AlwaysOk)
            .concurrency(4)
            .build();
        let results = engine
            .execute(spec(), 37, crate::progress::Noop)
            .await
            .unwrap();
        assert_eq!(results.len(), 37);
        assert!(results.iter().all(|r| matches!(r, RequestResult::Success { status_code: 200, .. })));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn never_exceeds_concurrency() {
        let transport = Arc::new(InFlightTracker::default());
        let engine = RequestExecutionEngine {
            transport: transport.clone(),
            concurrency: 5,
            aggregator: None,
        };
        let results = engine
            .execute(spec(), 100, crate::progress::Noop)
            .await
            .unwrap();
        assert_eq!(results.len(), 100);
        assert!(transport.peak.load(Ordering::SeqCst) <= 5);
        assert!(transport.peak.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn completed_counter_is_gap_free() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let engine = RequestExecutionEngine::builder()
            .transport(AlwaysOk)
            .concurrency(8)
            .build();
        engine
            .execute(spec(), 50, move |completed: usize, total: usize, _: &RequestResult| {
                assert_eq!(total, 50);
                sink.lock().unwrap().push(completed);
            })
            .await
            .unwrap();

        let mut seen = seen.lock().unwrap().clone();
        seen.sort_unstable();
        assert_eq!(seen, (1..=50).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn every_completion_is_reported_exactly_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let (c, m) = (calls.clone(), max_seen.clone());
        let engine = RequestExecutionEngine::builder()
            .transport(AlwaysOk)
            .concurrency(3)
            .build();
        engine
            .execute(spec(), 20, move |completed: usize, _: usize, _: &RequestResult| {
                c.fetch_add(1, Ordering::SeqCst);
                m.fetch_max(completed, Ordering::SeqCst);
            })
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 20);
        assert_eq!(max_seen.load(Ordering::SeqCst), 20);
    }

    #[tokio::test]
    async fn failures_are_results_not_errors() {
        let aggregator = Arc::new(MetricAggregator::new());
        let engine = RequestExecutionEngine::builder()
            .transport(AlwaysRefused)
            .concurrency(2)
            .aggregator(aggregator.clone())
            .build();
        let results = engine
            .execute(spec(), 6, crate::progress::Noop)
            .await
            .unwrap();
        assert_eq!(results.len(), 6);
        let summary = aggregator.aggregate();
        assert_eq!(summary.total_requests, 6);
        assert_eq!(summary.fail_count, 6);
    }

    #[tokio::test]
    async fn cancelled_before_start_sends_nothing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let engine = RequestExecutionEngine::builder()
            .transport(AlwaysOk)
            .concurrency(2)
            .build();
        let ctx = ExecutionContext::new(10);
        ctx.cancel();
        let results = engine
            .execute_in(&ctx, spec(), move |_: usize, _: usize, _: &RequestResult| {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();
        assert!(results.is_empty());
        assert_eq!(ctx.completed(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancelling_mid_run_keeps_counts_consistent() {
        let engine = RequestExecutionEngine::builder()
            .transport(AlwaysOk)
            .concurrency(1)
            .build();
        let ctx = ExecutionContext::new(50);
        let canceller = ctx.clone();
        let results = engine
            .execute_in(&ctx, spec(), move |completed: usize, _: usize, _: &RequestResult| {
                if completed == 10 {
                    canceller.cancel();
                }
            })
            .await
            .unwrap();
        assert_eq!(results.len(), 10);
        assert_eq!(ctx.completed(), 10);
    }

    #[tokio::test]
    async fn invalid_arguments_fail_before_sending() {
        let engine = RequestExecutionEngine::builder()
            .transport(AlwaysOk)
            .concurrency(0)
            .build();
        assert_eq!(
            engine.execute(spec(), 5, crate::progress::Noop).await,
            Err(Error::InvalidConcurrency(0))
        );

        let engine = RequestExecutionEngine::builder().transport(AlwaysOk).build();
        assert_eq!(
            engine.execute(spec(), 0, crate::progress::Noop).await,
            Err(Error::InvalidTotalRequests(0))
        );
    }
}
