use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use barrage::{
    ExecutionContext, LoadTester, Metric, Reporter,
    config::LoadTestConfig,
    http::{ErrorType, RequestResult, RequestSpec, Transport},
    progress::Noop,
    report::JsonReporter,
};

#[derive(Default)]
struct Counters {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

/// Answers 200 after a short pause and tracks peak concurrency.
#[derive(Clone, Default)]
struct Server {
    counters: Arc<Counters>,
}

impl Transport for Server {
    async fn send(&self, _: &RequestSpec) -> RequestResult {
        let c = &self.counters;
        c.calls.fetch_add(1, Ordering::SeqCst);
        let now = c.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        c.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(1)).await;
        c.in_flight.fetch_sub(1, Ordering::SeqCst);
        RequestResult::success(200, 1)
    }
}

/// Latency `n` for the n-th request, a timeout for every tenth.
#[derive(Default)]
struct Stepped {
    calls: AtomicUsize,
}

impl Transport for Stepped {
    async fn send(&self, _: &RequestSpec) -> RequestResult {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) as u64 + 1;
        if n % 10 == 0 {
            RequestResult::failure("request timed out", ErrorType::Timeout, n)
        } else {
            RequestResult::success(200, n)
        }
    }
}

fn config(concurrency: usize, total: usize) -> LoadTestConfig {
    LoadTestConfig::builder()
        .url("http://localhost:3000")
        .concurrency(concurrency)
        .total_requests(total)
        .build()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn always_succeeding_transport_yields_full_success() {
    for (concurrency, total) in [(1, 1), (1, 25), (7, 100), (64, 10)] {
        let server = Server::default();
        let result = LoadTester::run_with(&config(concurrency, total), Noop, server.clone())
            .await
            .unwrap();

        assert_eq!(result.total_requests, total as u64);
        assert_eq!(result.success_count, total as u64);
        assert_eq!(result.success_rate(), 100.0);
        assert_eq!(server.counters.calls.load(Ordering::SeqCst), total);
        assert!(server.counters.peak.load(Ordering::SeqCst) <= concurrency);
    }
}

#[tokio::test]
async fn latency_distribution_is_aggregated() {
    let result = LoadTester::run_with(&config(5, 100), Noop, Stepped::default())
        .await
        .unwrap();

    assert_eq!(result.fail_count, 10);
    assert_eq!(result.latency_stats.min, 1);
    assert_eq!(result.latency_stats.max, 100);
    assert_eq!(result.latency_stats.avg, 50.5);
    let p = result.latency_stats.percentiles;
    assert!((49..=51).contains(&p.p50), "p50 = {}", p.p50);
    assert!((98..=100).contains(&p.p99), "p99 = {}", p.p99);
    assert!(p.p50 <= p.p90 && p.p90 <= p.p95 && p.p95 <= p.p99);
}

#[tokio::test]
async fn progress_and_results_agree_under_cancellation() {
    let ctx = ExecutionContext::new(40);
    let canceller = ctx.clone();
    let successes = Arc::new(Mutex::new(0usize));
    let sink = successes.clone();

    let result = LoadTester::run_in(
        &ctx,
        &config(1, 40),
        move |completed: usize, _: usize, r: &RequestResult| {
            if r.is_success() {
                *sink.lock().unwrap() += 1;
            }
            if completed == 15 {
                canceller.cancel();
            }
        },
        Stepped::default(),
    )
    .await
    .unwrap();

    assert_eq!(ctx.completed(), 15);
    assert_eq!(result.total_requests, 15);
    assert_eq!(result.success_count as usize, *successes.lock().unwrap());
}

#[tokio::test]
async fn results_serialize_through_the_json_reporter() {
    let result = LoadTester::run_with(&config(2, 10), Noop, Stepped::default())
        .await
        .unwrap();
    let mut reporter = JsonReporter::new(Vec::new());
    reporter.report(&result).unwrap();

    let json: serde_json::Value = serde_json::from_slice(&reporter.into_inner()).unwrap();
    assert_eq!(json["total_requests"], 10);
    assert_eq!(json["fail_count"], 1);
}
