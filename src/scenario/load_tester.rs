use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use tokio::time::Instant;
use typed_builder::TypedBuilder;

use super::{Scenario, ScenarioExecutor, ScenarioResult};
use crate::{
    aggregate::StepStatsCollector,
    error::{Error, Result},
    executor::{ExecutionContext, internals::*},
    http::{DetailedTransport, ReqwestTransport},
    progress::{Noop, ScenarioProgressCallback},
    report::{ScenarioTestResult, rate},
};

/// Repeats a scenario many times with at most `concurrency` iterations in
/// flight, and aggregates iteration outcomes and per-step latency.
///
/// Iterations are independent: each one gets its own [`ScenarioExecutor`] and
/// therefore its own variable context. The transport is the only thing they
/// share.
///
/// ```rust,no_run
/// use barrage::{progress::Noop, scenario::{Scenario, ScenarioLoadTester}};
/// use std::time::Duration;
///
/// # async fn run(definition: &str) -> barrage::Result<()> {
/// let scenario = Scenario::from_json(definition)?;
/// let result = ScenarioLoadTester::run(&scenario, 500, 20, Duration::from_secs(10), Noop).await?;
/// println!("{}", result.summary());
/// # Ok(())
/// # }
/// ```
#[derive(TypedBuilder)]
pub struct ScenarioLoadTester<T: DetailedTransport> {
    #[builder(setter(transform = |transport: T| Arc::new(transport)))]
    transport: Arc<T>,
    #[builder(default = 10)]
    concurrency: usize,
}

impl ScenarioLoadTester<ReqwestTransport> {
    /// Runs `iterations` iterations against the network, `concurrency` at a time,
    /// with `timeout` as the transport's per-request timeout.
    pub async fn run<C>(
        scenario: &Scenario,
        iterations: usize,
        concurrency: usize,
        timeout: Duration,
        on_progress: C,
    ) -> Result<ScenarioTestResult>
    where
        C: ScenarioProgressCallback + 'static,
    {
        ScenarioLoadTester::builder()
            .transport(ReqwestTransport::new(timeout)?)
            .concurrency(concurrency)
            .build()
            .execute(scenario, iterations, on_progress)
            .await
    }
}

/// Counters shared by every iteration task of one run.
struct RunTotals {
    success: AtomicU64,
    fail: AtomicU64,
    duration_sum_ms: AtomicU64,
    steps: HashMap<String, StepStatsCollector>,
}

impl RunTotals {
    fn new(scenario: &Scenario) -> Self {
        let mut steps = HashMap::with_capacity(scenario.step_count());
        for step in &scenario.steps {
            steps
                .entry(step.id.clone())
                .or_insert_with(|| StepStatsCollector::new(&step.id, step.display_name()));
        }
        Self {
            success: AtomicU64::new(0),
            fail: AtomicU64::new(0),
            duration_sum_ms: AtomicU64::new(0),
            steps,
        }
    }

    fn record(&self, result: &ScenarioResult) {
        if result.success {
            self.success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.fail.fetch_add(1, Ordering::Relaxed);
        }
        self.duration_sum_ms
            .fetch_add(result.total_duration_ms, Ordering::Relaxed);
        for step in &result.step_results {
            if let Some(collector) = self.steps.get(&step.step_id) {
                collector.record(step);
            }
        }
    }
}

impl<T: DetailedTransport> ScenarioLoadTester<T> {
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub async fn execute<C>(
        &self,
        scenario: &Scenario,
        iterations: usize,
        on_progress: C,
    ) -> Result<ScenarioTestResult>
    where
        C: ScenarioProgressCallback + 'static,
    {
        let ctx = ExecutionContext::new(iterations);
        self.execute_in(&ctx, scenario, on_progress).await
    }

    /// Like [`execute`](Self::execute) but within a caller-owned context; the
    /// context's total is the number of iterations.
    pub async fn execute_in<C>(
        &self,
        ctx: &ExecutionContext,
        scenario: &Scenario,
        on_progress: C,
    ) -> Result<ScenarioTestResult>
    where
        C: ScenarioProgressCallback + 'static,
    {
        scenario.validate()?;
        let iterations = ctx.total();
        if iterations < 1 {
            return Err(Error::InvalidIterations(iterations));
        }
        if self.concurrency < 1 {
            return Err(Error::InvalidConcurrency(self.concurrency));
        }

        let scenario = Arc::new(scenario.clone());
        let totals = Arc::new(RunTotals::new(&scenario));
        let on_progress = Arc::new(on_progress);
        let semaphore = semaphore_for(self.concurrency);
        let started = Instant::now();

        tracing::info!(
            "Spawning {iterations} iterations of scenario '{}' ({} steps) with concurrency {}...",
            scenario.name,
            scenario.step_count(),
            self.concurrency
        );
        let handles = spawn_bounded(ctx, &semaphore, |_| {
            let ctx = ctx.clone();
            let scenario = scenario.clone();
            let totals = totals.clone();
            let on_progress = on_progress.clone();
            let executor = ScenarioExecutor::from_shared(self.transport.clone());
            async move {
                let result = executor.execute_with(&scenario, &Noop).await;
                totals.record(&result);
                let completed = ctx.increment_completed();
                on_progress.on_progress(completed, iterations, &result);
            }
        });
        let finished = join_bounded(handles).await.len();
        let elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::info!("Done: {finished}/{iterations} iterations completed.");

        Ok(summarize(&scenario, iterations, elapsed_ms, &totals))
    }
}

fn summarize(
    scenario: &Scenario,
    iterations: usize,
    elapsed_ms: u64,
    totals: &RunTotals,
) -> ScenarioTestResult {
    let success_count = totals.success.load(Ordering::Relaxed);
    let fail_count = totals.fail.load(Ordering::Relaxed);
    let completed = success_count + fail_count;

    let avg_duration_ms = if completed > 0 {
        totals.duration_sum_ms.load(Ordering::Relaxed) as f64 / completed as f64
    } else {
        0.0
    };
    let scenarios_per_second = if elapsed_ms > 0 {
        completed as f64 / elapsed_ms as f64 * 1000.0
    } else {
        0.0
    };

    let mut step_order = Vec::with_capacity(scenario.step_count());
    let mut step_stats = BTreeMap::new();
    for step in &scenario.steps {
        if step_stats.contains_key(&step.id) {
            continue;
        }
        if let Some(collector) = totals.steps.get(&step.id) {
            step_stats.insert(step.id.clone(), collector.snapshot());
            step_order.push(step.id.clone());
        }
    }

    ScenarioTestResult {
        scenario_name: scenario.name.clone(),
        total_iterations: iterations as u64,
        success_count,
        fail_count,
        total_duration_ms: elapsed_ms,
        avg_duration_ms,
        success_rate: rate(success_count, completed),
        scenarios_per_second,
        step_stats,
        step_order,
    }
}
