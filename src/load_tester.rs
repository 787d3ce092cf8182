use std::sync::Arc;

use crate::{
    aggregate::MetricAggregator,
    config::LoadTestConfig,
    error::{Error, Result},
    executor::{ExecutionContext, RequestExecutionEngine},
    http::{ReqwestTransport, Transport},
    progress::ProgressCallback,
    report::TestResult,
};

/// One-call entry point for bulk runs: validate, execute, aggregate.
///
/// ```rust,no_run
/// use barrage::{LoadTester, config::LoadTestConfig, progress::LoggingProgressCallback};
///
/// # async fn run() -> barrage::Result<()> {
/// let config = LoadTestConfig::builder()
///     .url("http://localhost:3000")
///     .concurrency(32)
///     .total_requests(5_000)
///     .build();
/// let result = LoadTester::run(&config, LoggingProgressCallback::default()).await?;
/// println!("{}", result.summary());
/// # Ok(())
/// # }
/// ```
pub struct LoadTester;

impl LoadTester {
    /// Run against the network with a [`ReqwestTransport`] honoring `config.timeout`.
    pub async fn run<C>(config: &LoadTestConfig, on_progress: C) -> Result<TestResult>
    where
        C: ProgressCallback + 'static,
    {
        config.validate()?;
        let transport = ReqwestTransport::new(config.timeout)?;
        Self::run_with(config, on_progress, transport).await
    }

    /// Run through any transport.
    pub async fn run_with<T, C>(
        config: &LoadTestConfig,
        on_progress: C,
        transport: T,
    ) -> Result<TestResult>
    where
        T: Transport,
        C: ProgressCallback + 'static,
    {
        Self::run_in(&ExecutionContext::new(config.total_requests), config, on_progress, transport)
            .await
    }

    /// Run within a caller-owned context so the run can be observed or cancelled.
    ///
    /// The context must have been created for `config.total_requests`.
    pub async fn run_in<T, C>(
        ctx: &ExecutionContext,
        config: &LoadTestConfig,
        on_progress: C,
        transport: T,
    ) -> Result<TestResult>
    where
        T: Transport,
        C: ProgressCallback + 'static,
    {
        config.validate()?;
        if ctx.total() != config.total_requests {
            return Err(Error::ContextMismatch {
                config: config.total_requests,
                context: ctx.total(),
            });
        }
        let aggregator = Arc::new(MetricAggregator::new());
        let engine = RequestExecutionEngine::builder()
            .transport(transport)
            .concurrency(config.concurrency)
            .aggregator(aggregator.clone())
            .build();

        aggregator.start();
        engine
            .execute_in(ctx, config.request_spec(), on_progress)
            .await?;
        aggregator.end();

        let result = aggregator.aggregate();
        tracing::info!(
            "Load test finished: {} requests, {:.1}% success, {:.2} req/s",
            result.total_requests,
            result.success_rate(),
            result.requests_per_second
        );
        Ok(result)
    }
}
