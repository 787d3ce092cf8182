use std::time::Duration;

use barrage::{
    LoadTester, Reporter, Scenario, ScenarioLoadTester,
    config::LoadTestConfig,
    progress::LoggingProgressCallback,
    report::{JsonReporter, StdoutReporter},
};
use tracing_subscriber::EnvFilter;

// Expects something listening on localhost:3000 with a `/login` route that
// answers `{"token": "..."}` and a `/me` route.
const LOGIN_FLOW: &str = r#"{
    "name": "Login flow",
    "failureStrategy": "RETRY",
    "retryCount": 2,
    "retryDelayMs": 100,
    "steps": [
        {
            "id": "login",
            "method": "POST",
            "url": "http://localhost:3000/login",
            "headers": { "Content-Type": "application/json" },
            "body": "{\"user\":\"demo\",\"password\":\"demo\"}",
            "extract": { "token": "$.token" }
        },
        {
            "id": "me",
            "url": "http://localhost:3000/me",
            "headers": { "Authorization": "Bearer ${login.token}" }
        }
    ]
}"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = LoadTestConfig::builder()
        .url("http://localhost:3000")
        .concurrency(50)
        .total_requests(10_000)
        .timeout(Duration::from_secs(2))
        .build();
    let bulk = LoadTester::run(&config, LoggingProgressCallback::default()).await?;
    StdoutReporter.report(&bulk)?;

    let scenario = Scenario::from_json(LOGIN_FLOW)?;
    let flow = ScenarioLoadTester::run(
        &scenario,
        500,
        20,
        Duration::from_secs(5),
        LoggingProgressCallback::new(25)?,
    )
    .await?;
    StdoutReporter.report(&flow)?;
    JsonReporter::new(std::io::stdout().lock()).report(&flow)?;
    Ok(())
}
