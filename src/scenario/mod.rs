//! Multi-step scenarios: ordered, dependent requests repeated under load.
//!
//! A [`Scenario`] is a list of [`ScenarioStep`]s plus a [`FailureStrategy`].
//! [`ScenarioExecutor`] runs one iteration of it, strictly in step order, with
//! values extracted from earlier responses substituted into later requests.
//! [`ScenarioLoadTester`] repeats iterations concurrently and aggregates
//! overall and per-step statistics.
//!
//! Scenarios are built in code with the typed builders, or parsed from a JSON
//! definition with [`Scenario::from_json`].
mod executor;
mod load_tester;
mod parse;
mod result;

pub use executor::ScenarioExecutor;
pub use load_tester::ScenarioLoadTester;
pub use result::{ScenarioResult, StepResult};

use std::{collections::HashMap, fmt, str::FromStr, time::Duration};

use barrage_macros::report;
use typed_builder::TypedBuilder;

use crate::{
    config::HttpMethod,
    error::{Error, Result},
};

pub const DEFAULT_STEP_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;

/// What an iteration does when a step fails.
#[report]
#[derive(Copy, Eq, Hash, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum FailureStrategy {
    /// Abort the iteration at the failing step.
    #[default]
    Stop,
    /// Record the failure and carry on with the next step.
    Skip,
    /// Re-run the failing step up to `retry_count` times, then behave like `Stop`.
    Retry,
}

impl fmt::Display for FailureStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureStrategy::Stop => "STOP",
            FailureStrategy::Skip => "SKIP",
            FailureStrategy::Retry => "RETRY",
        })
    }
}

impl FromStr for FailureStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "STOP" => Ok(FailureStrategy::Stop),
            "SKIP" => Ok(FailureStrategy::Skip),
            "RETRY" => Ok(FailureStrategy::Retry),
            _ => Err(s.to_string()),
        }
    }
}

/// One request of a scenario.
///
/// `url`, header values and `body` are templates: `${stepId.varName}`
/// placeholders are filled from earlier steps' extractions right before the
/// request is sent. `extract` maps a variable name to an extraction path (see
/// [`crate::extract`]); extracted values are stored under this step's id.
///
/// ```rust
/// use barrage::{config::HttpMethod, scenario::ScenarioStep};
/// use std::collections::HashMap;
///
/// let login = ScenarioStep::builder()
///     .id("login")
///     .method(HttpMethod::Post)
///     .url("http://localhost:8080/login")
///     .body(r#"{"user":"demo"}"#)
///     .extract(HashMap::from([("token".into(), "$.token".into())]))
///     .build();
/// assert_eq!(login.display_name(), "login");
/// ```
#[derive(Debug, Clone, PartialEq, TypedBuilder)]
pub struct ScenarioStep {
    #[builder(setter(into))]
    pub id: String,
    /// Human-readable name; the id is used when blank.
    #[builder(default, setter(into))]
    pub name: String,
    #[builder(default)]
    pub method: HttpMethod,
    #[builder(setter(into))]
    pub url: String,
    #[builder(default)]
    pub headers: HashMap<String, String>,
    #[builder(default, setter(strip_option, into))]
    pub body: Option<String>,
    #[builder(default)]
    pub extract: HashMap<String, String>,
    /// 0 means the default of 30s.
    #[builder(default = DEFAULT_STEP_TIMEOUT_MS)]
    pub timeout_ms: u64,
}

impl ScenarioStep {
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    pub fn timeout(&self) -> Duration {
        match self.timeout_ms {
            0 => Duration::from_millis(DEFAULT_STEP_TIMEOUT_MS),
            ms => Duration::from_millis(ms),
        }
    }

    pub fn has_extraction(&self) -> bool {
        !self.extract.is_empty()
    }

    fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::BlankStepId);
        }
        if self.url.trim().is_empty() {
            return Err(Error::BlankStepUrl {
                step: self.id.clone(),
            });
        }
        Ok(())
    }
}

/// A named, ordered sequence of dependent steps run as one logical transaction.
#[derive(Debug, Clone, PartialEq, TypedBuilder)]
pub struct Scenario {
    #[builder(setter(into))]
    pub name: String,
    pub steps: Vec<ScenarioStep>,
    #[builder(default)]
    pub failure_strategy: FailureStrategy,
    /// Extra attempts per failing step under [`FailureStrategy::Retry`].
    #[builder(default)]
    pub retry_count: u32,
    /// Pause before every retry attempt.
    #[builder(default = DEFAULT_RETRY_DELAY_MS)]
    pub retry_delay_ms: u64,
}

impl Scenario {
    /// Pre-flight checks. Must pass before any iteration runs.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::BlankScenarioName);
        }
        if self.steps.is_empty() {
            return Err(Error::EmptyScenario);
        }
        self.steps.iter().try_for_each(ScenarioStep::validate)
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn step(&self, id: &str) -> Option<&ScenarioStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(id: &str, url: &str) -> ScenarioStep {
        ScenarioStep::builder().id(id).url(url).build()
    }

    mod failure_strategy {
        use super::*;

        #[test]
        fn parses_case_insensitively() {
            assert_eq!("retry".parse(), Ok(FailureStrategy::Retry));
            assert_eq!("Skip".parse(), Ok(FailureStrategy::Skip));
            assert!("later".parse::<FailureStrategy>().is_err());
        }

        #[test]
        fn defaults_to_stop() {
            assert_eq!(FailureStrategy::default(), FailureStrategy::Stop);
        }
    }

    mod step {
        use super::*;

        #[test]
        fn builder_defaults() {
            let s = step("login", "http://localhost/login");
            assert_eq!(s.method, HttpMethod::Get);
            assert_eq!(s.display_name(), "login");
            assert_eq!(s.timeout(), Duration::from_secs(30));
            assert!(!s.has_extraction());
            assert_eq!(s.body, None);
        }

        #[test]
        fn zero_timeout_falls_back_to_default() {
            let s = ScenarioStep::builder()
                .id("a")
                .url("http://x")
                .timeout_ms(0)
                .build();
            assert_eq!(s.timeout(), Duration::from_millis(DEFAULT_STEP_TIMEOUT_MS));
        }

        #[test]
        fn explicit_name_wins() {
            let s = ScenarioStep::builder()
                .id("a")
                .name("Fetch profile")
                .url("http://x")
                .build();
            assert_eq!(s.display_name(), "Fetch profile");
        }
    }

    mod validation {
        use super::*;

        fn scenario(steps: Vec<ScenarioStep>) -> Scenario {
            Scenario::builder().name("checkout").steps(steps).build()
        }

        #[test]
        fn accepts_well_formed_scenarios() {
            let s = scenario(vec![step("a", "http://x"), step("b", "http://y")]);
            assert_eq!(s.validate(), Ok(()));
            assert_eq!(s.step_count(), 2);
            assert_eq!(s.step("b").map(|s| s.url.as_str()), Some("http://y"));
            assert!(s.step("c").is_none());
            assert_eq!(s.retry_delay(), Duration::from_secs(1));
        }

        #[test]
        fn rejects_empty_and_blank() {
            assert_eq!(scenario(vec![]).validate(), Err(Error::EmptyScenario));
            assert_eq!(
                scenario(vec![step(" ", "http://x")]).validate(),
                Err(Error::BlankStepId)
            );
            assert_eq!(
                scenario(vec![step("a", "http://x"), step("b", "")]).validate(),
                Err(Error::BlankStepUrl { step: "b".into() })
            );
            let unnamed = Scenario::builder()
                .name("")
                .steps(vec![step("a", "http://x")])
                .build();
            assert_eq!(unnamed.validate(), Err(Error::BlankScenarioName));
        }
    }
}
