use std::{collections::HashMap, fmt, str::FromStr, time::Duration};

use barrage_macros::report;
use typed_builder::TypedBuilder;

use crate::{
    error::{Error, Result},
    http::RequestSpec,
};

/// HTTP verbs a request or scenario step can use.
#[report]
#[derive(Copy, Eq, Hash, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive. Returns the unrecognized input as the error.
impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            "PATCH" => Ok(HttpMethod::Patch),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            _ => Err(s.to_string()),
        }
    }
}

/// Configuration of a bulk run: one request shape fired `total_requests` times
/// with at most `concurrency` requests in flight.
///
/// ```rust
/// use barrage::config::{HttpMethod, LoadTestConfig};
///
/// let config = LoadTestConfig::builder()
///     .url("http://localhost:8080/health")
///     .method(HttpMethod::Get)
///     .concurrency(50)
///     .total_requests(10_000)
///     .build();
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, TypedBuilder)]
pub struct LoadTestConfig {
    #[builder(setter(into))]
    pub url: String,
    #[builder(default)]
    pub method: HttpMethod,
    #[builder(default)]
    pub headers: HashMap<String, String>,
    #[builder(default, setter(strip_option, into))]
    pub body: Option<String>,
    #[builder(default = 10)]
    pub concurrency: usize,
    #[builder(default = 100)]
    pub total_requests: usize,
    /// Per-request timeout enforced by the transport.
    #[builder(default = Duration::from_secs(5))]
    pub timeout: Duration,
}

impl LoadTestConfig {
    /// Pre-flight checks. Must pass before any request is issued.
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(Error::BlankUrl);
        }
        if self.concurrency < 1 {
            return Err(Error::InvalidConcurrency(self.concurrency));
        }
        if self.total_requests < 1 {
            return Err(Error::InvalidTotalRequests(self.total_requests));
        }
        Ok(())
    }

    /// The immutable request every task of the run shares.
    pub fn request_spec(&self) -> RequestSpec {
        RequestSpec::new(
            self.url.clone(),
            self.method,
            self.headers.clone(),
            self.body.clone(),
        )
    }
}
