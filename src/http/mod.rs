//! Request and result types plus the transport ports the engines send through.
//!
//! The engines never talk to the network directly. A bulk run sends through a
//! [`Transport`], which only needs the status code; a scenario run sends through a
//! [`DetailedTransport`], which keeps the body and headers because later steps
//! extract values from them. [`ReqwestTransport`] implements both.
//!
//! Transports must never fail: every error is folded into the `Failure` variant of
//! the returned result, with the latency measured up to the point of failure.
mod client;

pub use client::ReqwestTransport;

use std::{collections::HashMap, fmt, future::Future};

use barrage_macros::report;

use crate::config::HttpMethod;

/// An immutable request description, created once per run and shared read-only
/// by every task.
#[report]
pub struct RequestSpec {
    url: String,
    method: HttpMethod,
    headers: HashMap<String, String>,
    body: Option<String>,
}

impl RequestSpec {
    pub fn new(
        url: impl Into<String>,
        method: HttpMethod,
        headers: HashMap<String, String>,
        body: Option<String>,
    ) -> Self {
        Self {
            url: url.into(),
            method,
            headers,
            body,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(url, HttpMethod::Get, HashMap::new(), None)
    }

    pub fn post(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(url, HttpMethod::Post, HashMap::new(), Some(body.into()))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn has_body(&self) -> bool {
        self.body.as_deref().is_some_and(|b| !b.is_empty())
    }
}

/// Why a transport call failed.
#[report]
#[derive(Copy, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorType {
    Timeout,
    ConnectionRefused,
    ConnectionReset,
    Unknown,
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorType::Timeout => "TIMEOUT",
            ErrorType::ConnectionRefused => "CONNECTION_REFUSED",
            ErrorType::ConnectionReset => "CONNECTION_RESET",
            ErrorType::Unknown => "UNKNOWN",
        })
    }
}

/// Returns true for statuses in `[200, 300)`.
pub fn is_http_success(status_code: u16) -> bool {
    (200..300).contains(&status_code)
}

/// Outcome of one bulk request. A received response is always `Success`, even
/// when its status is not 2xx; whether it *counts* as a success is decided by
/// [`crate::Metric::is_success`].
#[report]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RequestResult {
    Success {
        status_code: u16,
        latency_ms: u64,
    },
    Failure {
        error_message: String,
        error_type: ErrorType,
        latency_ms: u64,
    },
}

impl RequestResult {
    pub fn success(status_code: u16, latency_ms: u64) -> Self {
        RequestResult::Success {
            status_code,
            latency_ms,
        }
    }

    pub fn failure(error_message: impl Into<String>, error_type: ErrorType, latency_ms: u64) -> Self {
        RequestResult::Failure {
            error_message: error_message.into(),
            error_type,
            latency_ms,
        }
    }
}

/// A response with everything the scenario extractors need.
#[report]
pub struct DetailedResponse {
    pub status_code: u16,
    pub latency_ms: u64,
    pub body: String,
    /// Header name to every value received for it, in arrival order.
    pub headers: HashMap<String, Vec<String>>,
}

impl DetailedResponse {
    pub fn is_http_success(&self) -> bool {
        is_http_success(self.status_code)
    }

    /// First value of the named header. Header names compare case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers(name).first().map(String::as_str)
    }

    /// Every value of the named header, empty when absent.
    pub fn headers(&self, name: &str) -> &[String] {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_slice())
            .unwrap_or_default()
    }
}

/// Outcome of one scenario request.
#[report]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DetailedRequestResult {
    Success(DetailedResponse),
    Failure {
        error_message: String,
        error_type: ErrorType,
        latency_ms: u64,
    },
}

impl DetailedRequestResult {
    pub fn failure(error_message: impl Into<String>, error_type: ErrorType, latency_ms: u64) -> Self {
        DetailedRequestResult::Failure {
            error_message: error_message.into(),
            error_type,
            latency_ms,
        }
    }

    pub fn latency_ms(&self) -> u64 {
        match self {
            DetailedRequestResult::Success(response) => response.latency_ms,
            DetailedRequestResult::Failure { latency_ms, .. } => *latency_ms,
        }
    }
}

/// Port used by bulk runs. The response body is not needed and may be discarded.
pub trait Transport: Send + Sync + 'static {
    fn send(&self, request: &RequestSpec) -> impl Future<Output = RequestResult> + Send;
}

/// Port used by scenario runs. Must retain the full body and all headers.
pub trait DetailedTransport: Send + Sync + 'static {
    fn send_detailed(
        &self,
        request: &RequestSpec,
    ) -> impl Future<Output = DetailedRequestResult> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response_with_headers(headers: &[(&str, &[&str])]) -> DetailedResponse {
        DetailedResponse {
            status_code: 200,
            latency_ms: 1,
            body: String::new(),
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
                .collect(),
        }
    }

    #[test]
    fn http_success_is_2xx_only() {
        assert!(is_http_success(200));
        assert!(is_http_success(204));
        assert!(is_http_success(299));
        assert!(!is_http_success(199));
        assert!(!is_http_success(300));
        assert!(!is_http_success(500));
    }

    #[test]
    fn header_lookup_returns_first_value() {
        let response = response_with_headers(&[("set-cookie", &["a=1", "b=2"])]);
        assert_eq!(response.header("Set-Cookie"), Some("a=1"));
        assert_eq!(response.headers("SET-COOKIE").len(), 2);
    }

    #[test]
    fn missing_header_is_none() {
        let response = response_with_headers(&[]);
        assert_eq!(response.header("X-Request-Id"), None);
        assert!(response.headers("X-Request-Id").is_empty());
    }

    #[test]
    fn error_type_displays_like_its_wire_name() {
        assert_eq!(ErrorType::ConnectionRefused.to_string(), "CONNECTION_REFUSED");
        assert_eq!(
            serde_json::to_string(&ErrorType::Timeout).unwrap(),
            "\"TIMEOUT\""
        );
    }

    #[test]
    fn request_result_serializes_tagged() {
        let json = serde_json::to_value(RequestResult::success(201, 12)).unwrap();
        assert_eq!(json["outcome"], "success");
        assert_eq!(json["status_code"], 201);
    }

    #[test]
    fn has_body_ignores_empty_bodies() {
        assert!(RequestSpec::post("http://x", "{}").has_body());
        assert!(!RequestSpec::post("http://x", "").has_body());
        assert!(!RequestSpec::get("http://x").has_body());
    }
}
