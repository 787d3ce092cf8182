use std::{collections::HashMap, error::Error as StdError, io, time::Duration};

use reqwest::{Client, Method, Response, redirect::Policy};
use tokio::time::Instant;

use super::{
    DetailedRequestResult, DetailedResponse, DetailedTransport, ErrorType, RequestResult,
    RequestSpec, Transport,
};
use crate::{
    config::HttpMethod,
    error::{Error, Result},
};

/// The production transport, backed by a shared `reqwest::Client`.
///
/// Build it once per run and share it. NEVER create a client per request: the
/// connection pool lives inside the client. Redirects are not followed so the
/// measured latency is the latency of exactly one exchange.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .redirect(Policy::none())
            .build()
            .map_err(|e| Error::Client(e.to_string()))?;
        Ok(Self { client })
    }

    /// Wrap an already configured client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn dispatch(&self, request: &RequestSpec) -> reqwest::Result<Response> {
        let mut builder = self
            .client
            .request(to_reqwest_method(request.method()), request.url());
        for (name, value) in request.headers() {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body() {
            builder = builder.body(body.to_string());
        }
        builder.send().await
    }
}

impl Transport for ReqwestTransport {
    async fn send(&self, request: &RequestSpec) -> RequestResult {
        let start = Instant::now();
        match self.dispatch(request).await {
            Ok(response) => {
                let status_code = response.status().as_u16();
                // A body that breaks off mid-stream fails the exchange.
                match response.bytes().await {
                    Ok(_) => RequestResult::success(status_code, elapsed_ms(start)),
                    Err(e) => {
                        RequestResult::failure(e.to_string(), classify(&e), elapsed_ms(start))
                    }
                }
            }
            Err(e) => RequestResult::failure(e.to_string(), classify(&e), elapsed_ms(start)),
        }
    }
}

impl DetailedTransport for ReqwestTransport {
    async fn send_detailed(&self, request: &RequestSpec) -> DetailedRequestResult {
        let start = Instant::now();
        let response = match self.dispatch(request).await {
            Ok(response) => response,
            Err(e) => {
                return DetailedRequestResult::failure(e.to_string(), classify(&e), elapsed_ms(start));
            }
        };

        let status_code = response.status().as_u16();
        let mut headers: HashMap<String, Vec<String>> = HashMap::new();
        for (name, value) in response.headers() {
            headers
                .entry(name.as_str().to_string())
                .or_default()
                .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
        }

        match response.text().await {
            Ok(body) => DetailedRequestResult::Success(DetailedResponse {
                status_code,
                latency_ms: elapsed_ms(start),
                body,
                headers,
            }),
            Err(e) => DetailedRequestResult::failure(e.to_string(), classify(&e), elapsed_ms(start)),
        }
    }
}

fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Head => Method::HEAD,
        HttpMethod::Options => Method::OPTIONS,
    }
}

fn classify(error: &reqwest::Error) -> ErrorType {
    if error.is_timeout() {
        return ErrorType::Timeout;
    }
    if error.is_connect() {
        return ErrorType::ConnectionRefused;
    }
    if let Some(kind) = io_error_kind(error) {
        return classify_io(kind);
    }
    ErrorType::Unknown
}

fn classify_io(kind: io::ErrorKind) -> ErrorType {
    match kind {
        io::ErrorKind::TimedOut => ErrorType::Timeout,
        io::ErrorKind::ConnectionRefused => ErrorType::ConnectionRefused,
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::UnexpectedEof => ErrorType::ConnectionReset,
        _ => ErrorType::Unknown,
    }
}

/// Walk the source chain looking for the io error hyper wrapped.
fn io_error_kind(error: &(dyn StdError + 'static)) -> Option<io::ErrorKind> {
    let mut source = error.source();
    while let Some(err) = source {
        if let Some(io_err) = err.downcast_ref::<io::Error>() {
            return Some(io_err.kind());
        }
        source = err.source();
    }
    None
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use std::{
        io::{Read, Write},
        net::TcpListener,
        thread,
    };

    use super::*;

    #[test]
    fn io_kinds_map_to_error_types() {
        assert_eq!(classify_io(io::ErrorKind::TimedOut), ErrorType::Timeout);
        assert_eq!(
            classify_io(io::ErrorKind::ConnectionRefused),
            ErrorType::ConnectionRefused
        );
        assert_eq!(
            classify_io(io::ErrorKind::ConnectionReset),
            ErrorType::ConnectionReset
        );
        assert_eq!(classify_io(io::ErrorKind::BrokenPipe), ErrorType::ConnectionReset);
        assert_eq!(classify_io(io::ErrorKind::InvalidData), ErrorType::Unknown);
    }

    #[test]
    fn every_method_maps_to_reqwest() {
        assert_eq!(to_reqwest_method(HttpMethod::Get), Method::GET);
        assert_eq!(to_reqwest_method(HttpMethod::Patch), Method::PATCH);
        assert_eq!(to_reqwest_method(HttpMethod::Options), Method::OPTIONS);
    }

    /// Serves one connection that promises 1000 body bytes but sends 3.
    fn truncating_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf);
            let _ = stream.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 1000\r\n\r\nabc");
            let _ = stream.flush();
        });
        format!("http://{addr}/")
    }

    mod send {
        use super::*;

        #[tokio::test]
        async fn refused_connection_becomes_a_failure_value() {
            let addr = {
                let listener = TcpListener::bind("127.0.0.1:0").unwrap();
                listener.local_addr().unwrap()
            };
            let transport = ReqwestTransport::new(Duration::from_secs(2)).unwrap();
            let result = transport.send(&RequestSpec::get(format!("http://{addr}/"))).await;
            assert!(matches!(result, RequestResult::Failure { .. }), "{result:?}");
        }

        #[tokio::test]
        async fn truncated_body_fails_on_both_ports() {
            let transport = ReqwestTransport::new(Duration::from_secs(5)).unwrap();

            let bulk = transport.send(&RequestSpec::get(truncating_server())).await;
            assert!(matches!(bulk, RequestResult::Failure { .. }), "{bulk:?}");

            let detailed = transport
                .send_detailed(&RequestSpec::get(truncating_server()))
                .await;
            assert!(
                matches!(detailed, DetailedRequestResult::Failure { .. }),
                "{detailed:?}"
            );
        }
    }
}
