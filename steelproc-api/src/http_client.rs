//! HttpClient used by GatewayClient
//!
//! Responsible for
//!  - sending all HTTP requests to the processing server
//!  - logging/tracing
//!  - mapping transport failures and error responses into `SteelError::Remote`
//!  - metrics
//!
//! Each request is attempted exactly once. There is no retry or backoff.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use bytes::Bytes;
use reqwest::{ClientBuilder, Method, Url, multipart::Form};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, error, trace};

use crate::{Result, error::SteelError};

/// HTTP metrics tracked using atomic counters for thread-safe access.
/// These counters are cumulative and never reset during the client's lifetime.
#[derive(Debug, Default)]
pub struct HttpMetrics {
    /// Total number of HTTP requests sent to the server
    total_requests: AtomicU64,
    /// Total number of successful responses (2xx status codes)
    successful_responses: AtomicU64,
    /// Total number of failed requests (transport errors and non-2xx responses)
    errors: AtomicU64,
    /// Total bytes sent in request bodies (multipart bodies count the file length)
    bytes_sent: AtomicU64,
    /// Total bytes received in response bodies
    bytes_received: AtomicU64,
}

impl HttpMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of current metrics as plain u64 values
    pub fn snapshot(&self) -> HttpMetricsSnapshot {
        HttpMetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_responses: self.successful_responses.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
        }
    }

    fn increment_requests(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    fn increment_success(&self) {
        self.successful_responses.fetch_add(1, Ordering::Relaxed);
    }

    fn increment_errors(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    fn add_bytes_sent(&self, bytes: u64) {
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
    }

    fn add_bytes_received(&self, bytes: u64) {
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
    }
}

/// A point-in-time snapshot of HTTP metrics with plain u64 values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HttpMetricsSnapshot {
    /// Total number of HTTP requests sent to the server
    pub total_requests: u64,
    /// Total number of successful responses (2xx status codes)
    pub successful_responses: u64,
    /// Total number of failed requests
    pub errors: u64,
    /// Total bytes sent in request bodies
    pub bytes_sent: u64,
    /// Total bytes received in response bodies
    pub bytes_received: u64,
}

impl std::fmt::Display for HttpMetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "requests={} success={} errors={} sent={} recv={}",
            self.total_requests,
            self.successful_responses,
            self.errors,
            format_bytes(self.bytes_sent),
            format_bytes(self.bytes_received),
        )
    }
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes}B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1}KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1}MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// Request body variants. Multipart forms can't be cloned or measured up front,
/// so the caller passes the known file length separately.
pub(crate) enum HttpBody {
    Empty,
    Json(Bytes),
    Multipart { form: Form, len: u64 },
}

impl fmt::Debug for HttpBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // never print body contents: they carry the password
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Json(b) => write!(f, "Json({} bytes)", b.len()),
            Self::Multipart { len, .. } => write!(f, "Multipart({len} bytes)"),
        }
    }
}

pub(crate) struct HttpRequest {
    /// Short operation name, used in errors and logs ("restore", "process", ..)
    pub operation: &'static str,
    /// Message reported when the server doesn't supply a detail
    pub fallback_message: &'static str,
    pub method: Method,
    pub url: Url,
    pub body: HttpBody,
}

impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRequest")
            .field("operation", &self.operation)
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("body", &self.body)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct HttpClient {
    pub client: reqwest::Client,

    /// Base URL for API requests (e.g., "http://localhost:8000")
    pub base_url: Url,

    /// HTTP request/response metrics
    pub metrics: Arc<HttpMetrics>,
}

impl HttpClient {
    pub fn new(builder: ClientBuilder, base_url: Url) -> Result<Self> {
        let client = builder.build().map_err(|e| SteelError::Config {
            message: format!("http client init: {e}"),
        })?;
        Ok(HttpClient {
            client,
            base_url,
            metrics: Arc::new(HttpMetrics::new()),
        })
    }

    /// Returns a snapshot of current HTTP metrics
    pub fn metrics_snapshot(&self) -> HttpMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Joins an endpoint path onto the base url, keeping any base path prefix.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| SteelError::Config {
                message: format!("base url cannot be a base: {}", self.base_url),
            })?
            .pop_if_empty()
            .extend(path.split('/').filter(|seg| !seg.is_empty()));
        Ok(url)
    }

    /// POST a JSON body, deserialize the JSON response.
    pub(crate) async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        operation: &'static str,
        fallback_message: &'static str,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let data = self
            .post_json_raw(operation, fallback_message, path, body)
            .await?;
        deserialize_json(operation, fallback_message, &data)
    }

    /// POST a JSON body, return the raw response body.
    /// Used for acknowledgement-style endpoints whose body may be empty.
    pub(crate) async fn post_json_raw<B: Serialize>(
        &self,
        operation: &'static str,
        fallback_message: &'static str,
        path: &str,
        body: &B,
    ) -> Result<Bytes> {
        let body = serde_json::to_vec(body).map_err(|e| SteelError::Remote {
            operation: operation.to_string(),
            message: fallback_message.to_string(),
            status: None,
            raw_detail: Some(format!("request serialization: {e}")),
        })?;
        let req = HttpRequest {
            operation,
            fallback_message,
            method: Method::POST,
            url: self.endpoint(path)?,
            body: HttpBody::Json(Bytes::from(body)),
        };
        self.send(req).await
    }

    /// POST a multipart form, deserialize the JSON response.
    pub(crate) async fn post_multipart<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        fallback_message: &'static str,
        path: &str,
        form: Form,
        len: u64,
    ) -> Result<T> {
        let req = HttpRequest {
            operation,
            fallback_message,
            method: Method::POST,
            url: self.endpoint(path)?,
            body: HttpBody::Multipart { form, len },
        };
        let data = self.send(req).await?;
        deserialize_json(operation, fallback_message, &data)
    }

    /// GET an absolute url, return the raw body.
    pub(crate) async fn get_bytes(
        &self,
        operation: &'static str,
        fallback_message: &'static str,
        url: Url,
    ) -> Result<Bytes> {
        let req = HttpRequest {
            operation,
            fallback_message,
            method: Method::GET,
            url,
            body: HttpBody::Empty,
        };
        self.send(req).await
    }

    /// This function handles every request to the processing server
    /// - sends the request exactly once
    /// - maps transport errors and non-2xx responses into `SteelError::Remote`,
    ///   preferring the server's `detail` text for the message
    /// - returns the raw response body
    pub(crate) async fn send(&self, req: HttpRequest) -> Result<Bytes> {
        debug!(operation = req.operation, method = %req.method, url = %req.url, "http request");
        trace!(?req, "http request detail");

        let builder = self.client.request(req.method.clone(), req.url.clone());
        let (builder, body_size) = match req.body {
            HttpBody::Empty => (builder, 0),
            HttpBody::Json(bytes) => {
                let len = bytes.len() as u64;
                (
                    builder
                        .header(reqwest::header::CONTENT_TYPE, "application/json")
                        .body(bytes),
                    len,
                )
            }
            HttpBody::Multipart { form, len } => (builder.multipart(form), len),
        };

        self.metrics.increment_requests();
        self.metrics.add_bytes_sent(body_size);

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                self.metrics.increment_errors();
                error!(operation = req.operation, source = ?e, url = %req.url, "http transport");
                return Err(SteelError::Remote {
                    operation: req.operation.to_string(),
                    message: req.fallback_message.to_string(),
                    status: None,
                    raw_detail: Some(e.to_string()),
                });
            }
        };

        let code = response.status();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                self.metrics.increment_errors();
                error!(operation = req.operation, source = ?e, "http read body");
                return Err(SteelError::Remote {
                    operation: req.operation.to_string(),
                    message: req.fallback_message.to_string(),
                    status: Some(code.as_u16()),
                    raw_detail: Some(e.to_string()),
                });
            }
        };
        self.metrics.add_bytes_received(body.len() as u64);
        log_response(req.operation, &body);

        if code.is_success() {
            self.metrics.increment_success();
            return Ok(body);
        }

        self.metrics.increment_errors();
        let raw = String::from_utf8_lossy(&body).to_string();
        let message =
            extract_detail(&body).unwrap_or_else(|| req.fallback_message.to_string());
        error!(operation = req.operation, ?code, %message, "http");
        Err(SteelError::Remote {
            operation: req.operation.to_string(),
            message,
            status: Some(code.as_u16()),
            raw_detail: (!raw.is_empty()).then_some(raw),
        })
    }
}

/// Pulls the human-readable `detail` out of an error response body.
///
/// - `{"detail": "text"}` -> `text`
/// - `{"detail": {"message": "text", ..}}` -> `text`
/// - any other `detail` value -> its compact JSON
/// - no `detail`, or not JSON -> None
pub(crate) fn extract_detail(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    let detail = value.get("detail")?;
    match detail {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) if s.is_empty() => None,
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Object(map) => match map.get("message") {
            Some(serde_json::Value::String(msg)) if !msg.is_empty() => Some(msg.clone()),
            _ => Some(detail.to_string()),
        },
        other => Some(other.to_string()),
    }
}

// dump response, for debugging
// requires RUST_LOG=steelproc::http_json=trace
fn log_response(operation: &str, body: &Bytes) {
    if tracing::enabled!(target: "steelproc::http_json", tracing::Level::TRACE) {
        trace!(target: "steelproc::http_json", "Response operation={operation} body={}",
            String::from_utf8_lossy(body)
        );
    }
}

// deserialize, reporting errors with 'serde_path_to_error', which provides
// detailed json path to the error
fn deserialize_json<T: DeserializeOwned>(
    operation: &str,
    fallback_message: &str,
    body: &[u8],
) -> Result<T> {
    let mut deserializer = serde_json::Deserializer::from_slice(body);
    match serde_path_to_error::deserialize(&mut deserializer) {
        Ok(value) => Ok(value),
        Err(err) => {
            error!("Deserialization of {operation} response failed at {}: {}", err.path(), err);
            Err(SteelError::Remote {
                operation: operation.to_string(),
                message: fallback_message.to_string(),
                status: None,
                raw_detail: Some(format!("unexpected response at {}: {}", err.path(), err)),
            })
        }
    }
}
