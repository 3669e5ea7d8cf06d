//! HTTP transport seam
//!
//! The query executor drives the transport as an opaque fetch-with-headers
//! primitive, so tests can script responses and applications can swap in
//! instrumented transports. [`HttpTransport`] is the reqwest-backed default.

use std::borrow::Cow;
use std::time::Duration;

use bytes::Bytes;
use serde_json::Value;
use thiserror::Error;

pub use reqwest::header::{HeaderMap, HeaderValue};
pub use reqwest::StatusCode;

/// Request timeout of the default transport
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Transport failures, classified so the retry loop can pick out timeouts
#[derive(Error, Debug)]
pub enum TransportError {
    /// The request or the body read timed out
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Any other HTTP-level failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// The underlying HTTP client could not be constructed
    #[error("Failed to build HTTP client: {0}")]
    Build(String),
}

impl TransportError {
    /// Whether this is the timeout classification the retry loop acts on
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TransportError::Timeout(error.to_string())
        } else {
            TransportError::Http(error.to_string())
        }
    }
}

/// A fetched response: status code plus raw body bytes.
///
/// The client keeps the most recent one as its last-response handle, so the
/// raw body stays inspectable after a decode failure.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    body: Bytes,
}

impl Response {
    /// Response from a status code and raw body
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// HTTP status code
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Raw body bytes
    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    /// Body decoded as UTF-8, lossily
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Body decoded as JSON
    pub fn json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Fetch-with-headers primitive the query executor drives.
///
/// Implementations must classify timeouts as [`TransportError::Timeout`];
/// that is the only failure the executor retries.
pub trait Transport {
    /// Perform a GET request and return the complete response
    fn fetch(&self, url: &str, headers: &HeaderMap) -> Result<Response, TransportError>;
}

/// Blocking reqwest-backed transport with a 30 second request timeout
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Build the default transport
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("quaero/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Build(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, url: &str, headers: &HeaderMap) -> Result<Response, TransportError> {
        let response = self.client.get(url).headers(headers.clone()).send()?;
        let status = response.status();
        let body = response.bytes()?;
        Ok(Response { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_json() {
        let response = Response::new(StatusCode::OK, r#"{"boolean": true}"#);
        let value = response.json().unwrap();
        assert_eq!(value["boolean"], Value::Bool(true));
    }

    #[test]
    fn test_response_json_failure_keeps_body_readable() {
        let response = Response::new(StatusCode::OK, "<!DOCTYPE html>");
        assert!(response.json().is_err());
        assert_eq!(response.text(), "<!DOCTYPE html>");
        assert_eq!(response.bytes(), b"<!DOCTYPE html>".as_slice());
    }

    #[test]
    fn test_response_text_is_lossy() {
        let response = Response::new(StatusCode::OK, vec![0x68, 0x69, 0xff]);
        assert_eq!(response.text(), "hi\u{fffd}");
    }

    #[test]
    fn test_timeout_classification() {
        assert!(TransportError::Timeout("t".to_string()).is_timeout());
        assert!(!TransportError::Http("h".to_string()).is_timeout());
        assert!(!TransportError::Build("b".to_string()).is_timeout());
    }
}
