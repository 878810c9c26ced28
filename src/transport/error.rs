//! Transport error type
//!
//! Every failed call surfaces as a [`TransportError`]: non-2xx responses,
//! network failures, timeouts, and payloads that do not decode.

use serde_json::Value;
use thiserror::Error;

use super::descriptor::Method;

/// Status code that forces a logout
pub const UNAUTHORIZED: u16 = 401;

/// Failure classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connection refused, DNS failure, broken body stream
    Network,
    /// The fixed per-call timeout elapsed
    Timeout,
    /// The backend answered with a non-2xx status
    Status,
    /// A 2xx payload did not match the expected type
    Decode,
    /// The descriptor could not be turned into a request
    InvalidRequest,
    /// A pipeline step rejected the call
    Interceptor,
}

impl TransportErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportErrorKind::Network => "network",
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Status => "status",
            TransportErrorKind::Decode => "decode",
            TransportErrorKind::InvalidRequest => "invalid_request",
            TransportErrorKind::Interceptor => "interceptor",
        }
    }
}

/// A rejected remote call
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
    status: Option<u16>,
    body: Option<Value>,
    url: Option<String>,
    path: Option<String>,
    method: Option<Method>,
}

impl TransportError {
    fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            body: None,
            url: None,
            path: None,
            method: None,
        }
    }

    pub fn network(detail: impl std::fmt::Display) -> Self {
        Self::new(TransportErrorKind::Network, format!("Network Error: {}", detail))
    }

    pub fn timeout(timeout_ms: u64) -> Self {
        Self::new(
            TransportErrorKind::Timeout,
            format!("timeout of {}ms exceeded", timeout_ms),
        )
    }

    /// A non-2xx response; `body` is the parsed response payload, if any
    pub fn status(status: u16, body: Option<Value>) -> Self {
        let mut err = Self::new(
            TransportErrorKind::Status,
            format!("Request failed with status code {}", status),
        );
        err.status = Some(status);
        err.body = body.filter(|b| !b.is_null());
        err
    }

    pub fn decode(detail: impl std::fmt::Display) -> Self {
        Self::new(
            TransportErrorKind::Decode,
            format!("Failed to decode response: {}", detail),
        )
    }

    pub fn invalid_request(detail: impl std::fmt::Display) -> Self {
        Self::new(
            TransportErrorKind::InvalidRequest,
            format!("Invalid request: {}", detail),
        )
    }

    pub fn interceptor(name: &str, detail: impl std::fmt::Display) -> Self {
        Self::new(
            TransportErrorKind::Interceptor,
            format!("Interceptor {} rejected the call: {}", name, detail),
        )
    }

    /// Attach the request target
    pub fn with_request(mut self, url: impl Into<String>, method: Method) -> Self {
        self.url = Some(url.into());
        self.method = Some(method);
        self
    }

    /// Attach the descriptor URL as written by the caller, before it was
    /// resolved against the base address
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub(crate) fn with_request_if_missing(self, url: &str, method: Method) -> Self {
        if self.url.is_some() {
            self
        } else {
            self.with_request(url, method)
        }
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    /// The transport's own generic message
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn method(&self) -> Option<Method> {
        self.method
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == Some(UNAUTHORIZED)
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == TransportErrorKind::Timeout
    }

    /// The `message` string field of the response body, when there is one
    pub fn body_message(&self) -> Option<&str> {
        self.body
            .as_ref()
            .and_then(|b| b.get("message"))
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
    }

    /// Human-readable text for display: the body's `message`, falling back to
    /// the generic transport message
    pub fn display_message(&self) -> String {
        self.body_message()
            .map(str::to_string)
            .unwrap_or_else(|| self.message.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_error_prefers_body_message() {
        let err = TransportError::status(400, Some(json!({"message": "API Error"})));
        assert_eq!(err.status_code(), Some(400));
        assert_eq!(err.display_message(), "API Error");
        assert_eq!(err.to_string(), "Request failed with status code 400");
    }

    #[test]
    fn test_status_error_without_message_field() {
        let err = TransportError::status(500, Some(json!({"detail": "boom"})));
        assert_eq!(err.display_message(), "Request failed with status code 500");

        let err = TransportError::status(502, Some(json!("Bad Gateway")));
        assert_eq!(err.display_message(), "Request failed with status code 502");
    }

    #[test]
    fn test_null_body_is_dropped() {
        let err = TransportError::status(404, Some(Value::Null));
        assert!(err.body().is_none());
    }

    #[test]
    fn test_unauthorized_detection() {
        assert!(TransportError::status(401, None).is_unauthorized());
        assert!(!TransportError::status(403, None).is_unauthorized());
        assert!(!TransportError::network("refused").is_unauthorized());
    }

    #[test]
    fn test_request_context_is_not_overwritten() {
        let err = TransportError::timeout(10_000)
            .with_request("http://a/one", Method::Get)
            .with_request_if_missing("http://a/two", Method::Post);
        assert_eq!(err.url(), Some("http://a/one"));
        assert_eq!(err.method(), Some(Method::Get));
        assert!(err.is_timeout());
    }
}
