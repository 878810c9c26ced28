//! Shared HTTP transport
//!
//! One [`Transport`] per process: fixed base address, timeout and default
//! headers, an interceptor pipeline, and a pluggable [`Exchange`] that puts
//! bytes on the wire (reqwest in production).

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::descriptor::{Method, OperationDescriptor};
use super::error::TransportError;
use super::interceptor::InterceptorPipeline;
use crate::config::TransportConfig;
use crate::session::Session;

/// A request after URL resolution and header merging
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl PreparedRequest {
    /// Header value as a string, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// A settled call
///
/// The transport yields `Response<Value>`; typed operations decode it into
/// `Response<T>`.
#[derive(Debug, Clone)]
pub struct Response<T = Value> {
    pub data: T,
    pub status: u16,
    pub headers: HeaderMap,
}

impl Response<Value> {
    pub fn decode<T: DeserializeOwned>(self) -> Result<Response<T>, TransportError> {
        let data = serde_json::from_value(self.data).map_err(TransportError::decode)?;
        Ok(Response {
            data,
            status: self.status,
            headers: self.headers,
        })
    }
}

/// Sends one prepared request and returns whatever the backend answered
///
/// Implementations report every HTTP status as `Ok`; status classification
/// happens in [`Transport`].
#[async_trait]
pub trait Exchange: Send + Sync {
    async fn send(&self, request: PreparedRequest) -> Result<Response, TransportError>;
}

/// reqwest-backed exchange
pub struct HttpExchange {
    client: reqwest::Client,
    timeout_ms: u64,
}

impl HttpExchange {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(TransportError::network)?;

        Ok(Self {
            client,
            timeout_ms: timeout.as_millis() as u64,
        })
    }
}

#[async_trait]
impl Exchange for HttpExchange {
    async fn send(&self, request: PreparedRequest) -> Result<Response, TransportError> {
        let mut builder = self
            .client
            .request(request.method.into(), &request.url)
            .headers(request.headers);

        if let Some(body) = &request.body {
            let bytes = serde_json::to_vec(body).map_err(TransportError::invalid_request)?;
            builder = builder.body(bytes);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::timeout(self.timeout_ms)
            } else {
                TransportError::network(e)
            }
        })?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::timeout(self.timeout_ms)
            } else {
                TransportError::network(e)
            }
        })?;

        Ok(Response {
            data: parse_body(&bytes),
            status,
            headers,
        })
    }
}

/// Empty bodies become `null`; non-JSON text is kept as a JSON string
pub fn parse_body(bytes: &[u8]) -> Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

/// The single configured client for all remote calls
pub struct Transport {
    config: TransportConfig,
    default_headers: HeaderMap,
    exchange: Arc<dyn Exchange>,
    pipeline: InterceptorPipeline,
}

impl Transport {
    /// Build the production transport: reqwest exchange plus the standard
    /// auth/unauthorized pipeline bound to `session`
    pub fn new(config: TransportConfig, session: Arc<Session>) -> Result<Self, TransportError> {
        let exchange = Arc::new(HttpExchange::new(config.timeout())?);
        Self::with_exchange(config, exchange, InterceptorPipeline::standard(session))
    }

    /// Build a transport over a custom exchange and pipeline
    pub fn with_exchange(
        config: TransportConfig,
        exchange: Arc<dyn Exchange>,
        pipeline: InterceptorPipeline,
    ) -> Result<Self, TransportError> {
        let mut default_headers = HeaderMap::new();
        for (name, value) in &config.default_headers {
            let (name, value) = parse_header(name, value)?;
            default_headers.insert(name, value);
        }

        tracing::debug!(
            base_url = %config.base_url,
            timeout_ms = config.timeout_ms,
            "Transport configured"
        );

        Ok(Self {
            config,
            default_headers,
            exchange,
            pipeline,
        })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.config.timeout()
    }

    pub fn pipeline(&self) -> &InterceptorPipeline {
        &self.pipeline
    }

    /// Absolute URL for a descriptor, query string included
    pub fn resolve_url(&self, descriptor: &OperationDescriptor) -> String {
        let mut url = if descriptor.url.starts_with("http://") || descriptor.url.starts_with("https://") {
            descriptor.url.clone()
        } else if descriptor.url.is_empty() {
            self.config.base_url.clone()
        } else {
            format!(
                "{}/{}",
                self.config.base_url.trim_end_matches('/'),
                descriptor.url.trim_start_matches('/')
            )
        };

        if !descriptor.params.is_empty() {
            let query = descriptor
                .params
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect::<Vec<_>>()
                .join("&");
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str(&query);
        }

        url
    }

    fn prepare(&self, descriptor: &OperationDescriptor, url: String) -> Result<PreparedRequest, TransportError> {
        let mut headers = self.default_headers.clone();
        for (name, value) in &descriptor.headers {
            let (name, value) = parse_header(name, value)?;
            headers.insert(name, value);
        }

        Ok(PreparedRequest {
            method: descriptor.method,
            url,
            headers,
            body: descriptor.body.clone(),
        })
    }

    /// Execute a descriptor through the pipeline
    ///
    /// Non-2xx answers, network failures and timeouts all come back as
    /// `Err`. Nothing is retried.
    pub async fn call(&self, descriptor: &OperationDescriptor) -> Result<Response, TransportError> {
        let method = descriptor.method;
        let url = self.resolve_url(descriptor);

        let outcome = match self
            .prepare(descriptor, url.clone())
            .and_then(|request| self.pipeline.run_request(request))
        {
            Ok(request) => self.dispatch(request).await,
            Err(e) => Err(e),
        };

        let outcome = outcome.map_err(|e| {
            let e = e.with_request_if_missing(&url, method);
            if e.path().is_none() {
                e.with_path(descriptor.url.clone())
            } else {
                e
            }
        });
        let outcome = self.pipeline.run_response(outcome);

        match &outcome {
            Ok(response) => {
                tracing::debug!(%method, %url, status = response.status, "Request completed")
            }
            Err(e) => tracing::debug!(%method, %url, status = ?e.status_code(), "Request failed: {}", e),
        }

        outcome
    }

    async fn dispatch(&self, request: PreparedRequest) -> Result<Response, TransportError> {
        tracing::debug!(method = %request.method, url = %request.url, "Dispatching request");

        let response = tokio::time::timeout(self.timeout(), self.exchange.send(request))
            .await
            .map_err(|_| TransportError::timeout(self.config.timeout_ms))??;

        if (200..300).contains(&response.status) {
            Ok(response)
        } else {
            Err(TransportError::status(response.status, Some(response.data)))
        }
    }
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), TransportError> {
    let header_name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| TransportError::invalid_request(format!("header name {:?}: {}", name, e)))?;
    let header_value = HeaderValue::from_str(value)
        .map_err(|e| TransportError::invalid_request(format!("header {:?}: {}", name, e)))?;
    Ok((header_name, header_value))
}
