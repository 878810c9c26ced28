//! Operation descriptors
//!
//! What to call: method, path, body, headers and query parameters.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// HTTP verb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            "HEAD" => Ok(Method::Head),
            "OPTIONS" => Ok(Method::Options),
            other => Err(format!("unsupported HTTP method: {}", other)),
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
            Method::Head => reqwest::Method::HEAD,
            Method::Options => reqwest::Method::OPTIONS,
        }
    }
}

/// One remote call
///
/// `url` is normally a path relative to the transport's base address;
/// absolute `http(s)://` URLs are sent as-is.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OperationDescriptor {
    pub url: String,
    pub method: Method,
    pub body: Option<Value>,
    pub headers: BTreeMap<String, String>,
    pub params: BTreeMap<String, String>,
}

impl OperationDescriptor {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            ..Default::default()
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::Put, url)
    }

    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(Method::Patch, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::Delete, url)
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Serialize `payload` as the JSON body
    pub fn json<B: Serialize + ?Sized>(self, payload: &B) -> Result<Self, serde_json::Error> {
        Ok(self.body(serde_json::to_value(payload)?))
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Apply a per-call override; every field present in `overrides` wins
    ///
    /// The merge is shallow: an override's header map replaces the base
    /// header map instead of being combined with it (same for params).
    pub fn merge(&self, overrides: &DescriptorOverride) -> OperationDescriptor {
        OperationDescriptor {
            url: overrides.url.clone().unwrap_or_else(|| self.url.clone()),
            method: overrides.method.unwrap_or(self.method),
            body: overrides.body.clone().or_else(|| self.body.clone()),
            headers: overrides
                .headers
                .clone()
                .unwrap_or_else(|| self.headers.clone()),
            params: overrides
                .params
                .clone()
                .unwrap_or_else(|| self.params.clone()),
        }
    }
}

/// Partial descriptor supplied to a single `execute`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DescriptorOverride {
    pub url: Option<String>,
    pub method: Option<Method>,
    pub body: Option<Value>,
    pub headers: Option<BTreeMap<String, String>>,
    pub params: Option<BTreeMap<String, String>>,
}

impl DescriptorOverride {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn json<B: Serialize + ?Sized>(self, payload: &B) -> Result<Self, serde_json::Error> {
        Ok(self.body(serde_json::to_value(payload)?))
    }

    pub fn headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = Some(headers);
        self
    }

    pub fn params(mut self, params: BTreeMap<String, String>) -> Self {
        self.params = Some(params);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
