//! Interceptor pipeline
//!
//! Ordered request and response steps wrapped around every dispatch.
//!
//! - Request steps run in order; the first error short-circuits the rest and
//!   the dispatch, and is then handed to the response stage as a failure.
//! - Response steps see either the response or the error. A step that
//!   rejects a response switches the remaining steps onto the failure path.

use reqwest::header::{HeaderValue, AUTHORIZATION};
use std::sync::Arc;

use super::client::{PreparedRequest, Response};
use super::error::TransportError;
use crate::session::Session;

/// Step applied to an outgoing request
pub trait RequestInterceptor: Send + Sync {
    fn name(&self) -> &str;

    fn on_request(&self, request: PreparedRequest) -> Result<PreparedRequest, TransportError>;
}

/// Step applied to an incoming outcome
pub trait ResponseInterceptor: Send + Sync {
    fn name(&self) -> &str;

    fn on_response(&self, response: Response) -> Result<Response, TransportError> {
        Ok(response)
    }

    fn on_error(&self, error: TransportError) -> TransportError {
        error
    }
}

/// Ordered interceptor stages
#[derive(Clone, Default)]
pub struct InterceptorPipeline {
    request: Vec<Arc<dyn RequestInterceptor>>,
    response: Vec<Arc<dyn ResponseInterceptor>>,
}

impl InterceptorPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bearer token injection plus forced logout on 401
    pub fn standard(session: Arc<Session>) -> Self {
        Self::new()
            .with_request(Arc::new(AuthInterceptor::new(Arc::clone(&session))))
            .with_response(Arc::new(UnauthorizedInterceptor::new(session)))
    }

    pub fn with_request(mut self, step: Arc<dyn RequestInterceptor>) -> Self {
        self.request.push(step);
        self
    }

    pub fn with_response(mut self, step: Arc<dyn ResponseInterceptor>) -> Self {
        self.response.push(step);
        self
    }

    pub fn request_steps(&self) -> Vec<&str> {
        self.request.iter().map(|s| s.name()).collect()
    }

    pub fn response_steps(&self) -> Vec<&str> {
        self.response.iter().map(|s| s.name()).collect()
    }

    pub fn run_request(&self, request: PreparedRequest) -> Result<PreparedRequest, TransportError> {
        self.request
            .iter()
            .try_fold(request, |request, step| step.on_request(request))
    }

    pub fn run_response(
        &self,
        outcome: Result<Response, TransportError>,
    ) -> Result<Response, TransportError> {
        self.response
            .iter()
            .fold(outcome, |outcome, step| match outcome {
                Ok(response) => step.on_response(response),
                Err(error) => Err(step.on_error(error)),
            })
    }
}

/// Attaches `Authorization: Bearer <token>` when a token is stored
pub struct AuthInterceptor {
    session: Arc<Session>,
}

impl AuthInterceptor {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}

impl RequestInterceptor for AuthInterceptor {
    fn name(&self) -> &str {
        "auth"
    }

    fn on_request(&self, mut request: PreparedRequest) -> Result<PreparedRequest, TransportError> {
        if let Some(token) = self.session.token() {
            match HeaderValue::from_str(&format!("Bearer {}", token)) {
                Ok(value) => {
                    request.headers.insert(AUTHORIZATION, value);
                }
                Err(_) => {
                    tracing::warn!("Stored token is not a valid header value, sending unauthenticated");
                }
            }
        }
        Ok(request)
    }
}

/// Forces a logout when the backend answers 401
pub struct UnauthorizedInterceptor {
    session: Arc<Session>,
}

impl UnauthorizedInterceptor {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}

impl ResponseInterceptor for UnauthorizedInterceptor {
    fn name(&self) -> &str {
        "unauthorized"
    }

    fn on_error(&self, error: TransportError) -> TransportError {
        if error.is_unauthorized() {
            tracing::warn!(
                url = error.url().unwrap_or("-"),
                "Session rejected by backend, logging out"
            );
            self.session.force_logout();
        }
        error
    }
}
