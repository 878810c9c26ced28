//! Transport
//!
//! The shared HTTP client every remote operation rides on.
//!
//! ## Pipeline
//!
//! ```text
//! descriptor ─► resolve URL + default headers ─► request interceptors (auth)
//!            ─► exchange (timeout-bounded) ─► status check
//!            ─► response interceptors (401 → forced logout) ─► Response | TransportError
//! ```

mod client;
mod descriptor;
mod error;
mod interceptor;

pub use client::{parse_body, Exchange, HttpExchange, PreparedRequest, Response, Transport};
pub use descriptor::{DescriptorOverride, Method, OperationDescriptor};
pub use error::{TransportError, TransportErrorKind, UNAUTHORIZED};
pub use interceptor::{
    AuthInterceptor, InterceptorPipeline, RequestInterceptor, ResponseInterceptor,
    UnauthorizedInterceptor,
};

#[cfg(test)]
pub(crate) use client::testing;
