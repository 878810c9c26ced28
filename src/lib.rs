//! # Finboard
//!
//! Typed remote operations for the Finboard dashboard: a shared HTTP
//! transport with auth-token injection and forced logout on 401, lifecycle
//! tracking per operation, and a centralized error log.
//!
//! ## Modules
//!
//! - [`transport`]: Shared client, descriptors, interceptor pipeline
//! - [`operation`]: `RemoteOperation<T>` with `{data, loading, error}` state
//! - [`tracking`]: Bounded error sink, panic capture, render boundary
//! - [`session`]: Bearer token storage and navigation capability
//! - [`context`]: One-stop wiring of the shared instances
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use finboard::{AppContext, Config, OperationDescriptor};
//!
//! #[derive(Clone, serde::Deserialize)]
//! struct Summary {
//!     balance: f64,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ctx = AppContext::new(&Config::load_default())?;
//!
//!     let summary = ctx
//!         .operation::<Summary>(OperationDescriptor::get("/api/summary"))
//!         .with_component("Dashboard");
//!
//!     match summary.execute().await {
//!         Ok(response) => println!("balance: {}", response.data.balance),
//!         Err(_) => println!("failed: {:?}", summary.error()),
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod context;
pub mod operation;
pub mod session;
pub mod tracking;
pub mod transport;

pub use config::{Config, ConfigError, Environment, LoggingConfig, TrackingConfig, TransportConfig};
pub use context::{AppContext, ContextError};
pub use operation::{OperationState, OverlapPolicy, Phase, RemoteOperation};
pub use session::{
    FileStore, KeyValueStore, LogNavigator, MemoryStore, Navigator, RecordingNavigator, Session,
    StorageError, LOGIN_ROUTE, TOKEN_KEY,
};
pub use tracking::{ErrorBoundary, ErrorCategory, ErrorRecord, ErrorSink, NewErrorRecord, SinkOptions};
pub use transport::{
    DescriptorOverride, Exchange, InterceptorPipeline, Method, OperationDescriptor, Response,
    Transport, TransportError, TransportErrorKind,
};
