//! Application Context
//!
//! The shared instances every view talks through: one transport, one error
//! sink, one session. Built once at startup and passed around by reference
//! (or cloned; clones share the same instances).

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::config::Config;
use crate::operation::RemoteOperation;
use crate::session::{FileStore, LogNavigator, Navigator, Session, StorageError};
use crate::tracking::{install_panic_hook, ErrorBoundary, ErrorSink};
use crate::transport::{OperationDescriptor, Transport, TransportError};

/// Errors raised while wiring the context
#[derive(Error, Debug)]
pub enum ContextError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Shared client state for all remote operations
#[derive(Clone)]
pub struct AppContext {
    transport: Arc<Transport>,
    sink: Arc<ErrorSink>,
    session: Arc<Session>,
}

impl AppContext {
    /// Build the production wiring: file-backed storage, logging navigator,
    /// reqwest transport
    pub fn new(config: &Config) -> Result<Self, ContextError> {
        Self::with_navigator(config, Arc::new(LogNavigator::new()))
    }

    /// Like [`new`](Self::new) with a caller-supplied navigator
    pub fn with_navigator(config: &Config, navigator: Arc<dyn Navigator>) -> Result<Self, ContextError> {
        let storage = Arc::new(FileStore::open(PathBuf::from(&config.storage.path))?);
        let session = Arc::new(Session::new(storage, navigator));
        let sink = Arc::new(ErrorSink::new(config.sink_options()));
        let transport = Arc::new(Transport::new(config.transport.clone(), Arc::clone(&session))?);

        tracing::info!(
            base_url = %transport.base_url(),
            storage = %config.storage.path,
            "Client context ready"
        );

        Ok(Self::from_parts(transport, sink, session))
    }

    /// Assemble a context from already-built parts
    pub fn from_parts(transport: Arc<Transport>, sink: Arc<ErrorSink>, session: Arc<Session>) -> Self {
        Self {
            transport,
            sink,
            session,
        }
    }

    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    pub fn sink(&self) -> &Arc<ErrorSink> {
        &self.sink
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// A new operation wired to the shared transport and sink
    pub fn operation<T>(&self, descriptor: OperationDescriptor) -> RemoteOperation<T> {
        RemoteOperation::new(Arc::clone(&self.transport), Arc::clone(&self.sink), descriptor)
    }

    /// A render boundary reporting into the shared sink
    pub fn boundary(&self, component: impl Into<String>) -> ErrorBoundary {
        ErrorBoundary::new(Arc::clone(&self.sink), component)
    }

    /// Route panics into the shared sink
    pub fn install_panic_hook(&self) {
        install_panic_hook(Arc::clone(&self.sink));
    }
}
