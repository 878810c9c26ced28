//! Error Tracking
//!
//! Centralized, bounded log of structured error records.
//!
//! ## Architecture
//!
//! - **ErrorSink**: newest-first log with a fixed capacity
//! - **Runtime capture**: panic hook and tracked task spawning
//! - **ErrorBoundary**: records view render failures
//!
//! Remote operations report failed calls through
//! [`ErrorSink::handle_api_error`]; everything else goes through
//! [`ErrorSink::log_error`].

mod boundary;
mod record;
mod runtime;
mod sink;

pub use boundary::{BoundaryError, ErrorBoundary};
pub use record::{ErrorCategory, ErrorRecord, NewErrorRecord};
pub use runtime::{install_panic_hook, panic_message, panic_record, spawn_tracked, UNHANDLED_REJECTION};
pub use sink::{ErrorSink, SinkOptions, DEFAULT_MAX_LOGS};
