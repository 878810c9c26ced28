//! Error Sink
//!
//! Bounded, newest-first log of [`ErrorRecord`]s shared by every remote
//! operation in the process. One instance is built at startup and handed out
//! as an `Arc`; it lives until the process exits.

use chrono::Utc;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::record::{ErrorCategory, ErrorRecord, NewErrorRecord};
use super::runtime::capture_stack;
use crate::transport::TransportError;

/// Default number of records retained
pub const DEFAULT_MAX_LOGS: usize = 100;

/// Options for the error sink
#[derive(Debug, Clone)]
pub struct SinkOptions {
    /// Maximum number of records kept; older ones are evicted
    pub capacity: usize,
    /// Mirror every record through `tracing::error!`
    pub mirror_to_console: bool,
}

impl Default for SinkOptions {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_MAX_LOGS,
            mirror_to_console: cfg!(debug_assertions),
        }
    }
}

/// Process-wide structured error log
#[derive(Debug)]
pub struct ErrorSink {
    records: Mutex<VecDeque<ErrorRecord>>,
    options: SinkOptions,
}

impl Default for ErrorSink {
    fn default() -> Self {
        Self::new(SinkOptions::default())
    }
}

impl ErrorSink {
    pub fn new(options: SinkOptions) -> Self {
        Self {
            records: Mutex::new(VecDeque::with_capacity(options.capacity.min(1024))),
            options,
        }
    }

    /// Maximum number of retained records
    pub fn capacity(&self) -> usize {
        self.options.capacity
    }

    /// Whether records are mirrored to the log output
    pub fn mirrors_to_console(&self) -> bool {
        self.options.mirror_to_console
    }

    fn records(&self) -> MutexGuard<'_, VecDeque<ErrorRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stamp and store a record at the head of the log
    ///
    /// Insertion and tail eviction happen under the same lock, so readers
    /// never observe more than `capacity` entries.
    pub fn log_error(&self, entry: NewErrorRecord) -> ErrorRecord {
        let record = entry.stamp(Utc::now());

        {
            let mut records = self.records();
            records.push_front(record.clone());
            records.truncate(self.options.capacity);
        }

        if self.options.mirror_to_console {
            tracing::error!(
                category = %record.category,
                component = record.component.as_deref().unwrap_or("-"),
                context = ?record.context,
                "Error logged: {}",
                record.message
            );
        }

        record
    }

    /// Record a failed remote call
    ///
    /// Context carries `status`, `url` (the resolved absolute address),
    /// `path` (the descriptor URL as the caller wrote it), `method` and
    /// `kind`. Missing values are `null`.
    pub fn handle_api_error(&self, error: &TransportError, component: Option<&str>) -> ErrorRecord {
        let mut entry = NewErrorRecord::new(ErrorCategory::Transport, error.display_message())
            .maybe_component(component)
            .context("status", error.status_code().map(Value::from).unwrap_or(Value::Null))
            .context("url", error.url().map(Value::from).unwrap_or(Value::Null))
            .context("path", error.path().map(Value::from).unwrap_or(Value::Null))
            .context(
                "method",
                error
                    .method()
                    .map(|m| Value::from(m.as_str()))
                    .unwrap_or(Value::Null),
            )
            .context("kind", error.kind().as_str());
        if let Some(stack) = capture_stack() {
            entry = entry.stack(stack);
        }

        self.log_error(entry)
    }

    /// Snapshot of the log, newest first
    pub fn get_logs(&self) -> Vec<ErrorRecord> {
        self.records().iter().cloned().collect()
    }

    /// Drop every record
    pub fn clear_logs(&self) {
        self.records().clear();
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }
}
