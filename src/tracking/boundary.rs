//! Presentation error boundary
//!
//! Wraps view rendering so that a failing view is recorded under
//! [`ErrorCategory::Presentation`] instead of tearing down the caller.

use std::sync::Arc;
use thiserror::Error;

use super::record::{ErrorCategory, ErrorRecord, NewErrorRecord};
use super::runtime::{capture_stack, catch_in_boundary, panic_message};
use super::sink::ErrorSink;

/// A view that failed to render
#[derive(Debug, Clone, Error)]
#[error("render failed in {component}: {message}")]
pub struct BoundaryError {
    pub component: String,
    pub message: String,
}

/// Catches render failures for one named component
pub struct ErrorBoundary {
    sink: Arc<ErrorSink>,
    component: String,
}

impl ErrorBoundary {
    pub fn new(sink: Arc<ErrorSink>, component: impl Into<String>) -> Self {
        Self {
            sink,
            component: component.into(),
        }
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    /// Run a render closure, recording a panic as a presentation error
    ///
    /// The panic is recorded once, here; an installed panic hook skips it.
    pub fn render<R>(&self, view: impl FnOnce() -> R) -> Result<R, BoundaryError> {
        catch_in_boundary(view).map_err(|(payload, stack)| {
            let message = panic_message(payload.as_ref());
            let mut entry = NewErrorRecord::new(ErrorCategory::Presentation, message.clone())
                .component(self.component.clone());
            if let Some(stack) = stack {
                entry = entry.stack(stack);
            }
            self.sink.log_error(entry);
            BoundaryError {
                component: self.component.clone(),
                message,
            }
        })
    }

    /// Render, substituting `fallback` when the view fails
    pub fn render_or<R>(&self, fallback: R, view: impl FnOnce() -> R) -> R {
        self.render(view).unwrap_or(fallback)
    }

    /// Record a render error that was returned rather than raised
    pub fn report(
        &self,
        error: &dyn std::error::Error,
        component_stack: Option<&str>,
    ) -> ErrorRecord {
        let mut entry = NewErrorRecord::new(ErrorCategory::Presentation, error.to_string())
            .component(self.component.clone());
        if let Some(stack) = component_stack {
            entry = entry.context("component_stack", stack);
        }
        if let Some(stack) = capture_stack() {
            entry = entry.stack(stack);
        }
        self.sink.log_error(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::{install_panic_hook, SinkOptions};
    use std::backtrace::{Backtrace, BacktraceStatus};

    fn boundary() -> (ErrorBoundary, Arc<ErrorSink>) {
        let sink = Arc::new(ErrorSink::new(SinkOptions {
            capacity: 10,
            mirror_to_console: false,
        }));
        (ErrorBoundary::new(Arc::clone(&sink), "RevenueChart"), sink)
    }

    #[test]
    fn test_successful_render_is_not_logged() {
        let (boundary, sink) = boundary();
        let html = boundary.render(|| "<svg/>".to_string()).unwrap();
        assert_eq!(html, "<svg/>");
        assert!(sink.is_empty());
    }

    #[test]
    fn test_panicking_render_is_recorded() {
        let (boundary, sink) = boundary();

        let err = boundary
            .render(|| -> String { panic!("series is empty") })
            .unwrap_err();

        assert_eq!(err.component, "RevenueChart");
        assert_eq!(err.message, "series is empty");
        let logs = sink.get_logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].category, ErrorCategory::Presentation);
        assert_eq!(logs[0].component.as_deref(), Some("RevenueChart"));
    }

    #[test]
    fn test_render_panic_logged_once_with_hook_installed() {
        let (boundary, sink) = boundary();
        install_panic_hook(Arc::clone(&sink));

        let err = boundary
            .render(|| -> u32 { panic!("axis range is inverted") })
            .unwrap_err();
        assert_eq!(err.message, "axis range is inverted");

        let ours: Vec<_> = sink
            .get_logs()
            .into_iter()
            .filter(|r| r.message == "axis range is inverted")
            .collect();
        assert_eq!(ours.len(), 1);
        assert_eq!(ours[0].category, ErrorCategory::Presentation);
        let backtraces_on = Backtrace::capture().status() == BacktraceStatus::Captured;
        assert_eq!(ours[0].stack.is_some(), backtraces_on);
    }

    #[test]
    fn test_render_or_uses_fallback() {
        let (boundary, _sink) = boundary();
        let out = boundary.render_or("fallback", || panic!("nope"));
        assert_eq!(out, "fallback");
    }

    #[test]
    fn test_report_keeps_component_stack() {
        let (boundary, sink) = boundary();
        let io = std::io::Error::new(std::io::ErrorKind::Other, "font missing");

        boundary.report(&io, Some("Dashboard > RevenueChart"));

        let logs = sink.get_logs();
        assert_eq!(logs[0].message, "font missing");
        assert_eq!(
            logs[0].context_value("component_stack"),
            Some(&serde_json::json!("Dashboard > RevenueChart"))
        );
    }
}
