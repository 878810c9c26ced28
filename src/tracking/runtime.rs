//! Runtime error capture
//!
//! Routes panics and failed background tasks into the [`ErrorSink`] with
//! category [`ErrorCategory::Runtime`].

use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe, Location};
use std::sync::Arc;
use tokio::task::JoinHandle;

use super::record::{ErrorCategory, NewErrorRecord};
use super::sink::ErrorSink;

/// Message recorded for a tracked task that resolved to an error
pub const UNHANDLED_REJECTION: &str = "Unhandled Promise Rejection";

thread_local! {
    /// Nesting depth of render boundaries on this thread
    static BOUNDARY_DEPTH: Cell<usize> = const { Cell::new(0) };
    /// Backtrace of the last panic raised inside a boundary
    static BOUNDARY_STACK: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Install a process-wide panic hook that records every uncaught panic
///
/// Panics raised inside an [`ErrorBoundary`](super::ErrorBoundary) render are
/// left to the boundary. The previously installed hook still runs
/// afterwards, so the default stderr report is kept.
pub fn install_panic_hook(sink: Arc<ErrorSink>) {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        if inside_boundary() {
            BOUNDARY_STACK.with(|stack| *stack.borrow_mut() = capture_stack());
        } else {
            sink.log_error(panic_record(info.payload(), info.location()));
        }
        previous(info);
    }));
}

fn inside_boundary() -> bool {
    BOUNDARY_DEPTH.with(|depth| depth.get() > 0)
}

/// Run `view` under `catch_unwind` with this thread marked as inside a
/// boundary
///
/// On panic, returns the payload together with the panic-site backtrace when
/// a hook captured one, else a backtrace of the catching frame.
pub(crate) fn catch_in_boundary<R>(
    view: impl FnOnce() -> R,
) -> Result<R, (Box<dyn Any + Send>, Option<String>)> {
    BOUNDARY_DEPTH.with(|depth| depth.set(depth.get() + 1));
    let result = panic::catch_unwind(AssertUnwindSafe(view));
    BOUNDARY_DEPTH.with(|depth| depth.set(depth.get() - 1));

    result.map_err(|payload| {
        let stack = BOUNDARY_STACK
            .with(|stack| stack.borrow_mut().take())
            .or_else(capture_stack);
        (payload, stack)
    })
}

/// Render a backtrace of the caller when backtraces are enabled
/// (`RUST_BACKTRACE` / `RUST_LIB_BACKTRACE`)
pub(crate) fn capture_stack() -> Option<String> {
    stack_text(&Backtrace::capture())
}

fn stack_text(backtrace: &Backtrace) -> Option<String> {
    match backtrace.status() {
        BacktraceStatus::Captured => Some(backtrace.to_string()),
        _ => None,
    }
}

/// Build the record for a panic payload
pub fn panic_record(payload: &(dyn Any + Send), location: Option<&Location<'_>>) -> NewErrorRecord {
    let mut entry = NewErrorRecord::new(ErrorCategory::Runtime, panic_message(payload));

    if let Some(location) = location {
        entry = entry
            .context("source", location.file())
            .context("lineno", location.line())
            .context("colno", location.column());
    }

    if let Some(stack) = capture_stack() {
        entry = entry.stack(stack);
    }

    entry
}

/// Extract a readable message from a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

/// Spawn a fallible task whose error outcome is recorded instead of dropped
///
/// Resolves to `Some(value)` on success and `None` when the task failed.
pub fn spawn_tracked<F, T, E>(sink: Arc<ErrorSink>, task: F) -> JoinHandle<Option<T>>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: fmt::Display + Send + 'static,
{
    tokio::spawn(async move {
        match task.await {
            Ok(value) => Some(value),
            Err(e) => {
                sink.log_error(
                    NewErrorRecord::new(ErrorCategory::Runtime, UNHANDLED_REJECTION)
                        .context("reason", e.to_string()),
                );
                None
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::SinkOptions;
    use serde_json::json;

    fn quiet_sink() -> Arc<ErrorSink> {
        Arc::new(ErrorSink::new(SinkOptions {
            capacity: 100,
            mirror_to_console: false,
        }))
    }

    #[test]
    fn test_panic_message_variants() {
        let static_str: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(static_str.as_ref()), "static");

        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(owned.as_ref()), "owned");

        let other: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(other.as_ref()), "panic with non-string payload");
    }

    #[test]
    fn test_panic_record_carries_location() {
        let payload: Box<dyn Any + Send> = Box::new("bad index");
        let location = Location::caller();

        let entry = panic_record(payload.as_ref(), Some(location));

        assert_eq!(entry.category, ErrorCategory::Runtime);
        assert_eq!(entry.message, "bad index");
        let ctx = entry.context.unwrap();
        assert_eq!(ctx.get("source"), Some(&json!(location.file())));
        assert_eq!(ctx.get("lineno"), Some(&json!(location.line())));
    }

    #[test]
    fn test_installed_hook_records_panics() {
        let sink = quiet_sink();
        install_panic_hook(Arc::clone(&sink));

        let result = std::panic::catch_unwind(|| {
            panic!("hook test panic");
        });
        assert!(result.is_err());

        assert!(sink
            .get_logs()
            .iter()
            .any(|r| r.category == ErrorCategory::Runtime && r.message == "hook test panic"));
    }

    #[test]
    fn test_stack_text_only_for_captured_backtraces() {
        assert!(stack_text(&Backtrace::force_capture()).is_some());
        assert_eq!(stack_text(&Backtrace::disabled()), None);
    }

    #[test]
    fn test_hook_leaves_boundary_panics_alone() {
        let sink = quiet_sink();
        install_panic_hook(Arc::clone(&sink));

        let caught = catch_in_boundary(|| panic!("caught by boundary"));
        assert!(caught.is_err());
        assert!(!inside_boundary());
        assert!(!sink.get_logs().iter().any(|r| r.message == "caught by boundary"));

        // the thread is unmarked again once the boundary returns
        let result = std::panic::catch_unwind(|| panic!("outside any boundary"));
        assert!(result.is_err());
        assert!(sink
            .get_logs()
            .iter()
            .any(|r| r.category == ErrorCategory::Runtime && r.message == "outside any boundary"));
    }

    #[tokio::test]
    async fn test_spawn_tracked_records_failure() {
        let sink = quiet_sink();

        let outcome = spawn_tracked(Arc::clone(&sink), async { Err::<(), _>("disk full") })
            .await
            .unwrap();

        assert!(outcome.is_none());
        let logs = sink.get_logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].message, UNHANDLED_REJECTION);
        assert_eq!(logs[0].context_value("reason"), Some(&json!("disk full")));
    }

    #[tokio::test]
    async fn test_spawn_tracked_passes_success_through() {
        let sink = quiet_sink();

        let outcome = spawn_tracked(Arc::clone(&sink), async { Ok::<_, String>(7) })
            .await
            .unwrap();

        assert_eq!(outcome, Some(7));
        assert!(sink.is_empty());
    }
}
