//! Remote Operation
//!
//! A reusable, stateful wrapper around one logical remote call. Views hold a
//! `RemoteOperation<T>`, call [`execute`](RemoteOperation::execute), and render
//! from [`state`](RemoteOperation::state).

use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::state::{OperationState, Phase};
use crate::tracking::ErrorSink;
use crate::transport::{DescriptorOverride, OperationDescriptor, Response, Transport, TransportError};

/// How settlements of overlapping `execute` calls are applied to the state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapPolicy {
    /// Every settlement writes the state; the last one to settle wins
    #[default]
    LastSettled,
    /// Only the most recently dispatched call may write the state; earlier
    /// calls still resolve for their caller and still report failures
    LatestDispatched,
}

/// Tracks `{data, loading, error}` for one operation shape
pub struct RemoteOperation<T> {
    transport: Arc<Transport>,
    sink: Arc<ErrorSink>,
    descriptor: OperationDescriptor,
    component: Option<String>,
    policy: OverlapPolicy,
    state: Mutex<OperationState<T>>,
    dispatched: AtomicU64,
}

impl<T> RemoteOperation<T> {
    pub fn new(transport: Arc<Transport>, sink: Arc<ErrorSink>, descriptor: OperationDescriptor) -> Self {
        Self {
            transport,
            sink,
            descriptor,
            component: None,
            policy: OverlapPolicy::default(),
            state: Mutex::new(OperationState::idle()),
            dispatched: AtomicU64::new(0),
        }
    }

    /// Name of the calling view, attached to reported failures
    pub fn with_component(mut self, name: impl Into<String>) -> Self {
        self.component = Some(name.into());
        self
    }

    pub fn with_overlap_policy(mut self, policy: OverlapPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn descriptor(&self) -> &OperationDescriptor {
        &self.descriptor
    }

    pub fn component(&self) -> Option<&str> {
        self.component.as_deref()
    }

    pub fn overlap_policy(&self) -> OverlapPolicy {
        self.policy
    }

    fn lock_state(&self) -> MutexGuard<'_, OperationState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn loading(&self) -> bool {
        self.lock_state().loading
    }

    pub fn error(&self) -> Option<String> {
        self.lock_state().error.clone()
    }

    pub fn phase(&self) -> Phase {
        self.lock_state().phase()
    }

    /// Return to idle. Calls already in flight are not cancelled and will
    /// still write their settlement.
    pub fn reset(&self) {
        *self.lock_state() = OperationState::idle();
    }

    /// Undo the pending transition of a call whose future was dropped
    /// before it settled
    ///
    /// Only the latest dispatch owns the pending state, and only while
    /// nothing else has settled it since.
    fn abandon(&self, ticket: u64, previous: OperationState<T>) {
        let mut state = self.lock_state();
        if state.loading && self.dispatched.load(Ordering::SeqCst) == ticket {
            *state = previous;
            tracing::debug!(
                ticket,
                component = self.component.as_deref().unwrap_or("-"),
                "Call dropped before settling, restored previous state"
            );
        }
    }

    fn may_apply(&self, ticket: u64) -> bool {
        match self.policy {
            OverlapPolicy::LastSettled => true,
            OverlapPolicy::LatestDispatched => self.dispatched.load(Ordering::SeqCst) == ticket,
        }
    }
}

impl<T: Clone> RemoteOperation<T> {
    /// Snapshot of the current state
    pub fn state(&self) -> OperationState<T> {
        self.lock_state().clone()
    }

    /// Mark the operation pending and hand out a dispatch ticket, along with
    /// the state it replaced
    fn begin(&self) -> (u64, OperationState<T>) {
        let ticket = self.dispatched.fetch_add(1, Ordering::SeqCst) + 1;
        let mut state = self.lock_state();
        let previous = state.clone();
        state.begin();
        (ticket, previous)
    }

    pub fn data(&self) -> Option<T> {
        self.lock_state().data.clone()
    }
}

impl<T: DeserializeOwned + Clone> RemoteOperation<T> {
    /// Run the operation with its base descriptor
    ///
    /// See [`execute_with`](Self::execute_with).
    pub fn execute(&self) -> impl Future<Output = Result<Response<T>, TransportError>> + '_ {
        self.execute_with(DescriptorOverride::default())
    }

    /// Run the operation with `overrides` merged over the base descriptor
    ///
    /// The state turns pending as soon as this is called, before the
    /// returned future is first polled. On failure the error is stored as
    /// a display message, reported to the error sink, and returned.
    ///
    /// Dropping the future before it completes (a caller-side timeout, a
    /// losing `select!` branch) restores the state held before the call,
    /// unless a newer call has been dispatched since.
    pub fn execute_with(
        &self,
        overrides: DescriptorOverride,
    ) -> impl Future<Output = Result<Response<T>, TransportError>> + '_ {
        let descriptor = self.descriptor.merge(&overrides);
        let (ticket, previous) = self.begin();
        let guard = PendingGuard {
            operation: self,
            ticket,
            previous: Some(previous),
        };

        async move {
            let mut guard = guard;
            let outcome = match self.transport.call(&descriptor).await {
                Ok(raw) => raw.decode::<T>().map_err(|e| {
                    e.with_request(self.transport.resolve_url(&descriptor), descriptor.method)
                        .with_path(descriptor.url.clone())
                }),
                Err(e) => Err(e),
            };
            guard.disarm();
            self.settle(ticket, outcome)
        }
    }

    fn settle(
        &self,
        ticket: u64,
        outcome: Result<Response<T>, TransportError>,
    ) -> Result<Response<T>, TransportError> {
        let apply = self.may_apply(ticket);
        if !apply {
            tracing::debug!(
                ticket,
                component = self.component.as_deref().unwrap_or("-"),
                "Discarding settlement of superseded call"
            );
        }

        match outcome {
            Ok(response) => {
                if apply {
                    *self.lock_state() = OperationState::fulfilled(response.data.clone());
                }
                Ok(response)
            }
            Err(error) => {
                if apply {
                    *self.lock_state() = OperationState::rejected(error.display_message());
                }
                self.sink.handle_api_error(&error, self.component.as_deref());
                Err(error)
            }
        }
    }
}

/// Restores the pre-call state if an `execute` future is dropped unsettled
struct PendingGuard<'a, T> {
    operation: &'a RemoteOperation<T>,
    ticket: u64,
    previous: Option<OperationState<T>>,
}

impl<T> PendingGuard<'_, T> {
    fn disarm(&mut self) {
        self.previous = None;
    }
}

impl<T> Drop for PendingGuard<'_, T> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.operation.abandon(self.ticket, previous);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{MemoryStore, RecordingNavigator, Session};
    use crate::tracking::{ErrorCategory, SinkOptions};
    use crate::transport::testing::{config, Scripted, ScriptedExchange};
    use crate::transport::{InterceptorPipeline, Method};
    use serde::Deserialize;
    use serde_json::json;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    struct Item {
        id: u32,
        name: String,
    }

    fn wiring(replies: Vec<Scripted>) -> (Arc<Transport>, Arc<ErrorSink>, Arc<ScriptedExchange>) {
        let session = Arc::new(Session::new(
            Arc::new(MemoryStore::new()),
            Arc::new(RecordingNavigator::new()),
        ));
        let exchange = ScriptedExchange::new(replies);
        let transport = Transport::with_exchange(
            config(10_000),
            exchange.clone(),
            InterceptorPipeline::standard(session),
        )
        .unwrap();
        let sink = Arc::new(ErrorSink::new(SinkOptions {
            capacity: 100,
            mirror_to_console: false,
        }));
        (Arc::new(transport), sink, exchange)
    }

    fn item_json() -> serde_json::Value {
        json!({"id": 1, "name": "Test"})
    }

    #[test]
    fn test_fresh_operation_is_idle() {
        let (transport, sink, _) = wiring(vec![]);
        let op: RemoteOperation<Item> = RemoteOperation::new(transport, sink, OperationDescriptor::get("/test"));

        assert_eq!(op.state(), OperationState::idle());
        assert_eq!(op.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn test_execute_success() {
        let (transport, sink, _) = wiring(vec![Scripted::Reply(200, item_json())]);
        let op: RemoteOperation<Item> =
            RemoteOperation::new(transport, sink.clone(), OperationDescriptor::get("/test"))
                .with_component("TestComponent");

        let response = op.execute().await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.data, Item { id: 1, name: "Test".into() });
        assert!(!op.loading());
        assert_eq!(op.data(), Some(Item { id: 1, name: "Test".into() }));
        assert_eq!(op.error(), None);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_execute_failure() {
        let (transport, sink, _) = wiring(vec![
            Scripted::Reply(200, item_json()),
            Scripted::Reply(400, json!({"message": "API Error"})),
        ]);
        let op: RemoteOperation<Item> =
            RemoteOperation::new(transport, sink.clone(), OperationDescriptor::get("/test"))
                .with_component("TestComponent");

        op.execute().await.unwrap();
        let err = op.execute().await.unwrap_err();

        assert_eq!(err.status_code(), Some(400));
        let state = op.state();
        assert!(!state.loading);
        assert_eq!(state.data, None);
        assert_eq!(state.error.as_deref(), Some("API Error"));

        let logs = sink.get_logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].category, ErrorCategory::Transport);
        assert_eq!(logs[0].component.as_deref(), Some("TestComponent"));
    }

    #[tokio::test]
    async fn test_pending_is_set_before_first_poll() {
        let (transport, sink, _) = wiring(vec![
            Scripted::Reply(500, json!({"message": "down"})),
            Scripted::Reply(200, item_json()),
        ]);
        let op: RemoteOperation<Item> = RemoteOperation::new(transport, sink, OperationDescriptor::get("/test"));

        let _ = op.execute().await;
        assert_eq!(op.error().as_deref(), Some("down"));

        let pending = op.execute();
        assert!(op.loading());
        assert_eq!(op.error(), None);
        assert_eq!(op.phase(), Phase::Pending);

        pending.await.unwrap();
        assert_eq!(op.phase(), Phase::Fulfilled);
    }

    #[tokio::test]
    async fn test_dropped_call_restores_previous_state() {
        let (transport, sink, _) = wiring(vec![
            Scripted::Reply(200, item_json()),
            Scripted::Stall,
        ]);
        let op: RemoteOperation<Item> =
            RemoteOperation::new(transport, sink.clone(), OperationDescriptor::get("/test"));
        op.execute().await.unwrap();
        let settled = op.state();

        let gave_up = tokio::time::timeout(Duration::from_millis(50), op.execute()).await;

        assert!(gave_up.is_err());
        assert_eq!(op.state(), settled);
        assert_eq!(op.phase(), Phase::Fulfilled);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_unpolled_call_dropped_returns_to_idle() {
        let (transport, sink, exchange) = wiring(vec![]);
        let op: RemoteOperation<Item> = RemoteOperation::new(transport, sink, OperationDescriptor::get("/test"));

        let pending = op.execute();
        assert!(op.loading());
        drop(pending);

        assert_eq!(op.state(), OperationState::idle());
        assert!(exchange.sent().is_empty());
    }

    #[tokio::test]
    async fn test_dropping_superseded_call_keeps_newer_pending() {
        let (transport, sink, _) = wiring(vec![Scripted::Reply(200, item_json())]);
        let op: RemoteOperation<Item> = RemoteOperation::new(transport, sink, OperationDescriptor::get("/test"));

        let older = op.execute();
        let newer = op.execute();
        drop(older);
        assert!(op.loading());

        newer.await.unwrap();
        assert_eq!(op.phase(), Phase::Fulfilled);
    }

    #[tokio::test]
    async fn test_reset_returns_to_idle() {
        let (transport, sink, _) = wiring(vec![Scripted::Reply(200, item_json())]);
        let op: RemoteOperation<Item> = RemoteOperation::new(transport, sink, OperationDescriptor::get("/test"));

        op.execute().await.unwrap();
        op.reset();

        assert_eq!(op.state(), OperationState::idle());
    }

    #[tokio::test]
    async fn test_overrides_are_merged() {
        let (transport, sink, exchange) = wiring(vec![Scripted::Reply(201, item_json())]);
        let op: RemoteOperation<Item> = RemoteOperation::new(
            transport,
            sink,
            OperationDescriptor::get("/items").header("X-Tenant", "acme"),
        );

        op.execute_with(
            DescriptorOverride::new()
                .method(Method::Post)
                .body(json!({"name": "Test"})),
        )
        .await
        .unwrap();

        let sent = exchange.sent();
        assert_eq!(sent[0].method, Method::Post);
        assert_eq!(sent[0].url, "http://localhost:8000/items");
        assert_eq!(sent[0].body, Some(json!({"name": "Test"})));
        assert_eq!(sent[0].header("x-tenant"), Some("acme"));
        // the base descriptor is untouched
        assert_eq!(op.descriptor().method, Method::Get);
    }

    #[tokio::test]
    async fn test_decode_failure_is_reported() {
        let (transport, sink, _) = wiring(vec![Scripted::Reply(200, json!({"id": "one"}))]);
        let op: RemoteOperation<Item> = RemoteOperation::new(transport, sink.clone(), OperationDescriptor::get("/test"));

        let err = op.execute().await.unwrap_err();

        assert_eq!(err.kind(), crate::transport::TransportErrorKind::Decode);
        assert_eq!(err.url(), Some("http://localhost:8000/test"));
        assert!(op.error().is_some());
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn test_overlapping_calls_last_settled_wins() {
        let (transport, sink, _) = wiring(vec![
            Scripted::Delayed(Duration::from_millis(50), 200, json!({"id": 1, "name": "first"})),
            Scripted::Reply(200, json!({"id": 2, "name": "second"})),
        ]);
        let op: RemoteOperation<Item> = RemoteOperation::new(transport, sink, OperationDescriptor::get("/test"));

        let (a, b) = futures_util::join!(op.execute(), op.execute());

        assert_eq!(a.unwrap().data.name, "first");
        assert_eq!(b.unwrap().data.name, "second");
        // the first dispatch settled last and overwrote the newer result
        assert_eq!(op.data().unwrap().name, "first");
    }

    #[tokio::test]
    async fn test_overlapping_calls_latest_dispatched_wins() {
        let (transport, sink, _) = wiring(vec![
            Scripted::Delayed(Duration::from_millis(50), 400, json!({"message": "stale failure"})),
            Scripted::Reply(200, json!({"id": 2, "name": "second"})),
        ]);
        let op: RemoteOperation<Item> = RemoteOperation::new(transport, sink.clone(), OperationDescriptor::get("/test"))
            .with_overlap_policy(OverlapPolicy::LatestDispatched);

        let (a, b) = futures_util::join!(op.execute(), op.execute());

        assert!(a.is_err());
        assert!(b.is_ok());
        assert_eq!(op.data().unwrap().name, "second");
        assert_eq!(op.error(), None);
        // superseded failures are still reported
        assert_eq!(sink.len(), 1);
    }
}
