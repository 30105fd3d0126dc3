//! Async action wrapper.
//!
//! Wraps a fallible future and mirrors its progress into an observable
//! `{loading, error}` slot. Concurrent executions are allowed and share the
//! slot: whichever call settles last decides what observers see, even if an
//! earlier call is still in flight.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;
use volunteer_common::{ClientError, ClientResult};

/// Observable state of an [`AsyncAction`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionState {
    /// An execution is in flight.
    pub loading: bool,
    /// Failure of the most recently settled execution.
    pub error: Option<ClientError>,
}

/// Loading/error tracker around async operations.
#[derive(Debug, Clone)]
pub struct AsyncAction {
    label: &'static str,
    state: Arc<watch::Sender<ActionState>>,
}

impl AsyncAction {
    /// Create an idle action. `label` only shows up in logs.
    #[must_use]
    pub fn new(label: &'static str) -> Self {
        let (state, _) = watch::channel(ActionState::default());
        Self {
            label,
            state: Arc::new(state),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ActionState {
        self.state.borrow().clone()
    }

    /// Whether an execution is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    /// Receiver notified on every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ActionState> {
        self.state.subscribe()
    }

    /// Run `op`, tracking it in the observable state.
    ///
    /// Failures are recorded and returned to the caller as well.
    pub async fn execute<T, Fut>(&self, op: Fut) -> ClientResult<T>
    where
        Fut: Future<Output = ClientResult<T>>,
    {
        self.execute_then(op, |_| {}).await
    }

    /// Like [`execute`](Self::execute), calling `on_success` with the result
    /// before returning it.
    pub async fn execute_then<T, Fut, F>(&self, op: Fut, on_success: F) -> ClientResult<T>
    where
        Fut: Future<Output = ClientResult<T>>,
        F: FnOnce(&T),
    {
        self.state.send_replace(ActionState {
            loading: true,
            error: None,
        });
        debug!(action = self.label, "Action started");

        match op.await {
            Ok(value) => {
                self.state.send_replace(ActionState::default());
                debug!(action = self.label, "Action succeeded");
                on_success(&value);
                Ok(value)
            }
            Err(err) => {
                debug!(action = self.label, error = %err, "Action failed");
                self.state.send_replace(ActionState {
                    loading: false,
                    error: Some(err.clone()),
                });
                Err(err)
            }
        }
    }

    /// Clear a recorded error.
    pub fn clear_error(&self) {
        self.state.send_modify(|state| state.error = None);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_success_clears_state_and_calls_back() {
        let action = AsyncAction::new("test");
        let calls = AtomicUsize::new(0);

        let value = action
            .execute_then(async { Ok(7) }, |v| {
                assert_eq!(*v, 7);
                calls.fetch_add(1, Ordering::Relaxed);
            })
            .await
            .unwrap();

        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert_eq!(action.state(), ActionState::default());
    }

    #[tokio::test]
    async fn test_failure_is_recorded_and_returned() {
        let action = AsyncAction::new("test");
        let calls = AtomicUsize::new(0);

        let result: ClientResult<()> = action
            .execute_then(async { Err(ClientError::rejected(500, "boom")) }, |_| {
                calls.fetch_add(1, Ordering::Relaxed);
            })
            .await;

        assert_eq!(result, Err(ClientError::rejected(500, "boom")));
        assert_eq!(calls.load(Ordering::Relaxed), 0);
        let state = action.state();
        assert!(!state.loading);
        assert_eq!(state.error, Some(ClientError::rejected(500, "boom")));

        action.clear_error();
        assert_eq!(action.state().error, None);
    }

    #[tokio::test]
    async fn test_loading_visible_while_in_flight() {
        let action = AsyncAction::new("test");
        let mut rx = action.subscribe();
        let (tx, gate) = oneshot::channel::<()>();

        let task = tokio::spawn({
            let action = action.clone();
            async move {
                action
                    .execute(async {
                        gate.await.map_err(|e| ClientError::Internal(e.to_string()))
                    })
                    .await
            }
        });

        rx.changed().await.unwrap();
        assert!(rx.borrow().loading);

        tx.send(()).unwrap();
        task.await.unwrap().unwrap();
        assert!(!action.is_loading());
    }

    #[tokio::test]
    async fn test_last_settled_call_wins() {
        let action = AsyncAction::new("test");
        let mut rx = action.subscribe();
        let (tx, gate) = oneshot::channel::<()>();

        let slow = tokio::spawn({
            let action = action.clone();
            async move {
                action
                    .execute(async {
                        gate.await.map_err(|e| ClientError::Internal(e.to_string()))
                    })
                    .await
            }
        });
        rx.wait_for(|state| state.loading).await.unwrap();

        let fast = tokio::spawn({
            let action = action.clone();
            async move {
                action
                    .execute(async { Err::<(), _>(ClientError::Transport("down".into())) })
                    .await
            }
        });

        assert!(fast.await.unwrap().is_err());
        // The slow call is still pending, but the fast failure settled last.
        let state = action.state();
        assert!(!state.loading);
        assert!(state.error.is_some());

        tx.send(()).unwrap();
        slow.await.unwrap().unwrap();
        assert_eq!(action.state(), ActionState::default());
    }
}
