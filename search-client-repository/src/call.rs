//! Cancellable call adapter.
//!
//! Turns a callback-style call ("here are a success and a failure callback,
//! give me back a cancellation handle") into a single `.await` point. The
//! completion slot is written at most once: a compare-and-set on the
//! operation state decides whether the callback or the cancellation wins.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::interfaces::{completion_pair, CancellationHandle, OnFailure, OnSuccess};

/// Outcome of a call that did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError<E> {
    /// The failure callback fired with this cause.
    #[error("call failed: {0}")]
    Failed(E),

    /// The token was cancelled before either callback fired.
    #[error("call cancelled")]
    Cancelled,

    /// The client dropped both callbacks without invoking either.
    #[error("call abandoned by the client")]
    Abandoned,
}

/// Lifecycle of one in-flight call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OperationState {
    Pending = 0,
    Completed = 1,
    Failed = 2,
    Cancelled = 3,
}

impl OperationState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Pending,
            1 => Self::Completed,
            2 => Self::Failed,
            _ => Self::Cancelled,
        }
    }

    pub fn is_terminal(self) -> bool {
        self != Self::Pending
    }
}

/// Shared state cell; the only transitions are `Pending -> terminal`.
#[derive(Debug, Default)]
struct StateCell(AtomicU8);

impl StateCell {
    fn load(&self) -> OperationState {
        OperationState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn settle(&self, next: OperationState) -> bool {
        self.0
            .compare_exchange(
                OperationState::Pending as u8,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

/// The waiting side of an in-flight call.
///
/// Dropping it while still pending (scope teardown, timeout wrapper, select
/// losing branch) counts as cancellation.
struct PendingOperation<H: CancellationHandle> {
    state: Arc<StateCell>,
    handle: Option<H>,
}

impl<H: CancellationHandle> PendingOperation<H> {
    /// Try to move to `Cancelled`; invokes the handle only if this won.
    fn cancel(&mut self) -> bool {
        if !self.state.settle(OperationState::Cancelled) {
            return false;
        }
        if let Some(handle) = self.handle.take() {
            handle.cancel();
        }
        true
    }
}

impl<H: CancellationHandle> Drop for PendingOperation<H> {
    fn drop(&mut self) {
        if self.cancel() {
            debug!("Pending call dropped before completion, cancelled");
        }
    }
}

/// Await a callback-style call.
///
/// `start` is invoked at most once with the two callbacks and must return
/// the handle that cancels the underlying work. The callbacks may be invoked
/// from any thread; the result is handed back through a channel so the
/// caller resumes on its own executor.
///
/// # Returns
///
/// * `Ok(T)` - The value passed to the success callback
/// * `Err(CallError::Failed)` - The cause passed to the failure callback
/// * `Err(CallError::Cancelled)` - `token` was cancelled first; the handle
///   was invoked once and the underlying work was not waited for
/// * `Err(CallError::Abandoned)` - The client dropped both callbacks
///
/// A token that is already cancelled fails immediately without calling
/// `start`.
///
/// # Example
///
/// ```ignore
/// let token = CancellationToken::new();
/// let body = await_call(&token, |on_success, on_failure| {
///     client.start_call(SearchRequest::ClusterHealth, on_success, on_failure)
/// })
/// .await?;
/// ```
pub async fn await_call<T, E, H, S>(token: &CancellationToken, start: S) -> Result<T, CallError<E>>
where
    T: Send + 'static,
    E: Send + 'static,
    H: CancellationHandle,
    S: FnOnce(OnSuccess<T>, OnFailure<E>) -> H,
{
    if token.is_cancelled() {
        return Err(CallError::Cancelled);
    }

    let state = Arc::new(StateCell::default());
    let (tx, mut rx) = oneshot::channel::<Result<T, E>>();

    let slot = Arc::clone(&state);
    let (on_success, on_failure) = completion_pair(move |outcome: Result<T, E>| {
        let next = if outcome.is_ok() {
            OperationState::Completed
        } else {
            OperationState::Failed
        };
        if slot.settle(next) {
            // The receiver is gone only if the waiter was dropped after settling.
            let _ = tx.send(outcome);
        } else {
            trace!(state = ?slot.load(), "Ignoring completion of a settled call");
        }
    });

    let handle = start(on_success, on_failure);
    let mut pending = PendingOperation {
        state,
        handle: Some(handle),
    };

    let outcome = tokio::select! {
        biased;
        outcome = &mut rx => outcome,
        _ = token.cancelled() => {
            if pending.cancel() {
                return Err(CallError::Cancelled);
            }
            // The callback settled first; its value is already on the way.
            (&mut rx).await
        }
    };

    match outcome {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(cause)) => Err(CallError::Failed(cause)),
        Err(_) => {
            // Both callbacks were dropped unfired; do not leave the work running.
            pending.cancel();
            Err(CallError::Abandoned)
        }
    }
}

/// Child token of `parent` that is also cancelled once `timeout` elapses.
///
/// Must be called within a tokio runtime; the timer task ends as soon as the
/// child is cancelled for any reason.
pub fn deadline(parent: &CancellationToken, timeout: Duration) -> CancellationToken {
    let child = parent.child_token();
    let timer = child.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(timeout) => {
                debug!(?timeout, "Deadline elapsed, cancelling");
                timer.cancel();
            }
            _ = timer.cancelled() => {}
        }
    });
    child
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    #[derive(Clone, Default)]
    struct CountingHandle(Arc<AtomicUsize>);

    impl CountingHandle {
        fn count(&self) -> usize {
            self.0.load(Ordering::SeqCst)
        }
    }

    impl CancellationHandle for CountingHandle {
        fn cancel(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    type Parked = Arc<Mutex<Option<(OnSuccess<u32>, OnFailure<String>)>>>;

    #[tokio::test]
    async fn test_success_from_another_thread() {
        let token = CancellationToken::new();
        let handle = CountingHandle::default();
        let starts = AtomicUsize::new(0);

        let result = await_call(&token, |on_success: OnSuccess<u32>, _on_failure: OnFailure<String>| {
            starts.fetch_add(1, Ordering::SeqCst);
            std::thread::spawn(move || on_success(42));
            handle.clone()
        })
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert_eq!(handle.count(), 0);
    }

    #[tokio::test]
    async fn test_success_inline() {
        let token = CancellationToken::new();
        let handle = CountingHandle::default();

        let result = await_call(&token, |on_success: OnSuccess<&str>, _: OnFailure<String>| {
            on_success("done");
            handle.clone()
        })
        .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(handle.count(), 0);
    }

    #[tokio::test]
    async fn test_failure_carries_cause() {
        let token = CancellationToken::new();

        let result = await_call(&token, |_: OnSuccess<u32>, on_failure: OnFailure<String>| {
            std::thread::spawn(move || on_failure("index_not_found".to_string()));
            CountingHandle::default()
        })
        .await;

        assert_eq!(result, Err(CallError::Failed("index_not_found".to_string())));
    }

    #[tokio::test]
    async fn test_cancel_before_completion() {
        let token = CancellationToken::new();
        let handle = CountingHandle::default();
        let parked: Parked = Arc::new(Mutex::new(None));

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            canceller.cancel();
        });

        let park = Arc::clone(&parked);
        let result = await_call(&token, |on_success, on_failure| {
            *park.lock() = Some((on_success, on_failure));
            handle.clone()
        })
        .await;

        assert_eq!(result, Err(CallError::Cancelled));
        assert_eq!(handle.count(), 1);

        // A late callback after cancellation is ignored.
        let (on_success, _on_failure) = parked.lock().take().unwrap();
        on_success(1);
        assert_eq!(handle.count(), 1);
    }

    #[tokio::test]
    async fn test_already_cancelled_does_not_start() {
        let token = CancellationToken::new();
        token.cancel();
        let started = AtomicUsize::new(0);

        let result = await_call(&token, |_: OnSuccess<u32>, _: OnFailure<String>| {
            started.fetch_add(1, Ordering::SeqCst);
            CountingHandle::default()
        })
        .await;

        assert_eq!(result, Err(CallError::Cancelled));
        assert_eq!(started.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_completion_wins_over_later_cancel() {
        let token = CancellationToken::new();
        let handle = CountingHandle::default();

        let result = await_call(&token, |on_success: OnSuccess<u32>, _: OnFailure<String>| {
            on_success(5);
            token.cancel();
            handle.clone()
        })
        .await;

        assert_eq!(result, Ok(5));
        assert_eq!(handle.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_the_future_cancels() {
        let token = CancellationToken::new();
        let handle = CountingHandle::default();
        let parked: Parked = Arc::new(Mutex::new(None));

        let park = Arc::clone(&parked);
        let call = await_call(&token, |on_success, on_failure| {
            *park.lock() = Some((on_success, on_failure));
            handle.clone()
        });
        let timed = tokio::time::timeout(Duration::from_secs(5), call).await;

        assert!(timed.is_err());
        assert_eq!(handle.count(), 1);
    }

    #[tokio::test]
    async fn test_abandoned_callbacks() {
        let token = CancellationToken::new();
        let handle = CountingHandle::default();

        let result = await_call(&token, |on_success: OnSuccess<u32>, on_failure: OnFailure<String>| {
            drop(on_success);
            drop(on_failure);
            handle.clone()
        })
        .await;

        assert_eq!(result, Err(CallError::Abandoned));
        assert_eq!(handle.count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_calls_are_independent() {
        let token = CancellationToken::new();

        let calls = (0..8u32).map(|i| {
            let token = token.clone();
            async move {
                await_call(&token, move |on_success: OnSuccess<u32>, _: OnFailure<String>| {
                    tokio::spawn(async move { on_success(i * 10) });
                    CountingHandle::default()
                })
                .await
            }
        });
        let results = futures::future::join_all(calls).await;

        let values: Vec<u32> = results.into_iter().map(Result::unwrap).collect();
        assert_eq!(values, vec![0, 10, 20, 30, 40, 50, 60, 70]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_cancels_call() {
        let parent = CancellationToken::new();
        let token = deadline(&parent, Duration::from_millis(250));
        let handle = CountingHandle::default();
        let parked: Parked = Arc::new(Mutex::new(None));

        let park = Arc::clone(&parked);
        let result = await_call(&token, |on_success, on_failure| {
            *park.lock() = Some((on_success, on_failure));
            handle.clone()
        })
        .await;

        assert_eq!(result, Err(CallError::Cancelled));
        assert_eq!(handle.count(), 1);
        assert!(!parent.is_cancelled());
    }

    #[test]
    fn test_state_settles_once() {
        let cell = StateCell::default();
        assert_eq!(cell.load(), OperationState::Pending);
        assert!(cell.settle(OperationState::Completed));
        assert!(!cell.settle(OperationState::Cancelled));
        assert_eq!(cell.load(), OperationState::Completed);
        assert!(cell.load().is_terminal());
    }
}
