//! Callback client trait definition.
//!
//! The search engine client is driven through completion callbacks: each call
//! receives a success callback and a failure callback, invokes at most one of
//! them from whatever thread finishes the work, and hands back a handle that
//! can ask the in-flight work to stop.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::errors::ClientError;
use crate::interfaces::SearchRequest;
use crate::stream::PageCursor;

/// Callback invoked with the value of a successful call.
pub type OnSuccess<T> = Box<dyn FnOnce(T) + Send + 'static>;

/// Callback invoked with the cause of a failed call.
pub type OnFailure<E> = Box<dyn FnOnce(E) + Send + 'static>;

/// Callback invoked once a fire-and-forget call has finished.
pub type OnDone<E> = Box<dyn FnOnce(Result<(), E>) + Send + 'static>;

/// Opaque handle that asks an in-flight call to stop.
///
/// Cancellation is a request: the client may keep running briefly and may
/// still invoke a callback afterwards.
pub trait CancellationHandle: Send {
    fn cancel(&self);
}

impl CancellationHandle for Box<dyn CancellationHandle> {
    fn cancel(&self) {
        (**self).cancel()
    }
}

impl CancellationHandle for tokio::task::AbortHandle {
    fn cancel(&self) {
        self.abort()
    }
}

/// Split a single completion function into a success and a failure callback.
///
/// Whichever callback fires first runs `complete`; the other becomes a no-op.
/// If both callbacks are dropped without firing, `complete` is dropped too.
pub fn completion_pair<T, E, F>(complete: F) -> (OnSuccess<T>, OnFailure<E>)
where
    T: 'static,
    E: 'static,
    F: FnOnce(Result<T, E>) + Send + 'static,
{
    let slot = Arc::new(Mutex::new(Some(complete)));
    let failure_slot = Arc::clone(&slot);

    let on_success: OnSuccess<T> = Box::new(move |value| {
        if let Some(complete) = slot.lock().take() {
            complete(Ok(value));
        }
    });
    let on_failure: OnFailure<E> = Box::new(move |cause| {
        if let Some(complete) = failure_slot.lock().take() {
            complete(Err(cause));
        }
    });

    (on_success, on_failure)
}

/// Abstract interface for a callback-based search engine client.
///
/// Implementations must invoke at most one of the two callbacks per call and
/// may do so on any thread, including inline before returning the handle.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync` to allow use across async tasks.
pub trait CallbackSearchClient: Send + Sync {
    /// Start a single request.
    ///
    /// # Arguments
    ///
    /// * `request` - The operation to run
    /// * `on_success` - Receives the decoded JSON response body
    /// * `on_failure` - Receives the transport, status or decode failure
    ///
    /// # Returns
    ///
    /// A handle that cancels the in-flight request.
    fn start_call(
        &self,
        request: SearchRequest,
        on_success: OnSuccess<Value>,
        on_failure: OnFailure<ClientError>,
    ) -> Box<dyn CancellationHandle>;

    /// Fetch the page following `cursor` of an open scroll.
    ///
    /// # Arguments
    ///
    /// * `cursor` - The scroll id returned by the previous page
    /// * `keep_alive` - How long the server keeps the scroll context, e.g. `1m`
    fn start_paged_call(
        &self,
        cursor: &PageCursor,
        keep_alive: &str,
        on_success: OnSuccess<Value>,
        on_failure: OnFailure<ClientError>,
    ) -> Box<dyn CancellationHandle>;

    /// Release the server-side scroll context behind `cursor`.
    ///
    /// Best effort: callers do not wait for `on_done`.
    fn clear_cursor(&self, cursor: PageCursor, on_done: OnDone<ClientError>);
}
