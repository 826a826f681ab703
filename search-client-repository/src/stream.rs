//! Lazy paginated stream.
//!
//! Exposes a multi-page result set (a scroll) as one forward-only
//! `futures::Stream`. Items are buffered one page at a time; the next page
//! is fetched only once the buffer is drained, so there is never more than
//! one outstanding fetch. Whatever way the stream ends, the server-side
//! cursor is released at most once.

use std::collections::VecDeque;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::{FusedStream, Stream};
use futures::FutureExt;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::call::{await_call, deadline, CallError};
use crate::interfaces::{CancellationHandle, OnDone, OnFailure, OnSuccess};

/// Opaque server-side pagination state, e.g. a scroll id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageCursor(String);

impl PageCursor {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Scroll ids are long base64 blobs; the prefix is enough to correlate logs.
        let prefix: String = self.0.chars().take(16).collect();
        write!(f, "{}", prefix)
    }
}

/// One page of decoded items.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Items in server order.
    pub items: Vec<T>,
    /// Cursor for the next page, if the server issued one.
    pub cursor: Option<PageCursor>,
    /// Whether more pages may follow.
    pub more: bool,
}

impl<T> Page<T> {
    /// The last page of a result set.
    pub fn last(items: Vec<T>, cursor: Option<PageCursor>) -> Self {
        Self {
            items,
            cursor,
            more: false,
        }
    }

    /// A page that may be followed by another one fetched with `cursor`.
    pub fn with_more(items: Vec<T>, cursor: PageCursor) -> Self {
        Self {
            items,
            cursor: Some(cursor),
            more: true,
        }
    }
}

/// Errors surfaced by a `PagedStream`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError<E> {
    /// Fetching the next page failed.
    #[error("page fetch failed: {0}")]
    Failed(E),

    /// The page fetch was cancelled.
    #[error("page fetch cancelled")]
    Cancelled,

    /// The client dropped the page fetch without completing it.
    #[error("page fetch abandoned by the client")]
    Abandoned,

    /// The stream already failed; it does not fetch again.
    #[error("stream closed")]
    Closed,

    /// Releasing the cursor failed. Only ever logged.
    #[error("cursor release failed: {0}")]
    ReleaseFailed(E),
}

impl<E> From<CallError<E>> for StreamError<E> {
    fn from(err: CallError<E>) -> Self {
        match err {
            CallError::Failed(cause) => Self::Failed(cause),
            CallError::Cancelled => Self::Cancelled,
            CallError::Abandoned => Self::Abandoned,
        }
    }
}

/// Supplier of the pages following the first one.
pub trait PageSource<T, E>: Send + Sync {
    /// Start fetching the page that follows `cursor`.
    fn fetch_page(
        &self,
        cursor: &PageCursor,
        on_success: OnSuccess<Page<T>>,
        on_failure: OnFailure<E>,
    ) -> Box<dyn CancellationHandle>;

    /// Release the server-side state behind `cursor`. Fire-and-forget.
    fn release(&self, cursor: PageCursor, on_done: OnDone<E>);
}

/// Where a stream is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Items are buffered or more pages may be fetched.
    Active,
    /// A page fetch is outstanding.
    Fetching,
    /// Every item has been yielded.
    Exhausted,
    /// A fetch failed; further advances yield `StreamError::Closed`.
    Closed,
}

enum Phase<T, E> {
    Active,
    Fetching(BoxFuture<'static, Result<Page<T>, CallError<E>>>),
    Exhausted,
    Closed,
}

/// Single-pass stream over a paginated result set.
///
/// Consumers should stop at the first error (`TryStreamExt::try_next` and
/// `try_collect` do): after a failure every further poll yields
/// `Err(StreamError::Closed)` rather than ending.
///
/// # Example
///
/// ```ignore
/// let mut stream = PagedStream::new(first_page, source, token);
/// while let Some(item) = stream.try_next().await? {
///     println!("{item:?}");
/// }
/// ```
pub struct PagedStream<T, E>
where
    T: Send + 'static,
    E: fmt::Display + Send + 'static,
{
    source: Arc<dyn PageSource<T, E>>,
    token: CancellationToken,
    fetch_timeout: Option<Duration>,
    buffer: VecDeque<T>,
    cursor: Option<PageCursor>,
    more: bool,
    phase: Phase<T, E>,
    yielded: usize,
}

impl<T, E> PagedStream<T, E>
where
    T: Send + 'static,
    E: fmt::Display + Send + 'static,
{
    /// Wrap the first page of a result set.
    ///
    /// Later pages are fetched from `source` on demand; `token` cancels the
    /// outstanding fetch, which closes the stream.
    pub fn new(
        first_page: Page<T>,
        source: Arc<dyn PageSource<T, E>>,
        token: CancellationToken,
    ) -> Self {
        let Page {
            items,
            cursor,
            more,
        } = first_page;

        let mut stream = Self {
            source,
            token,
            fetch_timeout: None,
            buffer: items.into(),
            cursor,
            more,
            phase: Phase::Active,
            yielded: 0,
        };
        if stream.buffer.is_empty() {
            stream.finish();
        }
        stream
    }

    /// Bound every later page fetch by `timeout`; an elapsed fetch is
    /// cancelled and closes the stream like any other cancellation.
    pub fn with_fetch_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Current lifecycle state.
    pub fn state(&self) -> StreamState {
        match self.phase {
            Phase::Active => StreamState::Active,
            Phase::Fetching(_) => StreamState::Fetching,
            Phase::Exhausted => StreamState::Exhausted,
            Phase::Closed => StreamState::Closed,
        }
    }

    /// Number of items handed to the consumer so far.
    pub fn yielded(&self) -> usize {
        self.yielded
    }

    fn fetch_next(&self, cursor: PageCursor) -> BoxFuture<'static, Result<Page<T>, CallError<E>>> {
        let source = Arc::clone(&self.source);
        let token = self.token.clone();
        let timeout = self.fetch_timeout;
        async move {
            // The guard stops the deadline timer once the fetch settles.
            let (token, _deadline) = match timeout {
                Some(timeout) => {
                    let scoped = deadline(&token, timeout);
                    let guard = scoped.clone().drop_guard();
                    (scoped, Some(guard))
                }
                None => (token, None),
            };
            await_call(&token, |on_success, on_failure| {
                source.fetch_page(&cursor, on_success, on_failure)
            })
            .await
        }
        .boxed()
    }

    fn finish(&mut self) {
        self.phase = Phase::Exhausted;
        debug!(yielded = self.yielded, "Paged stream exhausted");
        self.release_cursor();
    }

    fn close(&mut self) {
        self.phase = Phase::Closed;
        self.buffer.clear();
        self.release_cursor();
    }

    /// Hand the cursor back to the server. Taking it guarantees at most one release.
    fn release_cursor(&mut self) {
        let Some(cursor) = self.cursor.take() else {
            return;
        };
        debug!(cursor = %cursor, "Releasing page cursor");

        let released = cursor.to_string();
        self.source.release(
            cursor,
            Box::new(move |outcome: Result<(), E>| {
                if let Err(cause) = outcome {
                    let err = StreamError::ReleaseFailed(cause);
                    warn!(cursor = %released, error = %err, "Failed to release page cursor");
                }
            }),
        );
    }
}

impl<T, E> Stream for PagedStream<T, E>
where
    T: Send + 'static,
    E: fmt::Display + Send + 'static,
{
    type Item = Result<T, StreamError<E>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            match &mut this.phase {
                Phase::Exhausted => return Poll::Ready(None),
                Phase::Closed => return Poll::Ready(Some(Err(StreamError::Closed))),
                Phase::Active => {
                    if let Some(item) = this.buffer.pop_front() {
                        this.yielded += 1;
                        return Poll::Ready(Some(Ok(item)));
                    }
                    match this.cursor.clone() {
                        Some(cursor) if this.more => {
                            this.phase = Phase::Fetching(this.fetch_next(cursor));
                        }
                        _ => {
                            this.finish();
                            return Poll::Ready(None);
                        }
                    }
                }
                Phase::Fetching(fetch) => {
                    let outcome = match fetch.poll_unpin(cx) {
                        Poll::Pending => return Poll::Pending,
                        Poll::Ready(outcome) => outcome,
                    };
                    match outcome {
                        Ok(page) => {
                            debug!(items = page.items.len(), more = page.more, "Fetched page");
                            this.phase = Phase::Active;
                            // A fresh cursor supersedes the old one; scroll ids may or may not change.
                            if page.cursor.is_some() {
                                this.cursor = page.cursor;
                            }
                            this.more = page.more;
                            if page.items.is_empty() {
                                this.finish();
                                return Poll::Ready(None);
                            }
                            this.buffer.extend(page.items);
                        }
                        Err(err) => {
                            this.close();
                            return Poll::Ready(Some(Err(err.into())));
                        }
                    }
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.phase {
            Phase::Exhausted => (0, Some(0)),
            _ if self.more => (self.buffer.len(), None),
            _ => (self.buffer.len(), Some(self.buffer.len())),
        }
    }
}

impl<T, E> FusedStream for PagedStream<T, E>
where
    T: Send + 'static,
    E: fmt::Display + Send + 'static,
{
    fn is_terminated(&self) -> bool {
        matches!(self.phase, Phase::Exhausted)
    }
}

impl<T, E> Unpin for PagedStream<T, E>
where
    T: Send + 'static,
    E: fmt::Display + Send + 'static,
{
}

impl<T, E> Drop for PagedStream<T, E>
where
    T: Send + 'static,
    E: fmt::Display + Send + 'static,
{
    fn drop(&mut self) {
        if self.cursor.is_some() {
            debug!(yielded = self.yielded, "Paged stream abandoned before exhaustion");
            self.release_cursor();
        }
    }
}
