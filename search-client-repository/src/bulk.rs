//! Bulk indexing session.
//!
//! Buffers index operations and sends them in `_bulk` requests of
//! `bulk_size` operations each.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::errors::SearchError;
use crate::interfaces::SearchRequest;
use crate::opensearch::responses::parse_bulk_response;
use crate::repository::{decode_error, IndexRepository};
use crate::types::BatchOperationSummary;

/// Bulk session over one repository.
///
/// Operations are flushed automatically once `bulk_size` are pending; call
/// [`BulkSession::finish`] to send the rest and get the combined summary.
/// Operations still pending when the session is dropped are discarded.
pub struct BulkSession<'a, T> {
    repository: &'a IndexRepository<T>,
    token: CancellationToken,
    /// NDJSON lines: an action line followed by the document.
    lines: Vec<Value>,
    pending: usize,
    summary: BatchOperationSummary,
}

impl<'a, T> BulkSession<'a, T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    pub(crate) fn new(repository: &'a IndexRepository<T>, token: CancellationToken) -> Self {
        Self {
            repository,
            token,
            lines: Vec::with_capacity(repository.config().bulk_size * 2),
            pending: 0,
            summary: BatchOperationSummary::default(),
        }
    }

    /// Operations buffered and not yet sent.
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Queue a document for indexing, flushing if the buffer is full.
    ///
    /// # Arguments
    ///
    /// * `id` - Document id; `None` lets the server assign one
    /// * `document` - The document to store
    pub async fn add(&mut self, id: Option<String>, document: &T) -> Result<(), SearchError> {
        let source =
            serde_json::to_value(document).map_err(|e| SearchError::serialization(e.to_string()))?;
        let action = match id {
            Some(id) => json!({ "index": { "_id": id } }),
            None => json!({ "index": {} }),
        };

        self.lines.push(action);
        self.lines.push(source);
        self.pending += 1;

        if self.pending >= self.repository.config().bulk_size {
            self.flush().await?;
        }
        Ok(())
    }

    /// Send every buffered operation now.
    #[instrument(skip(self), fields(index = %self.repository.index_name(), count = self.pending))]
    pub async fn flush(&mut self) -> Result<(), SearchError> {
        if self.pending == 0 {
            return Ok(());
        }

        let lines: Vec<Value> = self.lines.drain(..).collect();
        let count = self.pending;
        self.pending = 0;

        info!(count = count, "Flushing bulk operations");

        let request = SearchRequest::Bulk {
            index: self.repository.index_name().to_string(),
            lines,
        };
        let body = self.repository.call(request, &self.token).await?;
        let summary = parse_bulk_response(&body).map_err(decode_error)?;

        if summary.failed > 0 {
            warn!(
                succeeded = summary.succeeded,
                failed = summary.failed,
                "Some bulk operations failed"
            );
        } else {
            debug!(count = count, "Bulk request succeeded");
        }

        self.summary.merge(summary);
        Ok(())
    }

    /// Flush what is left and return the summary of every request sent.
    pub async fn finish(mut self) -> Result<BatchOperationSummary, SearchError> {
        self.flush().await?;
        Ok(std::mem::take(&mut self.summary))
    }
}

impl<T> Drop for BulkSession<'_, T> {
    fn drop(&mut self) {
        if self.pending > 0 {
            warn!(
                pending = self.pending,
                "Bulk session dropped with unsent operations"
            );
        }
    }
}
