//! Index repository implementation.
//!
//! This module provides the main entry point for working with the documents
//! of one index. Application code uses it to index, bulk-load, fetch, count,
//! search and stream documents of a single serde type.

use std::marker::PhantomData;
use std::sync::Arc;

use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, instrument, warn};

use crate::bulk::BulkSession;
use crate::call::{await_call, deadline};
use crate::config::RepositoryConfig;
use crate::errors::{ClientError, SearchError};
use crate::interfaces::{
    completion_pair, CallbackSearchClient, CancellationHandle, OnDone, OnFailure, OnSuccess,
    SearchRequest,
};
use crate::opensearch::responses::{
    parse_count, parse_indexed_id, parse_scroll_page, parse_search_response, parse_source,
};
use crate::opensearch::{queries, IndexSettings};
use crate::stream::{Page, PageCursor, PageSource, PagedStream};
use crate::types::BatchOperationSummary;
use search_client_shared::{SearchHit, SearchResponse};

/// Lazily fetched search results; see [`IndexRepository::search_stream`].
pub type SearchStream<T> = BoxStream<'static, Result<SearchHit<T>, SearchError>>;

/// Map a response decoding failure into the repository error.
pub(crate) fn decode_error(err: ClientError) -> SearchError {
    SearchError::parse(err.to_string())
}

/// Repository over the documents of one index.
///
/// Every operation takes a cancellation token; cancelling it (or the
/// configured request timeout elapsing) abandons the request with
/// `SearchError::Cancelled`.
///
/// # Example
///
/// ```ignore
/// let client: Arc<dyn CallbackSearchClient> = Arc::new(OpenSearchCallbackClient::new(url)?);
/// let articles = IndexRepository::<Article>::new(client, "articles");
/// let token = CancellationToken::new();
///
/// articles.index(Some("1"), &article, &token).await?;
/// let total = articles.count(None, &token).await?;
/// let mut hits = articles.search_stream(queries::match_all(), &token).await?;
/// while let Some(hit) = hits.try_next().await? {
///     println!("{}: {:?}", hit.id, hit.source);
/// }
/// ```
pub struct IndexRepository<T> {
    client: Arc<dyn CallbackSearchClient>,
    index: String,
    config: RepositoryConfig,
    _document: PhantomData<fn() -> T>,
}

impl<T> IndexRepository<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    /// Create a new IndexRepository with default configuration.
    pub fn new(client: Arc<dyn CallbackSearchClient>, index: impl Into<String>) -> Self {
        Self::with_config(client, index, RepositoryConfig::default())
    }

    /// Create a new IndexRepository with custom configuration.
    pub fn with_config(
        client: Arc<dyn CallbackSearchClient>,
        index: impl Into<String>,
        config: RepositoryConfig,
    ) -> Self {
        Self {
            client,
            index: index.into(),
            config,
            _document: PhantomData,
        }
    }

    pub fn index_name(&self) -> &str {
        &self.index
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    /// Check if batch size exceeds the configured limit.
    fn validate_batch_size(&self, size: usize) -> Result<(), SearchError> {
        if let Some(max) = self.config.max_batch_size {
            if size > max {
                return Err(SearchError::batch_size_exceeded(size, max));
            }
        }
        Ok(())
    }

    fn validate_id(id: &str) -> Result<(), SearchError> {
        if id.trim().is_empty() {
            return Err(SearchError::validation("document id must not be empty"));
        }
        Ok(())
    }

    /// Token for one request: the caller's, bounded by the request timeout if any.
    ///
    /// The guard stops the deadline timer once the request is over.
    fn request_token(&self, token: &CancellationToken) -> (CancellationToken, Option<DropGuard>) {
        match self.config.request_timeout {
            Some(timeout) => {
                let scoped = deadline(token, timeout);
                let guard = scoped.clone().drop_guard();
                (scoped, Some(guard))
            }
            None => (token.clone(), None),
        }
    }

    /// Run a single request through the callback client.
    pub(crate) async fn call(
        &self,
        request: SearchRequest,
        token: &CancellationToken,
    ) -> Result<Value, SearchError> {
        let operation = request.operation();
        let (token, _deadline) = self.request_token(token);
        let client = &self.client;

        let result = await_call(&token, |on_success, on_failure| {
            client.start_call(request, on_success, on_failure)
        })
        .await;

        if let Err(e) = &result {
            debug!(index = %self.index, operation, error = %e, "Request did not succeed");
        }
        result.map_err(SearchError::from)
    }

    /// Create the index.
    ///
    /// # Arguments
    ///
    /// * `settings` - Create-index body; `None` uses one shard, one replica
    ///   and dynamic mappings
    #[instrument(skip(self, settings, token), fields(index = %self.index))]
    pub async fn create_index(
        &self,
        settings: Option<Value>,
        token: &CancellationToken,
    ) -> Result<(), SearchError> {
        let body = settings.unwrap_or_else(|| IndexSettings::default().to_body());
        self.call(
            SearchRequest::CreateIndex {
                index: self.index.clone(),
                body,
            },
            token,
        )
        .await?;

        info!("Created index");
        Ok(())
    }

    /// Delete the index. Deleting a missing index succeeds.
    #[instrument(skip(self, token), fields(index = %self.index))]
    pub async fn delete_index(&self, token: &CancellationToken) -> Result<(), SearchError> {
        let request = SearchRequest::DeleteIndex {
            index: self.index.clone(),
        };
        match self.call(request, token).await {
            Ok(_) => {
                info!("Deleted index");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                debug!("Index did not exist");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Whether the index exists.
    pub async fn index_exists(&self, token: &CancellationToken) -> Result<bool, SearchError> {
        let request = SearchRequest::IndexExists {
            index: self.index.clone(),
        };
        let body = self.call(request, token).await?;
        body.as_bool()
            .ok_or_else(|| SearchError::parse("index exists response is not a boolean"))
    }

    /// Make recent writes visible to search and count.
    pub async fn refresh(&self, token: &CancellationToken) -> Result<(), SearchError> {
        let request = SearchRequest::Refresh {
            index: self.index.clone(),
        };
        self.call(request, token).await.map(|_| ())
    }

    /// Index a single document, replacing any document with the same id.
    ///
    /// # Arguments
    ///
    /// * `id` - Document id; `None` lets the server assign one
    /// * `document` - The document to store
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - The id of the stored document
    /// * `Err(SearchError)` - If validation, serialization or the request fails
    #[instrument(skip(self, document, token), fields(index = %self.index))]
    pub async fn index(
        &self,
        id: Option<&str>,
        document: &T,
        token: &CancellationToken,
    ) -> Result<String, SearchError> {
        if let Some(id) = id {
            Self::validate_id(id)?;
        }
        let document =
            serde_json::to_value(document).map_err(|e| SearchError::serialization(e.to_string()))?;

        let body = self
            .call(
                SearchRequest::Index {
                    index: self.index.clone(),
                    id: id.map(str::to_string),
                    document,
                },
                token,
            )
            .await?;

        let id = parse_indexed_id(&body).map_err(decode_error)?;
        debug!(id = %id, "Document indexed");
        Ok(id)
    }

    /// Fetch a document by id; `None` if it does not exist.
    pub async fn get(&self, id: &str, token: &CancellationToken) -> Result<Option<T>, SearchError> {
        Self::validate_id(id)?;
        let request = SearchRequest::Get {
            index: self.index.clone(),
            id: id.to_string(),
        };
        match self.call(request, token).await {
            Ok(body) => parse_source(&body).map_err(decode_error),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Delete a document by id. Deleting a missing document succeeds.
    pub async fn delete(&self, id: &str, token: &CancellationToken) -> Result<(), SearchError> {
        Self::validate_id(id)?;
        let request = SearchRequest::Delete {
            index: self.index.clone(),
            id: id.to_string(),
        };
        match self.call(request, token).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Open a bulk session that sends `bulk_size` operations per request.
    pub fn bulk_session<'a>(&'a self, token: &CancellationToken) -> BulkSession<'a, T> {
        BulkSession::new(self, token.clone())
    }

    /// Index many documents through bulk requests.
    ///
    /// Input: Vec<(Option<id>, document)>
    /// Output: Result<BatchOperationSummary, SearchError>
    ///
    /// Individual failures are reported in the summary. The batch size is
    /// limited by the configured max_batch_size (default: 1000).
    #[instrument(skip(self, documents, token), fields(index = %self.index, count = documents.len()))]
    pub async fn bulk(
        &self,
        documents: Vec<(Option<String>, T)>,
        token: &CancellationToken,
    ) -> Result<BatchOperationSummary, SearchError> {
        if documents.is_empty() {
            return Ok(BatchOperationSummary::default());
        }

        self.validate_batch_size(documents.len())?;
        for (id, _) in &documents {
            if let Some(id) = id {
                Self::validate_id(id)?;
            }
        }

        let mut session = self.bulk_session(token);
        for (id, document) in &documents {
            session.add(id.clone(), document).await?;
        }
        let summary = session.finish().await?;

        if summary.failed > 0 {
            warn!(
                succeeded = summary.succeeded,
                failed = summary.failed,
                "Bulk load completed with failures"
            );
        }
        Ok(summary)
    }

    /// Count documents matching `query`, or every document when `None`.
    pub async fn count(
        &self,
        query: Option<Value>,
        token: &CancellationToken,
    ) -> Result<u64, SearchError> {
        let request = SearchRequest::Count {
            index: self.index.clone(),
            query,
        };
        let body = self.call(request, token).await?;
        parse_count(&body).map_err(decode_error)
    }

    /// Run a query and return the first `page_size` hits with the total count.
    #[instrument(skip(self, query, token), fields(index = %self.index))]
    pub async fn search(
        &self,
        query: Value,
        token: &CancellationToken,
    ) -> Result<SearchResponse<T>, SearchError> {
        let request = SearchRequest::Search {
            index: self.index.clone(),
            body: queries::search_body(query, self.config.page_size),
            scroll: None,
        };
        let body = self.call(request, token).await?;
        let response = parse_search_response(&body).map_err(decode_error)?;

        debug!(total = response.total, hits = response.hits.len(), "Search completed");
        Ok(response)
    }

    /// Run a query and stream every matching hit.
    ///
    /// Opens a scroll and returns its first page wrapped in a lazy stream;
    /// later pages are fetched only as the stream is advanced. Dropping the
    /// stream early clears the scroll. `token` stays bound to the stream and
    /// cancels whichever page fetch is in flight; the request timeout bounds
    /// each page fetch on its own.
    #[instrument(skip(self, query, token), fields(index = %self.index))]
    pub async fn search_stream(
        &self,
        query: Value,
        token: &CancellationToken,
    ) -> Result<SearchStream<T>, SearchError> {
        let page_size = self.config.page_size;
        let request = SearchRequest::Search {
            index: self.index.clone(),
            body: queries::scroll_body(query, page_size),
            scroll: Some(self.config.scroll_keep_alive.clone()),
        };
        let body = self.call(request, token).await?;

        let first = match parse_scroll_page::<T>(&body, page_size) {
            Ok(page) => page,
            Err(e) => {
                // The scroll is open server side even though its first page is unusable.
                if let Some(id) = body["_scroll_id"].as_str() {
                    let on_done: OnDone<ClientError> = Box::new(|outcome| {
                        if let Err(e) = outcome {
                            warn!(error = %e, "Failed to clear unusable scroll");
                        }
                    });
                    self.client.clear_cursor(PageCursor::new(id), on_done);
                }
                return Err(decode_error(e));
            }
        };
        info!(
            first_page = first.items.len(),
            more = first.more,
            "Opened search stream"
        );

        let source: Arc<dyn PageSource<SearchHit<T>, ClientError>> = Arc::new(ScrollSource {
            client: Arc::clone(&self.client),
            keep_alive: self.config.scroll_keep_alive.clone(),
            page_size,
            _document: PhantomData::<fn() -> T>,
        });

        Ok(PagedStream::new(first, source, token.clone())
            .with_fetch_timeout(self.config.request_timeout)
            .map_err(SearchError::from)
            .boxed())
    }
}

/// Pages of an open scroll, decoded into search hits.
struct ScrollSource<T> {
    client: Arc<dyn CallbackSearchClient>,
    keep_alive: String,
    page_size: usize,
    _document: PhantomData<fn() -> T>,
}

impl<T> PageSource<SearchHit<T>, ClientError> for ScrollSource<T>
where
    T: DeserializeOwned + Send + 'static,
{
    fn fetch_page(
        &self,
        cursor: &PageCursor,
        on_success: OnSuccess<Page<SearchHit<T>>>,
        on_failure: OnFailure<ClientError>,
    ) -> Box<dyn CancellationHandle> {
        let page_size = self.page_size;
        let (on_body, on_error) = completion_pair(move |outcome: Result<Value, ClientError>| {
            match outcome.and_then(|body| parse_scroll_page::<T>(&body, page_size)) {
                Ok(page) => on_success(page),
                Err(e) => on_failure(e),
            }
        });
        self.client
            .start_paged_call(cursor, &self.keep_alive, on_body, on_error)
    }

    fn release(&self, cursor: PageCursor, on_done: OnDone<ClientError>) {
        self.client.clear_cursor(cursor, on_done)
    }
}
