//! OpenSearch client implementation.
//!
//! This module provides the concrete implementation of `CallbackSearchClient`
//! using the OpenSearch Rust client. Every request runs as a task on the
//! client's runtime and reports back through the supplied callbacks.

use std::future::Future;

use opensearch::{
    cluster::ClusterHealthParts,
    http::request::JsonBody,
    http::response::Response,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{IndicesCreateParts, IndicesDeleteParts, IndicesExistsParts, IndicesRefreshParts},
    BulkParts, ClearScrollParts, CountParts, DeleteParts, GetParts, IndexParts, OpenSearch,
    ScrollParts, SearchParts,
};
use serde_json::{json, Value};
use tokio::runtime::Handle;
use tracing::{debug, error, info};
use url::Url;

use crate::errors::{ClientError, SearchError};
use crate::interfaces::{
    CallbackSearchClient, CancellationHandle, OnDone, OnFailure, OnSuccess, SearchRequest,
};
use crate::stream::PageCursor;

/// OpenSearch client implementation.
///
/// Wraps the async `opensearch` client behind the callback interface. Cheap to
/// clone; clones share the connection pool.
///
/// # Example
///
/// ```ignore
/// let client = OpenSearchCallbackClient::new("http://localhost:9200")?;
/// let handle = client.start_call(
///     SearchRequest::ClusterHealth,
///     Box::new(|body| println!("{body}")),
///     Box::new(|err| eprintln!("{err}")),
/// );
/// ```
#[derive(Clone)]
pub struct OpenSearchCallbackClient {
    client: OpenSearch,
    runtime: Handle,
}

impl OpenSearchCallbackClient {
    /// Create a new OpenSearch client connected to the specified URL.
    ///
    /// Requests run on the tokio runtime this is called from.
    ///
    /// # Arguments
    ///
    /// * `url` - The OpenSearch server URL (e.g., "http://localhost:9200")
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchCallbackClient)` - A new client instance
    /// * `Err(SearchError)` - If the URL is invalid, transport setup fails,
    ///   or there is no current runtime
    pub fn new(url: &str) -> Result<Self, SearchError> {
        let runtime = Handle::try_current().map_err(|e| SearchError::connection(e.to_string()))?;
        Self::with_runtime(url, runtime)
    }

    /// Create a client whose requests run on the given runtime.
    pub fn with_runtime(url: &str, runtime: Handle) -> Result<Self, SearchError> {
        let parsed_url = Url::parse(url).map_err(|e| SearchError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .build()
            .map_err(|e| SearchError::connection(e.to_string()))?;

        info!(url = %url, "Created OpenSearch client");

        Ok(Self {
            client: OpenSearch::new(transport),
            runtime,
        })
    }

    /// Run `work` on the runtime and route its outcome to exactly one callback.
    fn spawn<F>(
        &self,
        operation: &'static str,
        work: F,
        on_success: OnSuccess<Value>,
        on_failure: OnFailure<ClientError>,
    ) -> Box<dyn CancellationHandle>
    where
        F: Future<Output = Result<Value, ClientError>> + Send + 'static,
    {
        let task = self.runtime.spawn(async move {
            match work.await {
                Ok(body) => {
                    debug!(operation, "Request succeeded");
                    on_success(body)
                }
                Err(e) => {
                    debug!(operation, error = %e, "Request failed");
                    on_failure(e)
                }
            }
        });
        Box::new(task.abort_handle())
    }

    /// Send one request and return its JSON body.
    async fn execute(client: OpenSearch, request: SearchRequest) -> Result<Value, ClientError> {
        let response = match request {
            SearchRequest::ClusterHealth => {
                client
                    .cluster()
                    .health(ClusterHealthParts::None)
                    .send()
                    .await
            }
            SearchRequest::CreateIndex { index, body } => {
                client
                    .indices()
                    .create(IndicesCreateParts::Index(&index))
                    .body(body)
                    .send()
                    .await
            }
            SearchRequest::DeleteIndex { index } => {
                client
                    .indices()
                    .delete(IndicesDeleteParts::Index(&[index.as_str()]))
                    .send()
                    .await
            }
            SearchRequest::IndexExists { index } => {
                let response = client
                    .indices()
                    .exists(IndicesExistsParts::Index(&[index.as_str()]))
                    .send()
                    .await
                    .map_err(|e| ClientError::transport(e.to_string()))?;
                // HEAD has no body: 200 means present, 404 absent.
                return match response.status_code().as_u16() {
                    200 => Ok(json!(true)),
                    404 => Ok(json!(false)),
                    status => Err(ClientError::status(status, "")),
                };
            }
            SearchRequest::Refresh { index } => {
                client
                    .indices()
                    .refresh(IndicesRefreshParts::Index(&[index.as_str()]))
                    .send()
                    .await
            }
            SearchRequest::Index {
                index,
                id,
                document,
            } => {
                let parts = match &id {
                    Some(id) => IndexParts::IndexId(&index, id),
                    None => IndexParts::Index(&index),
                };
                client.index(parts).body(document).send().await
            }
            SearchRequest::Get { index, id } => {
                client.get(GetParts::IndexId(&index, &id)).send().await
            }
            SearchRequest::Delete { index, id } => {
                client.delete(DeleteParts::IndexId(&index, &id)).send().await
            }
            SearchRequest::Bulk { index, lines } => {
                let body: Vec<JsonBody<Value>> = lines.into_iter().map(JsonBody::new).collect();
                client.bulk(BulkParts::Index(&index)).body(body).send().await
            }
            SearchRequest::Count { index, query } => match query {
                Some(query) => {
                    client
                        .count(CountParts::Index(&[index.as_str()]))
                        .body(json!({ "query": query }))
                        .send()
                        .await
                }
                None => client.count(CountParts::Index(&[index.as_str()])).send().await,
            },
            SearchRequest::Search {
                index,
                body,
                scroll,
            } => {
                let indices = [index.as_str()];
                let mut search = client.search(SearchParts::Index(&indices)).body(body);
                if let Some(keep_alive) = &scroll {
                    search = search.scroll(keep_alive);
                }
                search.send().await
            }
        }
        .map_err(|e| ClientError::transport(e.to_string()))?;

        read_json(response).await
    }
}

/// Turn a response into its JSON body, or a status error.
async fn read_json(response: Response) -> Result<Value, ClientError> {
    let status = response.status_code();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        if status.as_u16() != 404 {
            error!(status = %status, body = %body, "Request failed");
        }
        return Err(ClientError::status(status.as_u16(), body));
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| ClientError::decode(e.to_string()))
}

impl CallbackSearchClient for OpenSearchCallbackClient {
    fn start_call(
        &self,
        request: SearchRequest,
        on_success: OnSuccess<Value>,
        on_failure: OnFailure<ClientError>,
    ) -> Box<dyn CancellationHandle> {
        let operation = request.operation();
        let client = self.client.clone();
        self.spawn(
            operation,
            Self::execute(client, request),
            on_success,
            on_failure,
        )
    }

    fn start_paged_call(
        &self,
        cursor: &PageCursor,
        keep_alive: &str,
        on_success: OnSuccess<Value>,
        on_failure: OnFailure<ClientError>,
    ) -> Box<dyn CancellationHandle> {
        let client = self.client.clone();
        let body = json!({
            "scroll": keep_alive,
            "scroll_id": cursor.as_str()
        });
        self.spawn(
            "scroll",
            async move {
                let response = client
                    .scroll(ScrollParts::None)
                    .body(body)
                    .send()
                    .await
                    .map_err(|e| ClientError::transport(e.to_string()))?;
                read_json(response).await
            },
            on_success,
            on_failure,
        )
    }

    fn clear_cursor(&self, cursor: PageCursor, on_done: OnDone<ClientError>) {
        let client = self.client.clone();
        self.runtime.spawn(async move {
            let outcome = match client
                .clear_scroll(ClearScrollParts::None)
                .body(json!({ "scroll_id": [cursor.as_str()] }))
                .send()
                .await
            {
                // An expired scroll is already gone.
                Ok(response) => match read_json(response).await {
                    Err(e) if e.is_not_found() => Ok(()),
                    other => other.map(|_| ()),
                },
                Err(e) => Err(ClientError::transport(e.to_string())),
            };
            // Failures are reported once, by whoever handles `on_done`.
            on_done(outcome);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_rejects_invalid_url() {
        let result = OpenSearchCallbackClient::new("not a url");
        assert!(matches!(result, Err(SearchError::ConnectionError(_))));
    }

    #[test]
    fn test_new_requires_runtime() {
        let result = OpenSearchCallbackClient::new("http://localhost:9200");
        assert!(matches!(result, Err(SearchError::ConnectionError(_))));
    }

    #[tokio::test]
    async fn test_new_with_valid_url() {
        let client = OpenSearchCallbackClient::new("http://localhost:9200");
        assert!(client.is_ok());
    }
}
