//! Cluster administration.
//!
//! The same admin call is offered in the three styles callers mix in one
//! application: callback, blocking and async.

use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::call::await_call;
use crate::errors::{ClientError, SearchError};
use crate::interfaces::{
    completion_pair, CallbackSearchClient, CancellationHandle, OnFailure, OnSuccess,
    SearchRequest,
};
use crate::opensearch::responses::parse_cluster_health;
use crate::repository::decode_error;
use search_client_shared::ClusterHealth;

/// Cluster-level operations.
#[derive(Clone)]
pub struct ClusterAdmin {
    client: Arc<dyn CallbackSearchClient>,
}

impl ClusterAdmin {
    pub fn new(client: Arc<dyn CallbackSearchClient>) -> Self {
        Self { client }
    }

    /// Request cluster health and report it through callbacks.
    ///
    /// Exactly one of the callbacks is invoked unless the returned handle
    /// cancels the request first.
    pub fn health_with_callback(
        &self,
        on_success: OnSuccess<ClusterHealth>,
        on_failure: OnFailure<SearchError>,
    ) -> Box<dyn CancellationHandle> {
        let (on_body, on_error) = completion_pair(move |outcome: Result<Value, ClientError>| {
            match outcome {
                Ok(body) => match parse_cluster_health(&body) {
                    Ok(health) => on_success(health),
                    Err(e) => on_failure(decode_error(e)),
                },
                Err(e) => on_failure(SearchError::OperationFailed(e)),
            }
        });
        self.client
            .start_call(SearchRequest::ClusterHealth, on_body, on_error)
    }

    /// Request cluster health.
    #[instrument(skip(self, token))]
    pub async fn health(&self, token: &CancellationToken) -> Result<ClusterHealth, SearchError> {
        let client = &self.client;
        let body = await_call(token, |on_success, on_failure| {
            client.start_call(SearchRequest::ClusterHealth, on_success, on_failure)
        })
        .await?;

        let health = parse_cluster_health(&body).map_err(decode_error)?;
        debug!(status = ?health.status, nodes = health.number_of_nodes, "Cluster health");
        Ok(health)
    }

    /// Request cluster health, blocking the current thread.
    ///
    /// Must not be called from within an async task; the request itself still
    /// runs on the client's runtime.
    pub fn health_blocking(&self) -> Result<ClusterHealth, SearchError> {
        futures::executor::block_on(self.health(&CancellationToken::new()))
    }
}
