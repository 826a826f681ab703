//! Dependency initialization and wiring for the search client.

use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use crate::ClientSetupError;
use search_client_repository::config::{DEFAULT_BULK_SIZE, DEFAULT_PAGE_SIZE};
use search_client_repository::{
    CallbackSearchClient, ClusterAdmin, IndexRepository, OpenSearchCallbackClient,
    RepositoryConfig,
};

/// Default OpenSearch URL.
const DEFAULT_OPENSEARCH_URL: &str = "http://localhost:9200";

/// Default index name.
const DEFAULT_INDEX: &str = "articles";

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// Shared callback client.
    pub client: Arc<dyn CallbackSearchClient>,
    /// Cluster admin over the same client.
    pub admin: ClusterAdmin,
    /// Name of the index the walkthrough works on.
    pub index: String,
    /// Repository configuration read from the environment.
    pub config: RepositoryConfig,
}

/// Read an optional numeric environment variable.
fn env_number<N: FromStr>(name: &str) -> Result<Option<N>, ClientSetupError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ClientSetupError::config(format!("{} is not a number: {}", name, raw))),
        Err(_) => Ok(None),
    }
}

impl Dependencies {
    /// Initialize all dependencies from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `OPENSEARCH_URL`: OpenSearch server URL (default: http://localhost:9200)
    /// - `SEARCH_INDEX`: Index name (default: articles)
    /// - `SEARCH_PAGE_SIZE`: Hits per page when streaming (default: 100)
    /// - `SEARCH_BULK_SIZE`: Operations per bulk request (default: 100)
    /// - `SEARCH_REQUEST_TIMEOUT_MS`: Per-request timeout (default: none)
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(ClientSetupError)` - If a variable is malformed or the client
    ///   cannot be created
    pub fn new() -> Result<Self, ClientSetupError> {
        let opensearch_url =
            env::var("OPENSEARCH_URL").unwrap_or_else(|_| DEFAULT_OPENSEARCH_URL.to_string());
        let index = env::var("SEARCH_INDEX").unwrap_or_else(|_| DEFAULT_INDEX.to_string());
        let page_size = env_number("SEARCH_PAGE_SIZE")?.unwrap_or(DEFAULT_PAGE_SIZE);
        let bulk_size = env_number("SEARCH_BULK_SIZE")?.unwrap_or(DEFAULT_BULK_SIZE);
        let timeout_ms: Option<u64> = env_number("SEARCH_REQUEST_TIMEOUT_MS")?;

        let mut config = RepositoryConfig::default()
            .page_size(page_size)
            .bulk_size(bulk_size);
        if let Some(ms) = timeout_ms {
            config = config.request_timeout(Duration::from_millis(ms));
        }

        info!(
            opensearch_url = %opensearch_url,
            index = %index,
            page_size = config.page_size,
            bulk_size = config.bulk_size,
            "Initializing dependencies"
        );

        let client = OpenSearchCallbackClient::new(&opensearch_url).map_err(|e| {
            ClientSetupError::config(format!("Failed to create OpenSearch client: {}", e))
        })?;
        let client: Arc<dyn CallbackSearchClient> = Arc::new(client);

        Ok(Self {
            admin: ClusterAdmin::new(Arc::clone(&client)),
            client,
            index,
            config,
        })
    }

    /// Repository over the configured index.
    pub fn repository<T>(&self) -> IndexRepository<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        IndexRepository::with_config(
            Arc::clone(&self.client),
            self.index.clone(),
            self.config.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_number_missing() {
        let value: Option<usize> = env_number("SEARCH_CLIENT_TEST_UNSET_VARIABLE").unwrap();
        assert_eq!(value, None);
    }

    #[test]
    fn test_env_number_parses_and_rejects() {
        env::set_var("SEARCH_CLIENT_TEST_PAGE", " 25 ");
        let value: Option<usize> = env_number("SEARCH_CLIENT_TEST_PAGE").unwrap();
        assert_eq!(value, Some(25));

        env::set_var("SEARCH_CLIENT_TEST_PAGE", "many");
        let result: Result<Option<usize>, _> = env_number("SEARCH_CLIENT_TEST_PAGE");
        assert!(matches!(result, Err(ClientSetupError::ConfigError(_))));
    }
}
