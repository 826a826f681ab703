//! Configuration types for the IndexRepository.

use std::time::Duration;

/// Default number of hits fetched per scroll page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Default scroll keep-alive between page fetches.
pub const DEFAULT_SCROLL_KEEP_ALIVE: &str = "1m";

/// Default number of operations sent per bulk request.
pub const DEFAULT_BULK_SIZE: usize = 100;

/// Configuration for the IndexRepository.
#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    /// Number of hits requested per search or scroll page.
    pub page_size: usize,
    /// How long the server keeps a scroll context alive between pages.
    pub scroll_keep_alive: String,
    /// Number of operations buffered before a bulk request is sent.
    pub bulk_size: usize,
    /// Maximum number of documents allowed in a single `bulk` call.
    /// Set to None to disable the limit (not recommended for production).
    pub max_batch_size: Option<usize>,
    /// Deadline applied to every request; None waits for the caller's token only.
    pub request_timeout: Option<Duration>,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            scroll_keep_alive: DEFAULT_SCROLL_KEEP_ALIVE.to_string(),
            bulk_size: DEFAULT_BULK_SIZE,
            max_batch_size: Some(1000),
            request_timeout: None,
        }
    }
}

impl RepositoryConfig {
    /// Create a config with no batch size limit (use with caution).
    pub fn unlimited() -> Self {
        Self {
            max_batch_size: None,
            ..Self::default()
        }
    }

    /// Create a config with a custom batch size limit.
    pub fn with_max_batch_size(max_batch_size: usize) -> Self {
        Self {
            max_batch_size: Some(max_batch_size),
            ..Self::default()
        }
    }

    /// Set the scroll page size.
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Set the bulk flush size.
    pub fn bulk_size(mut self, bulk_size: usize) -> Self {
        self.bulk_size = bulk_size.max(1);
        self
    }

    /// Set the per-request deadline.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RepositoryConfig::default();
        assert_eq!(config.page_size, 100);
        assert_eq!(config.scroll_keep_alive, "1m");
        assert_eq!(config.max_batch_size, Some(1000));
        assert!(config.request_timeout.is_none());
    }

    #[test]
    fn test_sizes_are_at_least_one() {
        let config = RepositoryConfig::unlimited().page_size(0).bulk_size(0);
        assert_eq!(config.page_size, 1);
        assert_eq!(config.bulk_size, 1);
        assert!(config.max_batch_size.is_none());
    }
}
