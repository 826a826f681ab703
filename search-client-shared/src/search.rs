//! Search hits and single-page search responses.

use serde::{Deserialize, Serialize};

/// A single decoded search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit<T> {
    /// Document id (`_id`).
    pub id: String,
    /// Relevance score (`_score`), absent for sorted or scroll queries.
    pub score: Option<f64>,
    /// The decoded `_source`.
    pub source: T,
}

/// One page of search results with the total hit count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse<T> {
    /// Total number of matching documents.
    pub total: u64,
    /// Hits in relevance order.
    pub hits: Vec<SearchHit<T>>,
}

impl<T> SearchResponse<T> {
    /// Iterate over the decoded sources, dropping ids and scores.
    pub fn sources(&self) -> impl Iterator<Item = &T> {
        self.hits.iter().map(|hit| &hit.source)
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}
