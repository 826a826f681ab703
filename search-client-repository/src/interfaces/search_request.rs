//! Requests accepted by a `CallbackSearchClient`.

use serde_json::Value;

/// A single operation against the search engine.
///
/// Each variant maps onto one REST endpoint; the response body is handed
/// back as JSON and decoded by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchRequest {
    /// `GET _cluster/health`
    ClusterHealth,
    /// `PUT {index}` with settings and mappings.
    CreateIndex { index: String, body: Value },
    /// `DELETE {index}`
    DeleteIndex { index: String },
    /// `HEAD {index}`; the response is `true` or `false`.
    IndexExists { index: String },
    /// `POST {index}/_refresh`
    Refresh { index: String },
    /// `PUT {index}/_doc/{id}`, or `POST {index}/_doc` when `id` is `None`.
    Index {
        index: String,
        id: Option<String>,
        document: Value,
    },
    /// `GET {index}/_doc/{id}`
    Get { index: String, id: String },
    /// `DELETE {index}/_doc/{id}`
    Delete { index: String, id: String },
    /// `POST {index}/_bulk` with pre-built NDJSON lines.
    Bulk { index: String, lines: Vec<Value> },
    /// `POST {index}/_count`, counting everything when `query` is `None`.
    Count { index: String, query: Option<Value> },
    /// `POST {index}/_search`, opening a scroll when `scroll` is set.
    Search {
        index: String,
        body: Value,
        scroll: Option<String>,
    },
}

impl SearchRequest {
    /// Short operation name used in log fields.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::ClusterHealth => "cluster_health",
            Self::CreateIndex { .. } => "create_index",
            Self::DeleteIndex { .. } => "delete_index",
            Self::IndexExists { .. } => "index_exists",
            Self::Refresh { .. } => "refresh",
            Self::Index { .. } => "index",
            Self::Get { .. } => "get",
            Self::Delete { .. } => "delete",
            Self::Bulk { .. } => "bulk",
            Self::Count { .. } => "count",
            Self::Search { .. } => "search",
        }
    }
}
