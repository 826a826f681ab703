//! OpenSearch response parsing.
//!
//! Turns the JSON bodies handed to success callbacks into typed values.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::errors::ClientError;
use crate::stream::{Page, PageCursor};
use crate::types::{BatchOperationResult, BatchOperationSummary};
use search_client_shared::{ClusterHealth, SearchHit, SearchResponse};

/// Parse a single hit from `hits.hits`.
fn parse_hit<T: DeserializeOwned>(hit: &Value) -> Result<SearchHit<T>, ClientError> {
    let id = hit["_id"]
        .as_str()
        .ok_or_else(|| ClientError::decode("hit without _id"))?
        .to_string();
    let score = hit["_score"].as_f64();
    let source = T::deserialize(&hit["_source"])
        .map_err(|e| ClientError::decode(format!("hit {}: {}", id, e)))?;

    Ok(SearchHit { id, score, source })
}

/// Parse every hit of a search or scroll response.
pub fn parse_hits<T: DeserializeOwned>(body: &Value) -> Result<Vec<SearchHit<T>>, ClientError> {
    match body["hits"]["hits"].as_array() {
        Some(hits) => hits.iter().map(parse_hit).collect(),
        None => Err(ClientError::decode("response without hits.hits")),
    }
}

/// Total hit count; accepts both `{"value": n}` and the legacy bare number.
pub fn parse_total(body: &Value) -> u64 {
    let total = &body["hits"]["total"];
    total["value"].as_u64().or_else(|| total.as_u64()).unwrap_or(0)
}

/// Parse a single-page search response.
pub fn parse_search_response<T: DeserializeOwned>(
    body: &Value,
) -> Result<SearchResponse<T>, ClientError> {
    Ok(SearchResponse {
        total: parse_total(body),
        hits: parse_hits(body)?,
    })
}

/// Parse a scroll response into a page.
///
/// A page shorter than `page_size` is the last one, which saves a final
/// empty round trip.
pub fn parse_scroll_page<T: DeserializeOwned>(
    body: &Value,
    page_size: usize,
) -> Result<Page<SearchHit<T>>, ClientError> {
    let items = parse_hits(body)?;
    let cursor = body["_scroll_id"].as_str().map(PageCursor::new);
    let more = cursor.is_some() && !items.is_empty() && items.len() >= page_size;

    Ok(Page {
        items,
        cursor,
        more,
    })
}

/// Parse a `_count` response.
pub fn parse_count(body: &Value) -> Result<u64, ClientError> {
    body["count"]
        .as_u64()
        .ok_or_else(|| ClientError::decode("count response without count"))
}

/// Parse the `_id` assigned by an index request.
pub fn parse_indexed_id(body: &Value) -> Result<String, ClientError> {
    body["_id"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ClientError::decode("index response without _id"))
}

/// Parse the `_source` of a get response; `None` when the document was not found.
pub fn parse_source<T: DeserializeOwned>(body: &Value) -> Result<Option<T>, ClientError> {
    if !body["found"].as_bool().unwrap_or(false) {
        return Ok(None);
    }
    T::deserialize(&body["_source"])
        .map(Some)
        .map_err(|e| ClientError::decode(e.to_string()))
}

/// Parse a cluster health response.
pub fn parse_cluster_health(body: &Value) -> Result<ClusterHealth, ClientError> {
    ClusterHealth::deserialize(body).map_err(|e| ClientError::decode(e.to_string()))
}

/// Parse the per-item results of a `_bulk` response.
///
/// Each item is an object keyed by its action (`index`, `create`, ...).
pub fn parse_bulk_response(body: &Value) -> Result<BatchOperationSummary, ClientError> {
    let items = body["items"]
        .as_array()
        .ok_or_else(|| ClientError::decode("bulk response without items"))?;

    let results = items
        .iter()
        .map(|item| {
            let outcome = item
                .as_object()
                .and_then(|actions| actions.values().next())
                .unwrap_or(&Value::Null);
            let status = outcome["status"].as_u64().unwrap_or(0);
            let error = match &outcome["error"] {
                Value::Null => None,
                err => Some(
                    err["reason"]
                        .as_str()
                        .or_else(|| err["type"].as_str())
                        .map(str::to_string)
                        .unwrap_or_else(|| err.to_string()),
                ),
            };

            BatchOperationResult {
                id: outcome["_id"].as_str().unwrap_or_default().to_string(),
                success: error.is_none() && (200..300).contains(&status),
                error,
            }
        })
        .collect();

    Ok(BatchOperationSummary::from_results(results))
}
