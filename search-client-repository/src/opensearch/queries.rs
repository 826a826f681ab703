//! OpenSearch query builders.
//!
//! Small helpers for the query DSL; anything more elaborate can be passed to
//! the repository as raw `serde_json::Value`.

use serde_json::{json, Value};

/// Match every document.
pub fn match_all() -> Value {
    json!({ "match_all": {} })
}

/// Full-text match on a single field.
pub fn match_text(field: &str, text: &str) -> Value {
    json!({ "match": { field: { "query": text } } })
}

/// Exact term on a keyword field.
pub fn term(field: &str, value: impl Into<Value>) -> Value {
    json!({ "term": { field: value.into() } })
}

/// Full-text match over several fields, with optional `^boost` suffixes.
pub fn multi_match(text: &str, fields: &[&str]) -> Value {
    json!({
        "multi_match": {
            "query": text,
            "fields": fields,
            // AUTO fuzziness: 0 edits up to 2 chars, 1 up to 5, then 2
            "fuzziness": "AUTO"
        }
    })
}

/// All clauses in `must` have to match.
pub fn bool_must(clauses: Vec<Value>) -> Value {
    json!({ "bool": { "must": clauses } })
}

/// Wrap a query into a search request body fetching `size` hits.
pub fn search_body(query: Value, size: usize) -> Value {
    json!({
        "query": query,
        "size": size
    })
}

/// Search body for scrolling: sorted by `_doc`, the cheapest order to page through.
pub fn scroll_body(query: Value, size: usize) -> Value {
    json!({
        "query": query,
        "size": size,
        "sort": ["_doc"]
    })
}
