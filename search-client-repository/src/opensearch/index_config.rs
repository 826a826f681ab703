//! OpenSearch index configuration and mappings.
//!
//! This module builds the body of a create-index request.

use serde_json::{json, Map, Value};

/// Settings and mappings for a new index.
///
/// # Example
///
/// ```ignore
/// let settings = IndexSettings::new()
///     .replicas(0)
///     .keyword("id")
///     .text("title")
///     .date("published_at");
/// repository.create_index(Some(settings.to_body()), &token).await?;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSettings {
    /// Number of primary shards.
    pub shards: u32,
    /// Number of replicas per primary shard.
    pub replicas: u32,
    /// Field name to mapping definition.
    pub properties: Map<String, Value>,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            shards: 1,
            replicas: 1,
            properties: Map::new(),
        }
    }
}

impl IndexSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of primary shards.
    pub fn shards(mut self, shards: u32) -> Self {
        self.shards = shards.max(1);
        self
    }

    /// Set the number of replicas; use 0 on single-node clusters to stay green.
    pub fn replicas(mut self, replicas: u32) -> Self {
        self.replicas = replicas;
        self
    }

    /// Map a field with an arbitrary mapping definition.
    pub fn field(mut self, name: impl Into<String>, mapping: Value) -> Self {
        self.properties.insert(name.into(), mapping);
        self
    }

    /// Exact-match field, used for filtering and ids.
    pub fn keyword(self, name: impl Into<String>) -> Self {
        self.field(name, json!({ "type": "keyword" }))
    }

    /// Analyzed full-text field with a `raw` keyword sub-field for sorting.
    pub fn text(self, name: impl Into<String>) -> Self {
        self.field(
            name,
            json!({
                "type": "text",
                "fields": {
                    "raw": { "type": "keyword" }
                }
            }),
        )
    }

    /// Date field.
    pub fn date(self, name: impl Into<String>) -> Self {
        self.field(name, json!({ "type": "date" }))
    }

    /// Body of the create-index request.
    pub fn to_body(&self) -> Value {
        let mut body = json!({
            "settings": {
                "number_of_shards": self.shards,
                "number_of_replicas": self.replicas
            }
        });
        if !self.properties.is_empty() {
            body["mappings"] = json!({ "properties": self.properties });
        }
        body
    }
}
