//! OpenSearch implementation of the callback search client.
//!
//! This module provides a concrete implementation of `CallbackSearchClient`
//! using OpenSearch as the backend, plus the request bodies and response
//! parsing the repository needs.

mod client;
mod index_config;
pub mod queries;
pub(crate) mod responses;

pub use client::OpenSearchCallbackClient;
pub use index_config::IndexSettings;
