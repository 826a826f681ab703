//! # Search Client Repository
//!
//! This crate turns a callback-driven search engine client into async Rust.
//! It includes the cancellable call adapter, the lazy paginated stream built
//! on it, an index repository and cluster admin API using both, and a
//! concrete client implementation for OpenSearch.

pub mod admin;
pub mod bulk;
pub mod call;
pub mod config;
pub mod errors;
pub mod interfaces;
pub mod opensearch;
pub mod repository;
pub mod stream;
pub mod types;

#[cfg(test)]
mod test_support;

pub use admin::ClusterAdmin;
pub use bulk::BulkSession;
pub use call::{await_call, deadline, CallError, OperationState};
pub use config::RepositoryConfig;
pub use errors::{ClientError, SearchError};
pub use interfaces::{CallbackSearchClient, CancellationHandle, SearchRequest};
pub use opensearch::{queries, IndexSettings, OpenSearchCallbackClient};
pub use repository::{IndexRepository, SearchStream};
pub use stream::{Page, PageCursor, PageSource, PagedStream, StreamError, StreamState};
pub use types::{BatchOperationResult, BatchOperationSummary};
