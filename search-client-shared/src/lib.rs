//! # Search Client Shared
//!
//! Types shared between the repository crate and the binary: search hits,
//! search responses and cluster health.

mod health;
mod search;

pub use health::{ClusterHealth, HealthStatus};
pub use search::{SearchHit, SearchResponse};
