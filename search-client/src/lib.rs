//! # Search Client
//!
//! Walkthrough binary for the cancellable search client.
//!
//! This crate wires an OpenSearch-backed repository from the environment and
//! exercises it end to end: cluster health in all three call styles, bulk
//! loading, counting and streaming a search.

pub mod config;

pub use config::Dependencies;

use thiserror::Error;

/// Errors that can occur during client setup or the walkthrough.
#[derive(Error, Debug)]
pub enum ClientSetupError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Search error.
    #[error("Search error: {0}")]
    SearchError(#[from] search_client_repository::SearchError),

    /// A blocking task panicked or was cancelled.
    #[error("Task error: {0}")]
    TaskError(#[from] tokio::task::JoinError),
}

impl ClientSetupError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
