//! Error types for the search client repository.

mod client_error;
mod search_error;

pub use client_error::ClientError;
pub use search_error::SearchError;
