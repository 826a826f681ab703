//! Search error types.
//!
//! This module defines the error types returned by the repository and the
//! cluster admin operations.

use thiserror::Error;

use super::ClientError;
use crate::call::CallError;
use crate::stream::StreamError;

/// Errors that can occur during search engine operations.
#[derive(Error, Debug)]
pub enum SearchError {
    /// The underlying client reported a failure.
    #[error("Operation failed: {0}")]
    OperationFailed(#[source] ClientError),

    /// The call was cancelled before it completed.
    #[error("Operation cancelled")]
    Cancelled,

    /// The client discarded the call without completing it.
    #[error("Operation abandoned by the client")]
    Abandoned,

    /// A result stream was advanced after it had already failed.
    #[error("Stream closed")]
    StreamClosed,

    /// Releasing a server-side cursor failed.
    #[error("Resource release failed: {0}")]
    ResourceReleaseFailed(#[source] ClientError),

    /// Failed to establish connection to the search engine.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Failed to parse response from search engine.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Failed to serialize data for the search engine.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Validation error (e.g., missing required fields).
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Batch size exceeds configured maximum.
    #[error("Batch size {provided} exceeds maximum {max}")]
    BatchSizeExceeded { provided: usize, max: usize },
}

impl SearchError {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::SerializationError(msg.into())
    }

    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Create a batch size exceeded error.
    pub fn batch_size_exceeded(provided: usize, max: usize) -> Self {
        Self::BatchSizeExceeded { provided, max }
    }

    /// Whether the server reported that the target does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::OperationFailed(cause) if cause.is_not_found())
    }
}

impl From<CallError<ClientError>> for SearchError {
    fn from(err: CallError<ClientError>) -> Self {
        match err {
            CallError::Failed(cause) => Self::OperationFailed(cause),
            CallError::Cancelled => Self::Cancelled,
            CallError::Abandoned => Self::Abandoned,
        }
    }
}

impl From<StreamError<ClientError>> for SearchError {
    fn from(err: StreamError<ClientError>) -> Self {
        match err {
            StreamError::Failed(cause) => Self::OperationFailed(cause),
            StreamError::Cancelled => Self::Cancelled,
            StreamError::Abandoned => Self::Abandoned,
            StreamError::Closed => Self::StreamClosed,
            StreamError::ReleaseFailed(cause) => Self::ResourceReleaseFailed(cause),
        }
    }
}
