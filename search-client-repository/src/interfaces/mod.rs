//! Interface definitions for the callback-based search engine client.
//!
//! This module defines the abstract `CallbackSearchClient` trait that the
//! repository drives, the callback types it uses, and the requests it accepts.

mod callback_client;
mod search_request;

pub use callback_client::{
    completion_pair, CallbackSearchClient, CancellationHandle, OnDone, OnFailure, OnSuccess,
};
pub use search_request::SearchRequest;
