//! Hookdeck REST API access.
//!
//! [`HookdeckClient`] speaks to the API over HTTPS. The rest of the crate
//! depends only on the [`RemoteLookup`] and [`crate::deploy::Client`] traits,
//! so tests can supply in-memory fakes.

mod client;
pub mod types;

use thiserror::Error;

pub use client::{DEFAULT_BASE_URL, HookdeckClient};
pub use types::*;

/// Errors returned by the API client.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("request to {url} failed: {source}")]
  Request {
    url: String,
    #[source]
    source: reqwest::Error,
  },

  #[error("API error {status}: {message}")]
  Status { status: u16, message: String },

  #[error("failed to decode response from {url}: {source}")]
  Decode {
    url: String,
    #[source]
    source: reqwest::Error,
  },
}

/// Fetch remote resources by name.
///
/// Every method returns `Ok(None)` when no resource with that name exists.
#[allow(async_fn_in_trait)]
pub trait RemoteLookup {
  async fn get_source_by_name(&self, name: &str) -> Result<Option<SourceDetail>, ApiError>;

  async fn get_destination_by_name(&self, name: &str) -> Result<Option<DestinationDetail>, ApiError>;

  async fn get_connection_by_name(&self, name: &str) -> Result<Option<ConnectionDetail>, ApiError>;

  async fn get_transformation_by_name(&self, name: &str) -> Result<Option<TransformationDetail>, ApiError>;
}
