//! HTTP client for the Hookdeck API.

use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::types::{
  ConnectionDetail, DestinationDetail, ErrorBody, ListResponse, ResourceInfo, SourceDetail, TransformationDetail,
};
use super::{ApiError, RemoteLookup};
use crate::deploy::Client;
use crate::manifest::ResourceKind;

/// Versioned API root.
pub const DEFAULT_BASE_URL: &str = "https://api.hookdeck.com/2025-07-01";

/// Authenticated Hookdeck API client.
///
/// Requests use HTTP basic auth with the API key as the user name and an empty
/// password. A project ID, when known, is sent as `X-Project-ID`.
#[derive(Debug, Clone)]
pub struct HookdeckClient {
  http: reqwest::Client,
  base_url: String,
  api_key: String,
  project_id: Option<String>,
}

impl HookdeckClient {
  pub fn new(api_key: impl Into<String>, project_id: Option<String>) -> Self {
    Self {
      http: reqwest::Client::new(),
      base_url: DEFAULT_BASE_URL.to_string(),
      api_key: api_key.into(),
      project_id: project_id.filter(|p| !p.is_empty()),
    }
  }

  /// Point the client at another API root (a proxy or a test server).
  pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
    self.base_url = base_url.into().trim_end_matches('/').to_string();
    self
  }

  fn request(&self, method: Method, path: &str) -> (String, RequestBuilder) {
    let url = format!("{}{}", self.base_url, path);
    let mut builder = self.http.request(method, &url).basic_auth(&self.api_key, None::<&str>);
    if let Some(project_id) = &self.project_id {
      builder = builder.header("X-Project-ID", project_id);
    }
    (url, builder)
  }

  async fn send(url: &str, builder: RequestBuilder) -> Result<Response, ApiError> {
    let response = builder.send().await.map_err(|source| ApiError::Request {
      url: url.to_string(),
      source,
    })?;

    let status = response.status();
    if status.is_success() {
      return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
      .ok()
      .map(|e| e.message)
      .filter(|m| !m.is_empty())
      .unwrap_or(body);

    Err(ApiError::Status {
      status: status.as_u16(),
      message,
    })
  }

  async fn decode<T: DeserializeOwned>(url: &str, response: Response) -> Result<T, ApiError> {
    response.json::<T>().await.map_err(|source| ApiError::Decode {
      url: url.to_string(),
      source,
    })
  }

  /// Create or update a resource by name. `PUT` is an upsert on the Hookdeck API.
  pub async fn put(&self, path: &str, body: &Value) -> Result<ResourceInfo, ApiError> {
    let (url, builder) = self.request(Method::PUT, path);
    debug!(url = %url, "PUT");
    let response = Self::send(&url, builder.json(body)).await?;
    Self::decode(&url, response).await
  }

  /// First model of a filtered list query, if any.
  async fn find_first<T: DeserializeOwned>(&self, path: &str, key: &str, name: &str) -> Result<Option<T>, ApiError> {
    let (url, builder) = self.request(Method::GET, path);
    debug!(url = %url, key, name, "GET");
    let response = Self::send(&url, builder.query(&[(key, name)])).await?;
    let list: ListResponse<T> = Self::decode(&url, response).await?;
    Ok(list.models.into_iter().next())
  }
}

fn collection_path(kind: ResourceKind) -> &'static str {
  match kind {
    ResourceKind::Source => "/sources",
    ResourceKind::Destination => "/destinations",
    ResourceKind::Connection => "/connections",
    ResourceKind::Transformation => "/transformations",
  }
}

impl Client for HookdeckClient {
  async fn upsert(&self, kind: ResourceKind, body: &Value) -> Result<ResourceInfo, ApiError> {
    self.put(collection_path(kind), body).await
  }
}

impl RemoteLookup for HookdeckClient {
  async fn get_source_by_name(&self, name: &str) -> Result<Option<SourceDetail>, ApiError> {
    self.find_first("/sources", "name", name).await
  }

  async fn get_destination_by_name(&self, name: &str) -> Result<Option<DestinationDetail>, ApiError> {
    self.find_first("/destinations", "name", name).await
  }

  async fn get_connection_by_name(&self, name: &str) -> Result<Option<ConnectionDetail>, ApiError> {
    self.find_first("/connections", "full_name", name).await
  }

  async fn get_transformation_by_name(&self, name: &str) -> Result<Option<TransformationDetail>, ApiError> {
    self.find_first("/transformations", "name", name).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use mockito::{Matcher, Server};
  use serde_json::json;

  // "key:" in base64
  const BASIC_KEY: &str = "Basic a2V5Og==";

  #[tokio::test]
  async fn upsert_sends_put_with_auth_and_project() {
    let mut server = Server::new_async().await;
    let mock = server
      .mock("PUT", "/sources")
      .match_header("authorization", BASIC_KEY)
      .match_header("x-project-id", "tm_1")
      .match_body(Matcher::Json(json!({ "name": "orders" })))
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(r#"{ "id": "src_1", "name": "orders", "url": "https://hkdk.events/abc" }"#)
      .create_async()
      .await;

    let client = HookdeckClient::new("key", Some("tm_1".to_string())).with_base_url(server.url());
    let info = client
      .upsert(ResourceKind::Source, &json!({ "name": "orders" }))
      .await
      .unwrap();

    mock.assert_async().await;
    assert_eq!(info.id, "src_1");
    assert_eq!(info.url.as_deref(), Some("https://hkdk.events/abc"));
  }

  #[tokio::test]
  async fn lookup_returns_first_model() {
    let mut server = Server::new_async().await;
    let mock = server
      .mock("GET", "/destinations")
      .match_query(Matcher::UrlEncoded("name".into(), "d".into()))
      .with_status(200)
      .with_body(r#"{ "models": [{ "id": "des_1", "name": "d", "config": { "url": "https://old" } }], "count": 1 }"#)
      .create_async()
      .await;

    let client = HookdeckClient::new("key", None).with_base_url(server.url());
    let detail = client.get_destination_by_name("d").await.unwrap().unwrap();

    mock.assert_async().await;
    assert_eq!(detail.id, "des_1");
    assert_eq!(detail.config.url.as_deref(), Some("https://old"));
  }

  #[tokio::test]
  async fn lookup_of_unknown_name_is_none() {
    let mut server = Server::new_async().await;
    server
      .mock("GET", "/connections")
      .match_query(Matcher::UrlEncoded("full_name".into(), "missing".into()))
      .with_status(200)
      .with_body(r#"{ "models": [], "count": 0 }"#)
      .create_async()
      .await;

    let client = HookdeckClient::new("key", None).with_base_url(server.url());
    assert!(client.get_connection_by_name("missing").await.unwrap().is_none());
  }

  #[tokio::test]
  async fn error_status_carries_api_message() {
    let mut server = Server::new_async().await;
    server
      .mock("PUT", "/destinations")
      .with_status(422)
      .with_body(r#"{ "message": "config.url is required" }"#)
      .create_async()
      .await;

    let client = HookdeckClient::new("key", None).with_base_url(server.url());
    let err = client
      .upsert(ResourceKind::Destination, &json!({ "name": "d" }))
      .await
      .unwrap_err();

    assert_eq!(err.to_string(), "API error 422: config.url is required");
  }

  #[tokio::test]
  async fn error_status_falls_back_to_body() {
    let mut server = Server::new_async().await;
    server
      .mock("GET", "/sources")
      .match_query(Matcher::Any)
      .with_status(500)
      .with_body("upstream unavailable")
      .create_async()
      .await;

    let client = HookdeckClient::new("key", None).with_base_url(server.url());
    let err = client.get_source_by_name("s").await.unwrap_err();
    assert!(matches!(err, ApiError::Status { status: 500, ref message } if message == "upstream unavailable"));
  }
}
