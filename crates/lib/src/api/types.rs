//! Wire types of the Hookdeck REST API.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::manifest::{ConfigMap, EnvVars};

/// Decode an explicit `null` the same way as a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
  D: Deserializer<'de>,
  T: Default + Deserialize<'de>,
{
  Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Minimal view of any remote resource.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceInfo {
  pub id: String,
  #[serde(default, deserialize_with = "null_as_default")]
  pub name: String,
  /// Ingest URL, only present on sources.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub url: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceDetail {
  #[serde(deserialize_with = "null_as_default")]
  pub id: String,
  #[serde(deserialize_with = "null_as_default")]
  pub name: String,
  #[serde(deserialize_with = "null_as_default")]
  pub url: String,
  pub description: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DestinationDetail {
  #[serde(deserialize_with = "null_as_default")]
  pub id: String,
  #[serde(deserialize_with = "null_as_default")]
  pub name: String,
  pub description: Option<String>,
  #[serde(rename = "type")]
  pub type_: Option<String>,
  #[serde(deserialize_with = "null_as_default")]
  pub config: DestinationConfigDetail,
}

/// The nested `config` object of a remote destination.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DestinationConfigDetail {
  pub url: Option<String>,
  pub auth_type: Option<String>,
  pub auth: Option<ConfigMap>,
  pub rate_limit: Option<u64>,
  pub rate_limit_period: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionDetail {
  #[serde(deserialize_with = "null_as_default")]
  pub id: String,
  #[serde(deserialize_with = "null_as_default")]
  pub name: String,
  pub full_name: Option<String>,
  pub source: Option<ResourceInfo>,
  pub destination: Option<ResourceInfo>,
  #[serde(deserialize_with = "null_as_default")]
  pub rules: Vec<Value>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformationDetail {
  #[serde(deserialize_with = "null_as_default")]
  pub id: String,
  #[serde(deserialize_with = "null_as_default")]
  pub name: String,
  #[serde(deserialize_with = "null_as_default")]
  pub code: String,
  pub env: Option<EnvVars>,
}

/// Envelope of list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ListResponse<T> {
  #[serde(default = "Vec::new")]
  pub models: Vec<T>,
}

/// Error body returned with non-2xx responses.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ErrorBody {
  #[serde(deserialize_with = "null_as_default")]
  pub message: String,
}
