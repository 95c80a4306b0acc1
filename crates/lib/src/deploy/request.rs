//! Upsert request bodies built from resolved manifest resources.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Value, json};

use crate::manifest::{ConfigMap, ConnectionConfig, DestinationConfig, EnvVars, SourceConfig, TransformationConfig};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRequest {
  pub name: String,
  #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
  pub type_: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub config: Option<ConfigMap>,
}

/// Destination upsert body. The API expects `url`, `auth_type`, `auth` and the
/// rate limit inside `config`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DestinationRequest {
  pub name: String,
  #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
  pub type_: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub config: Option<ConfigMap>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformationRequest {
  pub name: String,
  pub code: String,
  #[serde(skip_serializing_if = "EnvVars::is_empty")]
  pub env: EnvVars,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NameRef {
  pub name: String,
}

/// Connection upsert body. Resolved IDs are preferred over name references.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionRequest {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub source_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub destination_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub source: Option<NameRef>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub destination: Option<NameRef>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub rules: Vec<Value>,
}

fn non_empty(value: &Option<String>) -> Option<String> {
  value.clone().filter(|v| !v.is_empty())
}

pub fn source_request(source: &SourceConfig) -> SourceRequest {
  SourceRequest {
    name: source.name.clone(),
    type_: non_empty(&source.type_),
    description: non_empty(&source.description),
    config: source.config.clone(),
  }
}

pub fn destination_request(dest: &DestinationConfig) -> DestinationRequest {
  let mut config = dest.config.clone().unwrap_or_default();

  if let Some(url) = non_empty(&dest.url) {
    config.insert("url".to_string(), Value::String(url));
  }
  let auth_type = non_empty(&dest.auth_type);
  if let Some(auth_type) = &auth_type {
    config.insert("auth_type".to_string(), Value::String(auth_type.clone()));
  }
  match (&dest.auth, &auth_type) {
    (Some(auth), _) => {
      config.insert("auth".to_string(), Value::Object(auth.clone()));
    }
    // the API rejects an auth_type without an auth object
    (None, Some(_)) => {
      config.insert("auth".to_string(), Value::Object(ConfigMap::new()));
    }
    (None, None) => {}
  }
  if let Some(rate_limit) = dest.rate_limit.filter(|r| *r != 0) {
    config.insert("rate_limit".to_string(), Value::from(rate_limit));
  }
  if let Some(period) = non_empty(&dest.rate_limit_period) {
    config.insert("rate_limit_period".to_string(), Value::String(period));
  }

  DestinationRequest {
    name: dest.name.clone(),
    type_: non_empty(&dest.type_),
    description: non_empty(&dest.description),
    config: (!config.is_empty()).then_some(config),
  }
}

pub fn transformation_request(transformation: &TransformationConfig, code: String) -> TransformationRequest {
  TransformationRequest {
    name: transformation.name.clone(),
    code,
    env: transformation.env.clone(),
  }
}

/// Build a connection body.
///
/// Rules are the explicit `rules` (transform rules referencing a deployed
/// transformation by name get its `transformation_id`), then one transform
/// rule per `transformations` entry, then a filter rule for `filter`.
pub fn connection_request(
  conn: &ConnectionConfig,
  source_id: Option<&str>,
  destination_id: Option<&str>,
  transformation_ids: &HashMap<String, String>,
) -> ConnectionRequest {
  let mut rules: Vec<Value> = Vec::new();

  for rule in &conn.rules {
    let mut rule = rule.clone();
    let is_transform = rule.get("type").and_then(Value::as_str) == Some("transform");
    let id = rule
      .get("transformation")
      .and_then(|t| t.get("name"))
      .and_then(Value::as_str)
      .and_then(|name| transformation_ids.get(name))
      .cloned();
    if let (true, Some(id)) = (is_transform, id) {
      rule.insert("transformation_id".to_string(), Value::String(id));
    }
    rules.push(Value::Object(rule));
  }

  for name in &conn.transformations {
    let mut rule = json!({ "type": "transform", "transformation": { "name": name } });
    if let (Some(id), Some(obj)) = (transformation_ids.get(name), rule.as_object_mut()) {
      obj.insert("transformation_id".to_string(), Value::String(id.clone()));
    }
    rules.push(rule);
  }

  if let Some(filter) = &conn.filter {
    rules.push(json!({ "type": "filter", "body": filter }));
  }

  let source_name = non_empty(&conn.source);
  let destination_name = non_empty(&conn.destination);
  let source_id = source_id.filter(|id| !id.is_empty()).map(str::to_string);
  let destination_id = destination_id.filter(|id| !id.is_empty()).map(str::to_string);

  ConnectionRequest {
    name: Some(conn.name.clone()).filter(|n| !n.is_empty()),
    source: source_name.filter(|_| source_id.is_none()).map(|name| NameRef { name }),
    destination: destination_name
      .filter(|_| destination_id.is_none())
      .map(|name| NameRef { name }),
    source_id,
    destination_id,
    rules,
  }
}
