//! Deploy a resolved manifest to Hookdeck.
//!
//! Resources are upserted in dependency order: sources, transformations,
//! destinations, then connections. IDs returned by earlier upserts are used to
//! wire connections and transform rules.

pub mod request;

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::api::{ApiError, ResourceInfo};
use crate::manifest::{Manifest, ManifestSource, ResourceKind, TransformationConfig};

/// Upsert access to the remote API.
#[allow(async_fn_in_trait)]
pub trait Client {
  async fn upsert(&self, kind: ResourceKind, body: &Value) -> Result<ResourceInfo, ApiError>;
}

#[derive(Debug, Error)]
pub enum DeployError {
  #[error("a client is required unless running in dry-run mode")]
  NoClient,

  #[error("{kind} has no name")]
  MissingName { kind: ResourceKind },

  #[error("transformation '{name}': code_file is required")]
  MissingCodeFile { name: String },

  #[error("transformation '{name}': failed to read code file {}: {source}", path.display())]
  ReadCode {
    name: String,
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to encode {kind} '{name}': {source}")]
  Encode {
    kind: ResourceKind,
    name: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("upserting {kind} '{name}': {source}")]
  Upsert {
    kind: ResourceKind,
    name: String,
    #[source]
    source: ApiError,
  },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DeployOptions {
  pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployAction {
  WouldUpsert,
  Upserted,
}

impl DeployAction {
  pub fn as_str(&self) -> &'static str {
    match self {
      DeployAction::WouldUpsert => "would upsert",
      DeployAction::Upserted => "upserted",
    }
  }
}

/// Outcome for one resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceResult {
  pub kind: ResourceKind,
  pub name: String,
  pub action: DeployAction,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub url: Option<String>,
}

/// Outcome of a deploy run, in upsert order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeployResult {
  pub resources: Vec<ResourceResult>,
}

impl DeployResult {
  pub fn of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &ResourceResult> {
    self.resources.iter().filter(move |r| r.kind == kind)
  }

  /// ID of the first deployed source, if any was upserted.
  pub fn first_source_id(&self) -> Option<&str> {
    self.of_kind(ResourceKind::Source).next().and_then(|r| r.id.as_deref())
  }
}

/// Deploy every resource of `input`.
///
/// In dry-run mode no request is made, `client` may be `None` and code files
/// are not read. Transformation code is read through `code`.
pub async fn deploy<C, S>(
  client: Option<&C>,
  input: &Manifest,
  code: &S,
  opts: DeployOptions,
) -> Result<DeployResult, DeployError>
where
  C: Client,
  S: ManifestSource,
{
  check_names(input)?;

  if opts.dry_run {
    return Ok(dry_run(input));
  }
  let client = client.ok_or(DeployError::NoClient)?;

  let mut result = DeployResult::default();
  let mut source_ids = HashMap::new();
  let mut destination_ids = HashMap::new();
  let mut transformation_ids = HashMap::new();

  for source in &input.sources {
    let body = request::source_request(source);
    let info = upsert(client, ResourceKind::Source, &source.name, &body, &mut result).await?;
    source_ids.insert(source.name.clone(), info.id);
  }

  for t in &input.transformations {
    let body = request::transformation_request(t, read_code(t, code)?);
    let info = upsert(client, ResourceKind::Transformation, &t.name, &body, &mut result).await?;
    transformation_ids.insert(t.name.clone(), info.id);
  }

  for dest in &input.destinations {
    let body = request::destination_request(dest);
    let info = upsert(client, ResourceKind::Destination, &dest.name, &body, &mut result).await?;
    destination_ids.insert(dest.name.clone(), info.id);
  }

  for conn in &input.connections {
    let source_id = conn.source.as_ref().and_then(|s| source_ids.get(s)).map(String::as_str);
    let destination_id = conn
      .destination
      .as_ref()
      .and_then(|d| destination_ids.get(d))
      .map(String::as_str);
    let body = request::connection_request(conn, source_id, destination_id, &transformation_ids);
    upsert(client, ResourceKind::Connection, &conn.name, &body, &mut result).await?;
  }

  Ok(result)
}

fn check_names(input: &Manifest) -> Result<(), DeployError> {
  let unnamed = [
    (ResourceKind::Source, input.sources.iter().any(|r| r.name.is_empty())),
    (ResourceKind::Transformation, input.transformations.iter().any(|r| r.name.is_empty())),
    (ResourceKind::Destination, input.destinations.iter().any(|r| r.name.is_empty())),
    (ResourceKind::Connection, input.connections.iter().any(|r| r.name.is_empty())),
  ];
  match unnamed.into_iter().find(|(_, missing)| *missing) {
    Some((kind, _)) => Err(DeployError::MissingName { kind }),
    None => Ok(()),
  }
}

fn dry_run(input: &Manifest) -> DeployResult {
  let names = input
    .sources
    .iter()
    .map(|r| (ResourceKind::Source, &r.name))
    .chain(input.transformations.iter().map(|r| (ResourceKind::Transformation, &r.name)))
    .chain(input.destinations.iter().map(|r| (ResourceKind::Destination, &r.name)))
    .chain(input.connections.iter().map(|r| (ResourceKind::Connection, &r.name)));

  DeployResult {
    resources: names
      .map(|(kind, name)| ResourceResult {
        kind,
        name: name.clone(),
        action: DeployAction::WouldUpsert,
        id: None,
        url: None,
      })
      .collect(),
  }
}

async fn upsert<C: Client, B: Serialize>(
  client: &C,
  kind: ResourceKind,
  name: &str,
  body: &B,
  result: &mut DeployResult,
) -> Result<ResourceInfo, DeployError> {
  let body = serde_json::to_value(body).map_err(|source| DeployError::Encode {
    kind,
    name: name.to_string(),
    source,
  })?;

  let info = client.upsert(kind, &body).await.map_err(|source| DeployError::Upsert {
    kind,
    name: name.to_string(),
    source,
  })?;

  info!(%kind, name, id = %info.id, "upserted");
  result.resources.push(ResourceResult {
    kind,
    name: if info.name.is_empty() { name.to_string() } else { info.name.clone() },
    action: DeployAction::Upserted,
    id: Some(info.id.clone()),
    url: info.url.clone(),
  });
  Ok(info)
}

fn read_code<S: ManifestSource>(t: &TransformationConfig, code: &S) -> Result<String, DeployError> {
  let file = t
    .code_file
    .as_deref()
    .filter(|f| !f.is_empty())
    .ok_or_else(|| DeployError::MissingCodeFile { name: t.name.clone() })?;

  let path = PathBuf::from(file);
  code.read_to_string(&path).map_err(|source| DeployError::ReadCode {
    name: t.name.clone(),
    path,
    source,
  })
}
