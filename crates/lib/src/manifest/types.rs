//! Manifest types for hookdeck-deploy.
//!
//! A manifest is a JSONC document declaring Hookdeck resources. The canonical
//! in-memory shape is the plural one: every resource kind is a list.
//!
//! # Accepted input shapes
//!
//! ```jsonc
//! {
//!   "extends": "../base.jsonc",
//!   "profile": "default",
//!   "sources": [{ "name": "orders", "type": "HTTP" }],
//!   // singular keys are accepted and appended to the matching list
//!   "destination": { "name": "orders-api", "url": "https://api.example.com" },
//!   "env": {
//!     "staging": { "profile": "staging" }
//!   }
//! }
//! ```
//!
//! Serialization always emits the plural shape.
//!
//! # Unset values
//!
//! Scalars are `Option`s and `None` means "not declared". Only declared values
//! take part in merges, so a child manifest can explicitly set an empty string
//! or zero. Resource names are plain strings where empty means unnamed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Free-form JSON object passed through to the Hookdeck API.
///
/// Key order follows the manifest (serde_json `preserve_order`).
pub type ConfigMap = serde_json::Map<String, Value>;

/// Environment variables of a transformation.
pub type EnvVars = BTreeMap<String, String>;

/// Resource kinds a document declared through a singular key only.
///
/// A marked list holds the single entry of that key. When both layers of a
/// merge mark a kind, their entries merge into one whatever their names, so a
/// singular overlay can rename its resource.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SingularKeys {
  pub source: bool,
  pub destination: bool,
  pub transformation: bool,
  pub connection: bool,
}

/// The four kinds of Hookdeck resources, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
  Source,
  Destination,
  Connection,
  Transformation,
}

impl ResourceKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      ResourceKind::Source => "source",
      ResourceKind::Destination => "destination",
      ResourceKind::Connection => "connection",
      ResourceKind::Transformation => "transformation",
    }
  }
}

impl std::fmt::Display for ResourceKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// The top-level structure of a `hookdeck.jsonc` file.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ManifestDocument")]
pub struct Manifest {
  /// JSON schema reference, opaque to the tool.
  #[serde(rename = "$schema", skip_serializing_if = "Option::is_none")]
  pub schema: Option<String>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub version: Option<String>,

  /// Path of the parent manifest, relative to this file's directory.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub extends: Option<String>,

  /// Credential profile used when deploying this manifest.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub profile: Option<String>,

  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub sources: Vec<SourceConfig>,

  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub destinations: Vec<DestinationConfig>,

  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub transformations: Vec<TransformationConfig>,

  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub connections: Vec<ConnectionConfig>,

  #[serde(skip)]
  pub singular: SingularKeys,

  /// Whole-manifest environment overlays keyed by environment name.
  ///
  /// `None` means the manifest has no `env` block at all, which is reported
  /// differently from a block that lacks the requested environment.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub env: Option<BTreeMap<String, EnvOverride>>,
}

impl Manifest {
  /// Returns true if the manifest declares no resources.
  pub fn is_empty(&self) -> bool {
    self.sources.is_empty()
      && self.destinations.is_empty()
      && self.transformations.is_empty()
      && self.connections.is_empty()
  }

  /// Total number of declared resources across all kinds.
  pub fn resource_count(&self) -> usize {
    self.sources.len() + self.destinations.len() + self.transformations.len() + self.connections.len()
  }

  /// Returns true if any resource declares a per-resource override for `env_name`.
  pub fn has_resource_override(&self, env_name: &str) -> bool {
    self.sources.iter().any(|s| s.env.contains_key(env_name))
      || self.destinations.iter().any(|d| d.env.contains_key(env_name))
      || self.connections.iter().any(|c| c.env.contains_key(env_name))
      || self.transformations.iter().any(|t| t.env_overrides.contains_key(env_name))
  }
}

/// A named, partial manifest applied on top of the base for one environment.
///
/// Overlays never carry their own `env` block.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "EnvOverrideDocument")]
pub struct EnvOverride {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub profile: Option<String>,

  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub sources: Vec<SourceConfig>,

  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub destinations: Vec<DestinationConfig>,

  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub transformations: Vec<TransformationConfig>,

  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub connections: Vec<ConnectionConfig>,

  #[serde(skip)]
  pub singular: SingularKeys,
}

/// A Hookdeck source.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
  #[serde(skip_serializing_if = "String::is_empty")]
  pub name: String,

  #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
  pub type_: Option<String>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub config: Option<ConfigMap>,

  /// Per-resource overrides keyed by environment name.
  #[serde(skip_serializing_if = "BTreeMap::is_empty")]
  pub env: BTreeMap<String, SourceOverride>,
}

/// Per-environment override of a source.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceOverride {
  #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
  pub type_: Option<String>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub config: Option<ConfigMap>,
}

/// A Hookdeck destination.
///
/// `url`, `auth_type`, `auth`, `rate_limit` and `rate_limit_period` are
/// declared at the top level here but travel inside the API's `config` object.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DestinationConfig {
  #[serde(skip_serializing_if = "String::is_empty")]
  pub name: String,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub url: Option<String>,

  #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
  pub type_: Option<String>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub auth_type: Option<String>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub auth: Option<ConfigMap>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub config: Option<ConfigMap>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub rate_limit: Option<u64>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub rate_limit_period: Option<String>,

  #[serde(skip_serializing_if = "BTreeMap::is_empty")]
  pub env: BTreeMap<String, DestinationOverride>,
}

/// Per-environment override of a destination.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DestinationOverride {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub url: Option<String>,

  #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
  pub type_: Option<String>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub auth_type: Option<String>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub auth: Option<ConfigMap>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub config: Option<ConfigMap>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub rate_limit: Option<u64>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub rate_limit_period: Option<String>,
}

/// A Hookdeck connection between a source and a destination.
///
/// `filter` and `transformations` are shorthands expanded into `rules` when
/// the deploy request is built.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
  #[serde(skip_serializing_if = "String::is_empty")]
  pub name: String,

  /// Source name reference.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub source: Option<String>,

  /// Destination name reference.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub destination: Option<String>,

  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub rules: Vec<ConfigMap>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub filter: Option<ConfigMap>,

  /// Transformation name references.
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub transformations: Vec<String>,

  #[serde(skip_serializing_if = "BTreeMap::is_empty")]
  pub env: BTreeMap<String, ConnectionOverride>,
}

/// Per-environment override of a connection.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionOverride {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub source: Option<String>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub destination: Option<String>,

  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub rules: Vec<ConfigMap>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub filter: Option<ConfigMap>,

  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub transformations: Vec<String>,
}

/// A Hookdeck transformation.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformationConfig {
  #[serde(skip_serializing_if = "String::is_empty")]
  pub name: String,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,

  /// Path to the transformation code. Relative paths are resolved against the
  /// directory of the declaring manifest when it is loaded.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub code_file: Option<String>,

  #[serde(skip_serializing_if = "BTreeMap::is_empty")]
  pub env: EnvVars,

  /// Deprecated alias of `env`, folded into it on load.
  #[serde(skip_serializing_if = "BTreeMap::is_empty")]
  pub env_vars: EnvVars,

  /// Per-resource overrides keyed by environment name.
  #[serde(skip_serializing_if = "BTreeMap::is_empty")]
  pub env_overrides: BTreeMap<String, TransformationOverride>,
}

impl TransformationConfig {
  /// Fold the deprecated `env_vars` map into `env`.
  ///
  /// Keys already present in `env` keep their value.
  pub fn absorb_env_vars(&mut self) {
    for (key, value) in std::mem::take(&mut self.env_vars) {
      self.env.entry(key).or_insert(value);
    }
  }
}

/// Per-environment override of a transformation.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformationOverride {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub code_file: Option<String>,

  #[serde(skip_serializing_if = "BTreeMap::is_empty")]
  pub env: EnvVars,
}

impl From<SourceOverride> for SourceConfig {
  fn from(o: SourceOverride) -> Self {
    SourceConfig {
      type_: o.type_,
      description: o.description,
      config: o.config,
      ..Default::default()
    }
  }
}

impl From<DestinationOverride> for DestinationConfig {
  fn from(o: DestinationOverride) -> Self {
    DestinationConfig {
      url: o.url,
      type_: o.type_,
      description: o.description,
      auth_type: o.auth_type,
      auth: o.auth,
      config: o.config,
      rate_limit: o.rate_limit,
      rate_limit_period: o.rate_limit_period,
      ..Default::default()
    }
  }
}

impl From<ConnectionOverride> for ConnectionConfig {
  fn from(o: ConnectionOverride) -> Self {
    ConnectionConfig {
      source: o.source,
      destination: o.destination,
      rules: o.rules,
      filter: o.filter,
      transformations: o.transformations,
      ..Default::default()
    }
  }
}

impl From<TransformationOverride> for TransformationConfig {
  fn from(o: TransformationOverride) -> Self {
    TransformationConfig {
      description: o.description,
      code_file: o.code_file,
      env: o.env,
      ..Default::default()
    }
  }
}

/// On-disk form of [`Manifest`], accepting both singular and plural keys.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ManifestDocument {
  #[serde(rename = "$schema")]
  schema: Option<String>,
  version: Option<String>,
  extends: Option<String>,
  profile: Option<String>,
  source: Option<SourceConfig>,
  destination: Option<DestinationConfig>,
  transformation: Option<TransformationConfig>,
  connection: Option<ConnectionConfig>,
  sources: Vec<SourceConfig>,
  destinations: Vec<DestinationConfig>,
  transformations: Vec<TransformationConfig>,
  connections: Vec<ConnectionConfig>,
  env: Option<BTreeMap<String, EnvOverride>>,
}

impl From<ManifestDocument> for Manifest {
  fn from(doc: ManifestDocument) -> Self {
    let singular = SingularKeys {
      source: doc.source.is_some() && doc.sources.is_empty(),
      destination: doc.destination.is_some() && doc.destinations.is_empty(),
      transformation: doc.transformation.is_some() && doc.transformations.is_empty(),
      connection: doc.connection.is_some() && doc.connections.is_empty(),
    };
    Manifest {
      schema: doc.schema,
      version: doc.version,
      extends: doc.extends,
      profile: doc.profile,
      sources: with_single(doc.sources, doc.source),
      destinations: with_single(doc.destinations, doc.destination),
      transformations: with_single(doc.transformations, doc.transformation),
      connections: with_single(doc.connections, doc.connection),
      singular,
      env: doc.env,
    }
  }
}

/// On-disk form of [`EnvOverride`], accepting both singular and plural keys.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EnvOverrideDocument {
  profile: Option<String>,
  source: Option<SourceConfig>,
  destination: Option<DestinationConfig>,
  transformation: Option<TransformationConfig>,
  connection: Option<ConnectionConfig>,
  sources: Vec<SourceConfig>,
  destinations: Vec<DestinationConfig>,
  transformations: Vec<TransformationConfig>,
  connections: Vec<ConnectionConfig>,
}

impl From<EnvOverrideDocument> for EnvOverride {
  fn from(doc: EnvOverrideDocument) -> Self {
    let singular = SingularKeys {
      source: doc.source.is_some() && doc.sources.is_empty(),
      destination: doc.destination.is_some() && doc.destinations.is_empty(),
      transformation: doc.transformation.is_some() && doc.transformations.is_empty(),
      connection: doc.connection.is_some() && doc.connections.is_empty(),
    };
    EnvOverride {
      profile: doc.profile,
      sources: with_single(doc.sources, doc.source),
      destinations: with_single(doc.destinations, doc.destination),
      transformations: with_single(doc.transformations, doc.transformation),
      connections: with_single(doc.connections, doc.connection),
      singular,
    }
  }
}

fn with_single<T>(mut list: Vec<T>, single: Option<T>) -> Vec<T> {
  list.extend(single);
  list
}
