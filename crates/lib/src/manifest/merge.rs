//! Layered merging of manifest values.
//!
//! Every record type implements [`Merge`], where `self` is the parent layer and
//! the argument is the child layer. The rules are uniform:
//!
//! - scalars: the child wins when it declares a value
//! - `config` and `auth` maps: shallow merge, child keys win
//! - `rules` and connection `transformations`: a non-empty child list replaces
//! - `filter`: a declared child filter replaces
//! - transformation `env`: key-wise merge, child keys win
//! - env-keyed override maps: key-wise, shared keys are merged recursively
//! - resource lists: merged by name (see [`merge_named`]), except that two
//!   singular-key entries always merge into one (see [`merge_layers`])
//!
//! Merging is total and consumes both layers.

use std::collections::BTreeMap;

use super::types::{
  ConfigMap, ConnectionConfig, ConnectionOverride, DestinationConfig, DestinationOverride, EnvOverride, EnvVars,
  Manifest, SingularKeys, SourceConfig, SourceOverride, TransformationConfig, TransformationOverride,
};

/// A configuration layer that can be overridden by a child layer.
pub trait Merge: Sized {
  /// Merge `child` on top of `self`.
  fn merge(self, child: Self) -> Self;
}

/// A resource identified by name within its kind.
pub trait Named {
  fn name(&self) -> &str;
}

/// Merge two optional layers. An absent layer yields the other one unchanged.
pub fn merge_opt<T: Merge>(parent: Option<T>, child: Option<T>) -> Option<T> {
  match (parent, child) {
    (Some(parent), Some(child)) => Some(parent.merge(child)),
    (parent, None) => parent,
    (None, child) => child,
  }
}

/// Shallow merge of two free-form maps.
///
/// Nested values are not merged: a key present in the child replaces the
/// parent's value for that key wholesale.
pub fn merge_map(parent: Option<ConfigMap>, child: Option<ConfigMap>) -> Option<ConfigMap> {
  match (parent, child) {
    (Some(mut parent), Some(child)) => {
      for (key, value) in child {
        parent.insert(key, value);
      }
      Some(parent)
    }
    (parent, None) => parent,
    (None, child) => child,
  }
}

/// Key-wise merge of transformation environment variables.
pub fn merge_env_vars(mut parent: EnvVars, child: EnvVars) -> EnvVars {
  parent.extend(child);
  parent
}

/// Key-wise merge of env-keyed override maps.
pub fn merge_overrides<V: Merge>(mut parent: BTreeMap<String, V>, child: BTreeMap<String, V>) -> BTreeMap<String, V> {
  for (key, child_value) in child {
    let merged = match parent.remove(&key) {
      Some(parent_value) => parent_value.merge(child_value),
      None => child_value,
    };
    parent.insert(key, merged);
  }
  parent
}

/// Merge two resource lists by identity.
///
/// A child entry whose name matches a parent entry is merged into it. An
/// unnamed child entry merges into the parent entry at the same position, so
/// a single-resource child can refine a single-resource parent without
/// repeating its name. Every other child entry is appended. Parent order is
/// preserved.
pub fn merge_named<T: Merge + Named + Default>(parent: Vec<T>, child: Vec<T>) -> Vec<T> {
  let parent_len = parent.len();
  let mut merged = parent;

  for (index, item) in child.into_iter().enumerate() {
    let slot = if item.name().is_empty() {
      (index < parent_len).then_some(index)
    } else {
      merged.iter().position(|existing| existing.name() == item.name())
    };

    match slot {
      Some(slot) => {
        let existing = std::mem::take(&mut merged[slot]);
        merged[slot] = existing.merge(item);
      }
      None => merged.push(item),
    }
  }

  merged
}

/// Merge one resource kind of two layers, each paired with its singular-key
/// marker.
///
/// When both layers declared the kind through a singular key, the two entries
/// merge into one and the child's name, if any, wins. Otherwise the lists
/// merge by name. The returned marker is set while the result still stands
/// for a single singular-key entry.
pub fn merge_layers<T: Merge + Named + Default>(parent: (Vec<T>, bool), child: (Vec<T>, bool)) -> (Vec<T>, bool) {
  let (parent, parent_singular) = parent;
  let (child, child_singular) = child;
  let singular = (parent.is_empty() || parent_singular) && (child.is_empty() || child_singular);

  let merged = if parent_singular && child_singular && parent.len() == 1 && child.len() == 1 {
    parent.into_iter().zip(child).map(|(p, c)| p.merge(c)).collect()
  } else {
    merge_named(parent, child)
  };

  let singular = singular && !merged.is_empty();
  (merged, singular)
}

/// The resource lists of one layer together with its singular-key markers.
pub(crate) struct Layers {
  pub sources: Vec<SourceConfig>,
  pub destinations: Vec<DestinationConfig>,
  pub transformations: Vec<TransformationConfig>,
  pub connections: Vec<ConnectionConfig>,
  pub singular: SingularKeys,
}

impl Layers {
  pub(crate) fn of_manifest(m: Manifest) -> (Self, Manifest) {
    let layers = Layers {
      sources: m.sources,
      destinations: m.destinations,
      transformations: m.transformations,
      connections: m.connections,
      singular: m.singular,
    };
    let rest = Manifest {
      sources: Vec::new(),
      destinations: Vec::new(),
      transformations: Vec::new(),
      connections: Vec::new(),
      singular: SingularKeys::default(),
      ..m
    };
    (layers, rest)
  }

  pub(crate) fn of_overlay(o: EnvOverride) -> (Self, Option<String>) {
    let layers = Layers {
      sources: o.sources,
      destinations: o.destinations,
      transformations: o.transformations,
      connections: o.connections,
      singular: o.singular,
    };
    (layers, o.profile)
  }

  pub(crate) fn merge(self, child: Self) -> Self {
    let (p, c) = (self.singular, child.singular);
    let (sources, source) = merge_layers((self.sources, p.source), (child.sources, c.source));
    let (destinations, destination) =
      merge_layers((self.destinations, p.destination), (child.destinations, c.destination));
    let (transformations, transformation) = merge_layers(
      (self.transformations, p.transformation),
      (child.transformations, c.transformation),
    );
    let (connections, connection) = merge_layers((self.connections, p.connection), (child.connections, c.connection));

    Layers {
      sources,
      destinations,
      transformations,
      connections,
      singular: SingularKeys {
        source,
        destination,
        transformation,
        connection,
      },
    }
  }

  pub(crate) fn into_manifest(self, rest: Manifest) -> Manifest {
    Manifest {
      sources: self.sources,
      destinations: self.destinations,
      transformations: self.transformations,
      connections: self.connections,
      singular: self.singular,
      ..rest
    }
  }
}

fn pick<T>(parent: Option<T>, child: Option<T>) -> Option<T> {
  child.or(parent)
}

fn pick_name(parent: String, child: String) -> String {
  if child.is_empty() { parent } else { child }
}

fn replace_list<T>(parent: Vec<T>, child: Vec<T>) -> Vec<T> {
  if child.is_empty() { parent } else { child }
}

impl Merge for Manifest {
  fn merge(self, child: Self) -> Self {
    let (parent_layers, parent) = Layers::of_manifest(self);
    let (child_layers, child) = Layers::of_manifest(child);

    let env = match (parent.env, child.env) {
      (Some(parent), Some(child)) => Some(merge_overrides(parent, child)),
      (parent, None) => parent,
      (None, child) => child,
    };

    let rest = Manifest {
      schema: pick(parent.schema, child.schema),
      version: pick(parent.version, child.version),
      extends: None,
      profile: pick(parent.profile, child.profile),
      env,
      ..Default::default()
    };
    parent_layers.merge(child_layers).into_manifest(rest)
  }
}

impl Merge for EnvOverride {
  fn merge(self, child: Self) -> Self {
    let (parent, parent_profile) = Layers::of_overlay(self);
    let (child, child_profile) = Layers::of_overlay(child);
    let merged = parent.merge(child);
    EnvOverride {
      profile: pick(parent_profile, child_profile),
      sources: merged.sources,
      destinations: merged.destinations,
      transformations: merged.transformations,
      connections: merged.connections,
      singular: merged.singular,
    }
  }
}

impl Merge for SourceConfig {
  fn merge(self, child: Self) -> Self {
    SourceConfig {
      name: pick_name(self.name, child.name),
      type_: pick(self.type_, child.type_),
      description: pick(self.description, child.description),
      config: merge_map(self.config, child.config),
      env: merge_overrides(self.env, child.env),
    }
  }
}

impl Merge for SourceOverride {
  fn merge(self, child: Self) -> Self {
    SourceOverride {
      type_: pick(self.type_, child.type_),
      description: pick(self.description, child.description),
      config: merge_map(self.config, child.config),
    }
  }
}

impl Merge for DestinationConfig {
  fn merge(self, child: Self) -> Self {
    DestinationConfig {
      name: pick_name(self.name, child.name),
      url: pick(self.url, child.url),
      type_: pick(self.type_, child.type_),
      description: pick(self.description, child.description),
      auth_type: pick(self.auth_type, child.auth_type),
      auth: merge_map(self.auth, child.auth),
      config: merge_map(self.config, child.config),
      rate_limit: pick(self.rate_limit, child.rate_limit),
      rate_limit_period: pick(self.rate_limit_period, child.rate_limit_period),
      env: merge_overrides(self.env, child.env),
    }
  }
}

impl Merge for DestinationOverride {
  fn merge(self, child: Self) -> Self {
    DestinationOverride {
      url: pick(self.url, child.url),
      type_: pick(self.type_, child.type_),
      description: pick(self.description, child.description),
      auth_type: pick(self.auth_type, child.auth_type),
      auth: merge_map(self.auth, child.auth),
      config: merge_map(self.config, child.config),
      rate_limit: pick(self.rate_limit, child.rate_limit),
      rate_limit_period: pick(self.rate_limit_period, child.rate_limit_period),
    }
  }
}

impl Merge for ConnectionConfig {
  fn merge(self, child: Self) -> Self {
    ConnectionConfig {
      name: pick_name(self.name, child.name),
      source: pick(self.source, child.source),
      destination: pick(self.destination, child.destination),
      rules: replace_list(self.rules, child.rules),
      filter: pick(self.filter, child.filter),
      transformations: replace_list(self.transformations, child.transformations),
      env: merge_overrides(self.env, child.env),
    }
  }
}

impl Merge for ConnectionOverride {
  fn merge(self, child: Self) -> Self {
    ConnectionOverride {
      source: pick(self.source, child.source),
      destination: pick(self.destination, child.destination),
      rules: replace_list(self.rules, child.rules),
      filter: pick(self.filter, child.filter),
      transformations: replace_list(self.transformations, child.transformations),
    }
  }
}

impl Merge for TransformationConfig {
  fn merge(self, child: Self) -> Self {
    TransformationConfig {
      name: pick_name(self.name, child.name),
      description: pick(self.description, child.description),
      code_file: pick(self.code_file, child.code_file),
      env: merge_env_vars(self.env, child.env),
      env_vars: merge_env_vars(self.env_vars, child.env_vars),
      env_overrides: merge_overrides(self.env_overrides, child.env_overrides),
    }
  }
}

impl Merge for TransformationOverride {
  fn merge(self, child: Self) -> Self {
    TransformationOverride {
      description: pick(self.description, child.description),
      code_file: pick(self.code_file, child.code_file),
      env: merge_env_vars(self.env, child.env),
    }
  }
}

impl Named for SourceConfig {
  fn name(&self) -> &str {
    &self.name
  }
}

impl Named for DestinationConfig {
  fn name(&self) -> &str {
    &self.name
  }
}

impl Named for ConnectionConfig {
  fn name(&self) -> &str {
    &self.name
  }
}

impl Named for TransformationConfig {
  fn name(&self) -> &str {
    &self.name
  }
}
