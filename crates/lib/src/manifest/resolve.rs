//! Environment overlays.
//!
//! Two levels of overlay exist:
//!
//! - the manifest-level `env` block, applied with [`resolve_env`], which fails
//!   when the requested environment is not declared
//! - per-resource override maps, applied with the `resolve_*_env` functions,
//!   which leave a resource unchanged when it has no override for the
//!   requested environment

use tracing::debug;

use super::ManifestError;
use super::merge::{Layers, Merge};
use super::types::{ConnectionConfig, DestinationConfig, Manifest, SourceConfig, TransformationConfig};

/// Apply the manifest-level overlay for `env_name`.
///
/// An empty `env_name` applies nothing. The result never carries an `env`
/// block.
pub fn resolve_env(manifest: &Manifest, env_name: &str) -> Result<Manifest, ManifestError> {
  let mut base = manifest.clone();
  let block = base.env.take();

  if env_name.is_empty() {
    return Ok(base);
  }

  let Some(mut block) = block else {
    return Err(ManifestError::UnknownEnvironment {
      name: env_name.to_string(),
      reason: "no env block defined",
    });
  };

  let overlay = block.remove(env_name).ok_or_else(|| ManifestError::UnknownEnvironment {
    name: env_name.to_string(),
    reason: "not found in env block",
  })?;

  debug!(env = env_name, "applying environment overlay");

  let (base_layers, rest) = Layers::of_manifest(base);
  let (overlay_layers, overlay_profile) = Layers::of_overlay(overlay);
  let rest = Manifest {
    profile: overlay_profile.or(rest.profile),
    ..rest
  };
  Ok(base_layers.merge(overlay_layers).into_manifest(rest))
}

/// Apply a source's own override for `env_name`, if it has one.
pub fn resolve_source_env(source: &SourceConfig, env_name: &str) -> SourceConfig {
  let Some(o) = lookup(&source.env, env_name) else {
    return source.clone();
  };
  let base = SourceConfig {
    env: Default::default(),
    ..source.clone()
  };
  base.merge(o.clone().into())
}

/// Apply a destination's own override for `env_name`, if it has one.
pub fn resolve_destination_env(destination: &DestinationConfig, env_name: &str) -> DestinationConfig {
  let Some(o) = lookup(&destination.env, env_name) else {
    return destination.clone();
  };
  let base = DestinationConfig {
    env: Default::default(),
    ..destination.clone()
  };
  base.merge(o.clone().into())
}

/// Apply a connection's own override for `env_name`, if it has one.
pub fn resolve_connection_env(connection: &ConnectionConfig, env_name: &str) -> ConnectionConfig {
  let Some(o) = lookup(&connection.env, env_name) else {
    return connection.clone();
  };
  let base = ConnectionConfig {
    env: Default::default(),
    ..connection.clone()
  };
  base.merge(o.clone().into())
}

/// Apply a transformation's own override for `env_name`, if it has one.
///
/// Override `env` entries are merged key-wise into the base `env`.
pub fn resolve_transformation_env(transformation: &TransformationConfig, env_name: &str) -> TransformationConfig {
  let Some(o) = lookup(&transformation.env_overrides, env_name) else {
    return transformation.clone();
  };
  let base = TransformationConfig {
    env_overrides: Default::default(),
    ..transformation.clone()
  };
  base.merge(o.clone().into())
}

/// Apply the per-resource resolver to every resource in `manifest`.
pub fn resolve_resources(manifest: &Manifest, env_name: &str) -> Manifest {
  Manifest {
    sources: manifest.sources.iter().map(|s| resolve_source_env(s, env_name)).collect(),
    destinations: manifest
      .destinations
      .iter()
      .map(|d| resolve_destination_env(d, env_name))
      .collect(),
    transformations: manifest
      .transformations
      .iter()
      .map(|t| resolve_transformation_env(t, env_name))
      .collect(),
    connections: manifest
      .connections
      .iter()
      .map(|c| resolve_connection_env(c, env_name))
      .collect(),
    ..manifest.clone()
  }
}

fn lookup<'a, V>(overrides: &'a std::collections::BTreeMap<String, V>, env_name: &str) -> Option<&'a V> {
  if env_name.is_empty() {
    return None;
  }
  overrides.get(env_name)
}
