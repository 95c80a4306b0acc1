//! The full resolution pipeline: inheritance, overlays, interpolation.

use std::path::Path;

use tracing::debug;

use crate::manifest::{
  Loader, Manifest, ManifestError, ManifestSource, interpolate_env_vars, resolve_env, resolve_resources,
};

/// Resolve `manifest` for `env_name` and interpolate environment variables.
///
/// When the manifest has an `env` block the environment must be declared in
/// it. Without one, a non-empty `env_name` must be named by at least one
/// per-resource override. Per-resource overrides are then applied and every
/// remaining override map is dropped before interpolation.
pub fn resolve(manifest: &Manifest, env_name: &str) -> Result<Manifest, ManifestError> {
  let overlaid = if manifest.env.is_some() {
    resolve_env(manifest, env_name)?
  } else {
    if !env_name.is_empty() && !manifest.has_resource_override(env_name) {
      return Err(ManifestError::UnknownEnvironment {
        name: env_name.to_string(),
        reason: "no env block or resource override defined",
      });
    }
    manifest.clone()
  };

  resolve_per_resource(&overlaid, env_name)
}

/// Apply per-resource overrides for `env_name`, drop every override map and
/// interpolate. Unknown environments are not an error here.
pub fn resolve_per_resource(manifest: &Manifest, env_name: &str) -> Result<Manifest, ManifestError> {
  let resolved = strip_overrides(resolve_resources(manifest, env_name));
  debug!(env = env_name, resources = resolved.resource_count(), "resolved manifest");
  interpolate_env_vars(&resolved)
}

/// Load `path` with inheritance and run [`resolve`].
pub fn load_resolved(path: impl AsRef<Path>, env_name: &str) -> Result<Manifest, ManifestError> {
  load_resolved_with(&Loader::new(), path.as_ref(), env_name)
}

pub fn load_resolved_with<S: ManifestSource>(
  loader: &Loader<S>,
  path: &Path,
  env_name: &str,
) -> Result<Manifest, ManifestError> {
  let manifest = loader.load_with_inheritance(path)?;
  resolve(&manifest, env_name)
}

fn strip_overrides(mut manifest: Manifest) -> Manifest {
  manifest.sources.iter_mut().for_each(|s| s.env.clear());
  manifest.destinations.iter_mut().for_each(|d| d.env.clear());
  manifest.connections.iter_mut().for_each(|c| c.env.clear());
  manifest
    .transformations
    .iter_mut()
    .for_each(|t| t.env_overrides.clear());
  manifest
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::MemorySource;
  use serde_json::json;
  use serial_test::serial;

  fn manifest(value: serde_json::Value) -> Manifest {
    serde_json::from_value(value).unwrap()
  }

  #[test]
  #[serial]
  fn inheritance_then_staging_overlay() {
    let loader = Loader::with_source(
      MemorySource::new()
        .with_file(
          "/repo/root.jsonc",
          r#"{ "profile": "default", "env": { "staging": { "profile": "staging" } } }"#,
        )
        .with_file(
          "/repo/svc/hookdeck.jsonc",
          r#"{
            // service manifest
            "extends": "../root.jsonc",
            "destination": { "name": "d", "config": { "url": "https://dev" } },
          }"#,
        ),
    );

    let resolved = load_resolved_with(&loader, Path::new("/repo/svc/hookdeck.jsonc"), "staging").unwrap();
    assert_eq!(resolved.profile.as_deref(), Some("staging"));
    assert_eq!(resolved.destinations[0].name, "d");
    assert_eq!(resolved.destinations[0].config.as_ref().unwrap()["url"], "https://dev");
    assert!(resolved.env.is_none());
  }

  #[test]
  #[serial]
  fn per_resource_overrides_without_env_block() {
    let m = manifest(json!({
      "destinations": [{
        "name": "d",
        "url": "https://default",
        "env": {
          "staging": { "url": "https://staging" },
          "production": { "url": "${HOOKDECK_DEPLOY_UNSET_PROD_URL}" }
        }
      }]
    }));

    temp_env::with_var_unset("HOOKDECK_DEPLOY_UNSET_PROD_URL", || {
      let resolved = resolve(&m, "staging").unwrap();
      assert_eq!(resolved.destinations[0].url.as_deref(), Some("https://staging"));
      assert!(resolved.destinations[0].env.is_empty());

      let resolved = resolve(&m, "").unwrap();
      assert_eq!(resolved.destinations[0].url.as_deref(), Some("https://default"));
    });
  }

  #[test]
  #[serial]
  fn unknown_environment_without_any_declaration_fails() {
    let m = manifest(json!({ "sources": [{ "name": "s" }] }));
    let err = resolve(&m, "qa").unwrap_err();
    assert!(matches!(err, ManifestError::UnknownEnvironment { ref name, .. } if name == "qa"));
  }

  #[test]
  #[serial]
  fn env_block_is_strict() {
    let m = manifest(json!({
      "env": { "staging": {} },
      "destinations": [{ "name": "d", "env": { "production": { "url": "https://prod" } } }]
    }));

    assert!(resolve(&m, "production").is_err());
    assert!(resolve(&m, "staging").is_ok());
  }

  #[test]
  #[serial]
  fn both_levels_and_interpolation() {
    let m = manifest(json!({
      "env": {
        "production": { "destinations": [{ "name": "d", "rate_limit": 100 }] }
      },
      "destinations": [{
        "name": "d",
        "url": "https://dev",
        "env": { "production": { "url": "https://${HOOKDECK_DEPLOY_TEST_HOST}" } }
      }]
    }));

    temp_env::with_var("HOOKDECK_DEPLOY_TEST_HOST", Some("prod.example.com"), || {
      let resolved = resolve(&m, "production").unwrap();
      let d = &resolved.destinations[0];
      assert_eq!(d.url.as_deref(), Some("https://prod.example.com"));
      assert_eq!(d.rate_limit, Some(100));
    });
  }
}
