//! Project mode: many manifests under one `hookdeck.project.jsonc`.
//!
//! The project file sits at the root of a directory tree. Every
//! `hookdeck.jsonc` / `hookdeck.json` below it is loaded (with inheritance),
//! registered and validated as one set of resources.

pub mod registry;

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::manifest::{Loader, Manifest, ManifestError, resolve_env};
use crate::pipeline;

pub use registry::{Registry, ValidationError};

pub const PROJECT_FILE_NAMES: [&str; 2] = ["hookdeck.project.jsonc", "hookdeck.project.json"];
pub const MANIFEST_FILE_NAMES: [&str; 2] = ["hookdeck.jsonc", "hookdeck.json"];

/// A manifest that failed to load.
#[derive(Debug)]
pub struct LoadFailure {
  pub path: PathBuf,
  pub error: ManifestError,
}

impl std::fmt::Display for LoadFailure {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}: {}", self.path.display(), self.error)
  }
}

#[derive(Debug, Error)]
pub enum ProjectError {
  #[error("failed to read project file {}: {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse project file {}: {message}", path.display())]
  Parse { path: PathBuf, message: String },

  #[error("failed to discover manifests under {}: {source}", root.display())]
  Discover {
    root: PathBuf,
    #[source]
    source: walkdir::Error,
  },

  #[error("failed to load manifests:{}", list(.0))]
  Load(Vec<LoadFailure>),

  #[error("validation errors:{}", list(.0))]
  Validation(Vec<ValidationError>),

  #[error("environment '{0}' is not declared by the project or any manifest")]
  UnknownEnvironment(String),

  #[error(transparent)]
  Resolve(#[from] ManifestError),
}

fn list<T: std::fmt::Display>(items: &[T]) -> String {
  items.iter().fold(String::new(), |mut out, item| {
    let _ = write!(out, "\n  {item}");
    out
  })
}

/// Contents of `hookdeck.project.jsonc`.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub version: Option<String>,
  #[serde(skip_serializing_if = "BTreeMap::is_empty")]
  pub env: BTreeMap<String, EnvConfig>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub profile: Option<String>,
}

impl ProjectConfig {
  pub fn load(path: &Path) -> Result<Self, ProjectError> {
    let content = std::fs::read_to_string(path).map_err(|source| ProjectError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    json5::from_str(&content).map_err(|e| ProjectError::Parse {
      path: path.to_path_buf(),
      message: e.to_string(),
    })
  }
}

/// The project file in `dir`, if there is one.
pub fn find_project_file(dir: &Path) -> Option<PathBuf> {
  PROJECT_FILE_NAMES.iter().map(|name| dir.join(name)).find(|p| p.is_file())
}

/// The manifest file in `dir`, if there is one.
pub fn find_manifest_file(dir: &Path) -> Option<PathBuf> {
  MANIFEST_FILE_NAMES.iter().map(|name| dir.join(name)).find(|p| p.is_file())
}

/// Every manifest file under `root`, sorted by path.
///
/// Hidden directories and `node_modules` are skipped.
pub fn discover_manifests(root: &Path) -> Result<Vec<PathBuf>, ProjectError> {
  let walker = WalkDir::new(root).sort_by_file_name().into_iter().filter_entry(|e| {
    if e.depth() == 0 || !e.file_type().is_dir() {
      return true;
    }
    e.file_name()
      .to_str()
      .map(|name| !name.starts_with('.') && name != "node_modules")
      .unwrap_or(true)
  });

  let mut paths = Vec::new();
  for entry in walker {
    let entry = entry.map_err(|source| ProjectError::Discover {
      root: root.to_path_buf(),
      source,
    })?;
    let is_manifest = entry
      .file_name()
      .to_str()
      .is_some_and(|name| MANIFEST_FILE_NAMES.contains(&name));
    if entry.file_type().is_file() && is_manifest {
      paths.push(entry.into_path());
    }
  }

  paths.sort();
  Ok(paths)
}

/// A loaded and validated project.
#[derive(Debug, Clone)]
pub struct Project {
  pub config: ProjectConfig,
  pub root_dir: PathBuf,
  pub manifests: Vec<(PathBuf, Manifest)>,
  pub registry: Registry,
}

impl Project {
  /// Load the project file at `path` and every manifest below its directory.
  ///
  /// All load failures are reported together, then all validation errors.
  pub fn load(path: &Path) -> Result<Self, ProjectError> {
    let config = ProjectConfig::load(path)?;
    let root_dir = match path.parent() {
      Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
      _ => PathBuf::from("."),
    };

    let loader = Loader::new();
    let mut manifests = Vec::new();
    let mut failures = Vec::new();
    for manifest_path in discover_manifests(&root_dir)? {
      match loader.load_with_inheritance(&manifest_path) {
        Ok(manifest) => manifests.push((manifest_path, manifest)),
        Err(error) => failures.push(LoadFailure {
          path: manifest_path,
          error,
        }),
      }
    }
    if !failures.is_empty() {
      return Err(ProjectError::Load(failures));
    }

    let mut registry = Registry::new();
    for (manifest_path, manifest) in &manifests {
      registry.add_manifest(manifest_path, manifest);
    }
    let errors = registry.validate();
    if !errors.is_empty() {
      return Err(ProjectError::Validation(errors));
    }

    info!(root = %root_dir.display(), manifests = manifests.len(), "loaded project");
    Ok(Project {
      config,
      root_dir,
      manifests,
      registry,
    })
  }

  /// Credential profile configured for `env_name`.
  pub fn profile_for(&self, env_name: &str) -> Option<&str> {
    self
      .config
      .env
      .get(env_name)
      .and_then(|e| e.profile.as_deref())
      .filter(|p| !p.is_empty())
  }

  /// Whether `env_name` is declared by the project file, a manifest `env`
  /// block or a per-resource override.
  pub fn declares_env(&self, env_name: &str) -> bool {
    self.config.env.contains_key(env_name)
      || self.manifests.iter().any(|(_, m)| {
        m.env.as_ref().is_some_and(|block| block.contains_key(env_name)) || m.has_resource_override(env_name)
      })
  }

  /// Resolve every manifest for `env_name` into one deployable manifest.
  ///
  /// Manifest-level overlays apply to the manifests that declare the
  /// environment; the others contribute their base resources.
  pub fn resolve(&self, env_name: &str) -> Result<Manifest, ProjectError> {
    if !env_name.is_empty() && !self.declares_env(env_name) {
      return Err(ProjectError::UnknownEnvironment(env_name.to_string()));
    }

    let mut combined = Manifest::default();
    for (path, manifest) in &self.manifests {
      let declares = manifest.env.as_ref().is_some_and(|block| block.contains_key(env_name));
      let overlaid = resolve_env(manifest, if declares { env_name } else { "" })?;
      debug!(path = %path.display(), overlay = declares, "collected manifest");

      combined.sources.extend(overlaid.sources);
      combined.destinations.extend(overlaid.destinations);
      combined.transformations.extend(overlaid.transformations);
      combined.connections.extend(overlaid.connections);
    }

    Ok(pipeline::resolve_per_resource(&combined, env_name)?)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;
  use tempfile::TempDir;

  fn write(dir: &TempDir, rel: &str, content: &str) -> PathBuf {
    let path = dir.path().join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, content).unwrap();
    path
  }

  fn sample_project() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let project = write(
      &dir,
      "hookdeck.project.jsonc",
      r#"{
        // project root
        "version": "2",
        "env": { "staging": { "profile": "staging" } },
      }"#,
    );
    write(
      &dir,
      "sources/hookdeck.jsonc",
      r#"{ "sources": [{ "name": "webhook-src", "type": "Stripe" }] }"#,
    );
    write(
      &dir,
      "api/hookdeck.jsonc",
      r#"{
        "destinations": [{
          "name": "api-dest",
          "url": "https://api.example.com",
          "env": { "staging": { "url": "https://staging.example.com" } }
        }],
        "connections": [{ "name": "webhook-to-api", "source": "webhook-src", "destination": "api-dest" }]
      }"#,
    );
    (dir, project)
  }

  #[test]
  fn discovers_manifests_sorted_and_skips_hidden() {
    let dir = TempDir::new().unwrap();
    write(&dir, "b/hookdeck.json", "{}");
    write(&dir, "a/nested/hookdeck.jsonc", "{}");
    write(&dir, ".git/hookdeck.jsonc", "{}");
    write(&dir, "node_modules/pkg/hookdeck.jsonc", "{}");
    write(&dir, "a/other.jsonc", "{}");

    let found = discover_manifests(dir.path()).unwrap();
    assert_eq!(
      found,
      vec![dir.path().join("a/nested/hookdeck.jsonc"), dir.path().join("b/hookdeck.json")]
    );
  }

  #[test]
  #[serial]
  fn loads_and_resolves_a_project() {
    let (_dir, path) = sample_project();
    let project = Project::load(&path).unwrap();

    assert_eq!(project.config.version.as_deref(), Some("2"));
    assert_eq!(project.profile_for("staging"), Some("staging"));
    assert_eq!(project.profile_for("production"), None);
    assert_eq!(project.registry.resources().resource_count(), 3);

    let staging = project.resolve("staging").unwrap();
    assert_eq!(staging.sources[0].name, "webhook-src");
    assert_eq!(staging.destinations[0].url.as_deref(), Some("https://staging.example.com"));
    assert!(staging.destinations[0].env.is_empty());

    let base = project.resolve("").unwrap();
    assert_eq!(base.destinations[0].url.as_deref(), Some("https://api.example.com"));

    assert!(matches!(
      project.resolve("qa").unwrap_err(),
      ProjectError::UnknownEnvironment(name) if name == "qa"
    ));
  }

  #[test]
  fn collects_every_validation_error() {
    let (dir, path) = sample_project();
    write(&dir, "dup/hookdeck.jsonc", r#"{ "sources": [{ "name": "webhook-src" }] }"#);
    write(
      &dir,
      "broken/hookdeck.jsonc",
      r#"{ "connections": [{ "name": "x", "source": "ghost", "destination": "api-dest" }] }"#,
    );

    match Project::load(&path).unwrap_err() {
      ProjectError::Validation(errors) => {
        assert_eq!(errors.len(), 2);
        let message = ProjectError::Validation(errors).to_string();
        assert!(message.contains("duplicate source 'webhook-src'"));
        assert!(message.contains("undefined source 'ghost'"));
      }
      other => panic!("expected validation errors, got {other:?}"),
    }
  }

  #[test]
  fn collects_every_load_failure() {
    let (dir, path) = sample_project();
    write(&dir, "bad1/hookdeck.jsonc", "{ nope");
    write(&dir, "bad2/hookdeck.jsonc", r#"{ "extends": "missing.jsonc" }"#);

    match Project::load(&path).unwrap_err() {
      ProjectError::Load(failures) => {
        assert_eq!(failures.len(), 2);
        assert!(matches!(failures[0].error, ManifestError::Parse { .. }));
        assert!(matches!(failures[1].error, ManifestError::NotFound { .. }));
      }
      other => panic!("expected load failures, got {other:?}"),
    }
  }

  #[test]
  fn finds_project_and_manifest_files() {
    let dir = TempDir::new().unwrap();
    assert_eq!(find_project_file(dir.path()), None);
    assert_eq!(find_manifest_file(dir.path()), None);

    write(&dir, "hookdeck.project.json", "{}");
    write(&dir, "hookdeck.jsonc", "{}");
    assert_eq!(find_project_file(dir.path()), Some(dir.path().join("hookdeck.project.json")));
    assert_eq!(find_manifest_file(dir.path()), Some(dir.path().join("hookdeck.jsonc")));
  }
}
