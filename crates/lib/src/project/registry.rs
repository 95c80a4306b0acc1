//! Cross-manifest resource registry.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::manifest::{Manifest, ResourceKind};

/// A naming or reference problem across the manifests of a project.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
  #[error("duplicate {kind} '{name}': defined in {} and {}", first.display(), second.display())]
  Duplicate {
    kind: ResourceKind,
    name: String,
    first: PathBuf,
    second: PathBuf,
  },

  #[error("connection '{connection}' references undefined {kind} '{name}'")]
  UndefinedReference {
    connection: String,
    kind: ResourceKind,
    name: String,
  },
}

/// Resources collected from every manifest of a project.
///
/// Names must be unique within a kind; the same name may be used by a source
/// and a destination.
#[derive(Debug, Default, Clone)]
pub struct Registry {
  defined: HashMap<(ResourceKind, String), PathBuf>,
  resources: Manifest,
  duplicates: Vec<ValidationError>,
}

impl Registry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register every resource declared in `manifest`, loaded from `path`.
  pub fn add_manifest(&mut self, path: &Path, manifest: &Manifest) {
    for s in &manifest.sources {
      self.define(ResourceKind::Source, &s.name, path);
    }
    for d in &manifest.destinations {
      self.define(ResourceKind::Destination, &d.name, path);
    }
    for t in &manifest.transformations {
      self.define(ResourceKind::Transformation, &t.name, path);
    }
    for c in &manifest.connections {
      self.define(ResourceKind::Connection, &c.name, path);
    }

    self.resources.sources.extend(manifest.sources.iter().cloned());
    self.resources.destinations.extend(manifest.destinations.iter().cloned());
    self.resources.transformations.extend(manifest.transformations.iter().cloned());
    self.resources.connections.extend(manifest.connections.iter().cloned());
  }

  fn define(&mut self, kind: ResourceKind, name: &str, path: &Path) {
    match self.defined.get(&(kind, name.to_string())) {
      Some(first) => self.duplicates.push(ValidationError::Duplicate {
        kind,
        name: name.to_string(),
        first: first.clone(),
        second: path.to_path_buf(),
      }),
      None => {
        self.defined.insert((kind, name.to_string()), path.to_path_buf());
      }
    }
  }

  pub fn contains(&self, kind: ResourceKind, name: &str) -> bool {
    self.defined.contains_key(&(kind, name.to_string()))
  }

  /// Manifest file that first defined `name`.
  pub fn defined_in(&self, kind: ResourceKind, name: &str) -> Option<&Path> {
    self.defined.get(&(kind, name.to_string())).map(PathBuf::as_path)
  }

  /// All registered resources, in registration order.
  pub fn resources(&self) -> &Manifest {
    &self.resources
  }

  /// Every duplicate definition plus every connection reference to an
  /// undefined source, destination or transformation.
  pub fn validate(&self) -> Vec<ValidationError> {
    let mut errors = self.duplicates.clone();

    for c in &self.resources.connections {
      let references = c
        .source
        .iter()
        .map(|name| (ResourceKind::Source, name))
        .chain(c.destination.iter().map(|name| (ResourceKind::Destination, name)))
        .chain(c.transformations.iter().map(|name| (ResourceKind::Transformation, name)));

      for (kind, name) in references {
        if !name.is_empty() && !self.contains(kind, name) {
          errors.push(ValidationError::UndefinedReference {
            connection: c.name.clone(),
            kind,
            name: name.clone(),
          });
        }
      }
    }

    errors
  }
}
