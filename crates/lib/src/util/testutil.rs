//! Test utilities for hookdeck-deploy-lib.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use crate::manifest::ManifestSource;
use crate::util::path::normalize;

/// In-memory file system for loader and deploy tests.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
  files: BTreeMap<PathBuf, String>,
}

impl MemorySource {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add a file. Paths are normalized so `/a/../b.jsonc` and `/b.jsonc` match.
  pub fn with_file(mut self, path: impl AsRef<Path>, content: &str) -> Self {
    self.files.insert(normalize(path.as_ref()), content.to_string());
    self
  }
}

impl ManifestSource for MemorySource {
  fn read_to_string(&self, path: &Path) -> io::Result<String> {
    self
      .files
      .get(&normalize(path))
      .cloned()
      .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("{} not found", path.display())))
  }

  fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
    Ok(normalize(path))
  }
}
