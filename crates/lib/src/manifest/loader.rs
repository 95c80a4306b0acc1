//! Manifest loading and `extends` inheritance.
//!
//! Manifests are JSONC: `//` and `/* */` comments and trailing commas are
//! accepted. A manifest may name a parent with `extends`; the chain is followed
//! transitively and each level is merged parent-first with [`Merge`].

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::ManifestError;
use super::merge::Merge;
use super::types::{Manifest, TransformationConfig};
use crate::util::path::normalize;

/// Read access to manifest files.
///
/// The loader never touches the file system directly, so tests can supply an
/// in-memory implementation.
pub trait ManifestSource {
  fn read_to_string(&self, path: &Path) -> io::Result<String>;

  /// Canonical absolute form of `path`, used as the identity of a manifest
  /// during cycle detection.
  fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
    Ok(normalize(&std::path::absolute(path)?))
  }
}

impl<T: ManifestSource + ?Sized> ManifestSource for &T {
  fn read_to_string(&self, path: &Path) -> io::Result<String> {
    (**self).read_to_string(path)
  }

  fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
    (**self).canonicalize(path)
  }
}

/// The real file system.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsSource;

impl ManifestSource for FsSource {
  fn read_to_string(&self, path: &Path) -> io::Result<String> {
    std::fs::read_to_string(path)
  }

  fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
    dunce::canonicalize(path)
  }
}

/// Loads manifests through a [`ManifestSource`].
#[derive(Debug, Default, Clone)]
pub struct Loader<S = FsSource> {
  source: S,
}

impl Loader<FsSource> {
  pub fn new() -> Self {
    Self { source: FsSource }
  }
}

impl<S: ManifestSource> Loader<S> {
  pub fn with_source(source: S) -> Self {
    Self { source }
  }

  pub fn source(&self) -> &S {
    &self.source
  }

  /// Load a single manifest file without following `extends`.
  ///
  /// Deprecated `env_vars` are folded into `env` and relative `code_file`
  /// paths are resolved against the manifest's directory.
  pub fn load_file(&self, path: &Path) -> Result<Manifest, ManifestError> {
    let content = self.source.read_to_string(path).map_err(|e| read_error(path, e))?;
    let mut manifest = parse_manifest(&content, path)?;

    let dir = path.parent().unwrap_or(Path::new(""));
    normalize_manifest(&mut manifest, dir);

    debug!(path = %path.display(), resources = manifest.resource_count(), "loaded manifest");
    Ok(manifest)
  }

  /// Load a manifest and merge every ancestor named through `extends`.
  ///
  /// The returned manifest never carries an `extends` value.
  pub fn load_with_inheritance(&self, path: &Path) -> Result<Manifest, ManifestError> {
    let mut seen = HashSet::new();
    self.load_chain(path, &mut seen)
  }

  fn load_chain(&self, path: &Path, seen: &mut HashSet<PathBuf>) -> Result<Manifest, ManifestError> {
    let canonical = self.source.canonicalize(path).map_err(|e| read_error(path, e))?;
    if !seen.insert(canonical.clone()) {
      return Err(ManifestError::CircularExtends { path: canonical });
    }

    let mut manifest = self.load_file(&canonical)?;
    let extends = manifest.extends.take().filter(|e| !e.is_empty());
    let Some(extends) = extends else {
      return Ok(manifest);
    };

    let parent_path = normalize(&canonical.parent().unwrap_or(Path::new("")).join(&extends));
    debug!(child = %canonical.display(), parent = %parent_path.display(), "following extends");

    let parent = self.load_chain(&parent_path, seen)?;
    Ok(parent.merge(manifest))
  }
}

/// Load a manifest from disk and resolve its `extends` chain.
pub fn load_with_inheritance(path: impl AsRef<Path>) -> Result<Manifest, ManifestError> {
  Loader::new().load_with_inheritance(path.as_ref())
}

/// Parse JSONC manifest content. `path` is only used for error reporting.
pub fn parse_manifest(content: &str, path: &Path) -> Result<Manifest, ManifestError> {
  json5::from_str(content).map_err(|e| ManifestError::Parse {
    path: path.to_path_buf(),
    message: e.to_string(),
  })
}

fn read_error(path: &Path, source: io::Error) -> ManifestError {
  if source.kind() == io::ErrorKind::NotFound {
    ManifestError::NotFound {
      path: path.to_path_buf(),
    }
  } else {
    ManifestError::Read {
      path: path.to_path_buf(),
      source,
    }
  }
}

fn normalize_manifest(manifest: &mut Manifest, dir: &Path) {
  let overlays = manifest.env.iter_mut().flat_map(|block| block.values_mut());
  let overlay_transformations: Vec<&mut TransformationConfig> =
    overlays.flat_map(|o| o.transformations.iter_mut()).collect();

  for t in manifest.transformations.iter_mut().chain(overlay_transformations) {
    t.absorb_env_vars();
    resolve_code_file(&mut t.code_file, dir);
    for o in t.env_overrides.values_mut() {
      resolve_code_file(&mut o.code_file, dir);
    }
  }
}

fn resolve_code_file(code_file: &mut Option<String>, dir: &Path) {
  let Some(file) = code_file.as_mut() else {
    return;
  };
  // placeholders are resolved after interpolation, relative to the working directory
  if file.is_empty() || file.contains("${") || Path::new(file.as_str()).is_absolute() {
    return;
  }
  *file = normalize(&dir.join(file.as_str())).to_string_lossy().into_owned();
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::MemorySource;

  fn loader(files: &[(&str, &str)]) -> Loader<MemorySource> {
    let source = files
      .iter()
      .fold(MemorySource::new(), |source, (path, content)| source.with_file(path, content));
    Loader::with_source(source)
  }

  #[test]
  fn parses_jsonc_comments_and_trailing_commas() {
    let l = loader(&[(
      "/p/hookdeck.jsonc",
      r#"{
        // line comment
        "sources": [
          { "name": "a", /* inline */ },
        ],
      }"#,
    )]);

    let manifest = l.load_with_inheritance(Path::new("/p/hookdeck.jsonc")).unwrap();
    assert_eq!(manifest.sources[0].name, "a");
  }

  #[test]
  fn missing_file_is_not_found() {
    let l = loader(&[]);
    let err = l.load_with_inheritance(Path::new("/p/missing.jsonc")).unwrap_err();
    assert!(matches!(err, ManifestError::NotFound { .. }), "got {err:?}");
  }

  #[test]
  fn malformed_file_is_parse_error() {
    let l = loader(&[("/p/bad.jsonc", "{ \"sources\": [ }")]);
    let err = l.load_with_inheritance(Path::new("/p/bad.jsonc")).unwrap_err();
    match err {
      ManifestError::Parse { path, .. } => assert_eq!(path, PathBuf::from("/p/bad.jsonc")),
      other => panic!("expected parse error, got {other:?}"),
    }
  }

  #[test]
  fn missing_parent_is_not_found() {
    let l = loader(&[("/p/child.jsonc", r#"{ "extends": "base.jsonc" }"#)]);
    let err = l.load_with_inheritance(Path::new("/p/child.jsonc")).unwrap_err();
    match err {
      ManifestError::NotFound { path } => assert_eq!(path, PathBuf::from("/p/base.jsonc")),
      other => panic!("expected not found, got {other:?}"),
    }
  }

  #[test]
  fn extends_is_cleared_without_parent() {
    let l = loader(&[("/p/a.jsonc", r#"{ "extends": "", "version": "1" }"#)]);
    let manifest = l.load_with_inheritance(Path::new("/p/a.jsonc")).unwrap();
    assert_eq!(manifest.extends, None);
    assert_eq!(manifest.version.as_deref(), Some("1"));
  }

  #[test]
  fn inherits_transitively_relative_to_each_file() {
    let l = loader(&[
      ("/root.jsonc", r#"{ "profile": "default", "version": "1" }"#),
      ("/team/base.jsonc", r#"{ "extends": "../root.jsonc", "profile": "team" }"#),
      (
        "/team/svc/hookdeck.jsonc",
        r#"{ "extends": "../base.jsonc", "sources": [{ "name": "orders" }] }"#,
      ),
    ]);

    let manifest = l.load_with_inheritance(Path::new("/team/svc/hookdeck.jsonc")).unwrap();
    assert_eq!(manifest.version.as_deref(), Some("1"));
    assert_eq!(manifest.profile.as_deref(), Some("team"));
    assert_eq!(manifest.sources[0].name, "orders");
    assert_eq!(manifest.extends, None);
  }

  #[test]
  fn detects_cycles() {
    let l = loader(&[
      ("/p/a.jsonc", r#"{ "extends": "b.jsonc" }"#),
      ("/p/b.jsonc", r#"{ "extends": "a.jsonc" }"#),
    ]);

    let err = l.load_with_inheritance(Path::new("/p/a.jsonc")).unwrap_err();
    match err {
      ManifestError::CircularExtends { path } => assert_eq!(path, PathBuf::from("/p/a.jsonc")),
      other => panic!("expected circular extends, got {other:?}"),
    }
  }

  #[test]
  fn detects_self_extension() {
    let l = loader(&[("/p/a.jsonc", r#"{ "extends": "./a.jsonc" }"#)]);
    let err = l.load_with_inheritance(Path::new("/p/a.jsonc")).unwrap_err();
    assert!(matches!(err, ManifestError::CircularExtends { .. }));
  }

  #[test]
  fn visited_set_is_per_call() {
    let l = loader(&[
      ("/p/base.jsonc", r#"{ "version": "1" }"#),
      ("/p/child.jsonc", r#"{ "extends": "base.jsonc" }"#),
    ]);

    l.load_with_inheritance(Path::new("/p/child.jsonc")).unwrap();
    l.load_with_inheritance(Path::new("/p/child.jsonc")).unwrap();
  }

  #[test]
  fn child_destination_inherits_env_block() {
    let l = loader(&[
      (
        "/root.jsonc",
        r#"{ "profile": "default", "env": { "staging": { "profile": "staging" } } }"#,
      ),
      (
        "/svc/hookdeck.jsonc",
        r#"{ "extends": "../root.jsonc", "destination": { "name": "d", "config": { "url": "https://dev" } } }"#,
      ),
    ]);

    let manifest = l.load_with_inheritance(Path::new("/svc/hookdeck.jsonc")).unwrap();
    assert_eq!(manifest.profile.as_deref(), Some("default"));
    assert_eq!(manifest.destinations[0].name, "d");
    assert_eq!(
      manifest.env.as_ref().unwrap()["staging"].profile.as_deref(),
      Some("staging")
    );
  }

  #[test]
  fn folds_env_vars_and_resolves_code_file() {
    let l = loader(&[(
      "/p/svc/hookdeck.jsonc",
      r#"{
        "transformations": [{
          "name": "t",
          "code_file": "./handler.js",
          "env": { "A": "modern" },
          "env_vars": { "A": "legacy", "B": "legacy" },
          "env_overrides": { "staging": { "code_file": "../shared/staging.js" } }
        }]
      }"#,
    )]);

    let manifest = l.load_with_inheritance(Path::new("/p/svc/hookdeck.jsonc")).unwrap();
    let t = &manifest.transformations[0];
    assert_eq!(t.code_file.as_deref(), Some("/p/svc/handler.js"));
    assert_eq!(t.env_overrides["staging"].code_file.as_deref(), Some("/p/shared/staging.js"));
    assert_eq!(t.env["A"], "modern");
    assert_eq!(t.env["B"], "legacy");
    assert!(t.env_vars.is_empty());
  }

  #[test]
  fn code_file_is_relative_to_declaring_manifest() {
    let l = loader(&[
      (
        "/shared/base.jsonc",
        r#"{ "transformations": [{ "name": "t", "code_file": "t.js" }] }"#,
      ),
      ("/svc/hookdeck.jsonc", r#"{ "extends": "../shared/base.jsonc" }"#),
    ]);

    let manifest = l.load_with_inheritance(Path::new("/svc/hookdeck.jsonc")).unwrap();
    assert_eq!(manifest.transformations[0].code_file.as_deref(), Some("/shared/t.js"));
  }

  #[test]
  fn relative_manifest_keeps_leading_parent_dirs() {
    let l = loader(&[(
      "svc/hookdeck.jsonc",
      r#"{ "transformations": [{ "name": "t", "code_file": "../../../shared/t.js" }] }"#,
    )]);

    let manifest = l.load_file(Path::new("svc/hookdeck.jsonc")).unwrap();
    assert_eq!(manifest.transformations[0].code_file.as_deref(), Some("../../shared/t.js"));
  }

  #[test]
  fn missing_parent_on_disk_reports_normalized_path() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("svc")).unwrap();
    std::fs::write(dir.path().join("svc/hookdeck.jsonc"), r#"{ "extends": "../base.jsonc" }"#).unwrap();

    let err = load_with_inheritance(dir.path().join("svc/hookdeck.jsonc")).unwrap_err();
    let root = dunce::canonicalize(dir.path()).unwrap();
    match err {
      ManifestError::NotFound { path } => assert_eq!(path, root.join("base.jsonc")),
      other => panic!("expected not found, got {other:?}"),
    }
  }

  #[test]
  fn loads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("base.jsonc"), r#"{ "profile": "default" }"#).unwrap();
    std::fs::write(
      dir.path().join("hookdeck.jsonc"),
      r#"{ "extends": "base.jsonc", "sources": [{ "name": "s" }] }"#,
    )
    .unwrap();

    let manifest = load_with_inheritance(dir.path().join("hookdeck.jsonc")).unwrap();
    assert_eq!(manifest.profile.as_deref(), Some("default"));
    assert_eq!(manifest.sources[0].name, "s");
  }
}
