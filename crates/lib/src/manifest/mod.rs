//! Manifest model and the configuration resolution pipeline.
//!
//! - [`types`]: the manifest data model
//! - [`merge`]: layered merging of manifest values
//! - [`loader`]: JSONC loading and `extends` inheritance
//! - [`resolve`]: environment overlays (whole-manifest and per-resource)
//! - [`interpolate`]: `${VAR}` substitution

pub mod interpolate;
pub mod loader;
pub mod merge;
pub mod resolve;
pub mod types;

use std::path::PathBuf;

use thiserror::Error;

pub use interpolate::{interpolate_env_vars, interpolate_with};
pub use loader::{FsSource, Loader, ManifestSource, load_with_inheritance};
pub use merge::{Merge, Named, merge_opt};
pub use resolve::{
  resolve_connection_env, resolve_destination_env, resolve_env, resolve_resources, resolve_source_env,
  resolve_transformation_env,
};
pub use types::*;

/// Errors produced while loading or resolving a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
  #[error("manifest not found: {}", path.display())]
  NotFound { path: PathBuf },

  #[error("failed to read {}: {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse {}: {message}", path.display())]
  Parse { path: PathBuf, message: String },

  #[error("circular extends detected: {}", path.display())]
  CircularExtends { path: PathBuf },

  #[error("environment '{name}' not found ({reason})")]
  UnknownEnvironment { name: String, reason: &'static str },

  #[error("undefined environment variables: {}", .0.join(", "))]
  UndefinedVariables(Vec<String>),

  #[error("failed to re-encode manifest: {0}")]
  Serialize(#[source] serde_json::Error),
}
