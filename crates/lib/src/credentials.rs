//! Hookdeck API credentials.
//!
//! Lookup order:
//!
//! 1. the `HOOKDECK_API_KEY` environment variable
//! 2. `.hookdeck/config.toml` in the working directory
//! 3. `~/.config/hookdeck/config.toml`
//!
//! Config files hold one table per profile:
//!
//! ```toml
//! profile = "staging"
//!
//! [staging]
//! api_key = "..."
//! project_id = "..."
//! ```

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

pub const API_KEY_ENV: &str = "HOOKDECK_API_KEY";
pub const DEFAULT_PROFILE: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
  pub api_key: String,
  pub project_id: Option<String>,
}

#[derive(Debug, Error)]
pub enum CredentialsError {
  #[error("no credentials found: set {API_KEY_ENV} or run 'hookdeck login'")]
  NoCredentials,

  #[error("failed to read {}: {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse {}: {source}", path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },

  #[error("profile '{profile}' not found in {}", path.display())]
  ProfileNotFound { profile: String, path: PathBuf },

  #[error("no API key found in profile '{profile}' at {}", path.display())]
  MissingApiKey { profile: String, path: PathBuf },
}

/// Resolve credentials for `profile` from the environment and config files.
///
/// An empty or absent profile falls back to the file's top-level `profile`
/// key, then to `default`.
pub fn resolve(profile: Option<&str>) -> Result<Credentials, CredentialsError> {
  let env_key = std::env::var(API_KEY_ENV).ok();
  resolve_from(profile, env_key.as_deref(), &config_paths())
}

/// Candidate config files in lookup order.
pub fn config_paths() -> Vec<PathBuf> {
  let mut paths = vec![PathBuf::from(".hookdeck").join("config.toml")];
  if let Some(home) = dirs::home_dir() {
    paths.push(home.join(".config").join("hookdeck").join("config.toml"));
  }
  paths
}

/// Resolve against an explicit API key and candidate files.
pub fn resolve_from(
  profile: Option<&str>,
  env_key: Option<&str>,
  candidates: &[PathBuf],
) -> Result<Credentials, CredentialsError> {
  if let Some(key) = env_key.filter(|k| !k.is_empty()) {
    debug!("using API key from {API_KEY_ENV}");
    return Ok(Credentials {
      api_key: key.to_string(),
      project_id: None,
    });
  }

  let path = candidates
    .iter()
    .find(|p| p.is_file())
    .ok_or(CredentialsError::NoCredentials)?;
  load_profile(path, profile)
}

fn load_profile(path: &Path, profile: Option<&str>) -> Result<Credentials, CredentialsError> {
  let content = std::fs::read_to_string(path).map_err(|source| CredentialsError::Read {
    path: path.to_path_buf(),
    source,
  })?;
  let table: toml::Table = toml::from_str(&content).map_err(|source| CredentialsError::Parse {
    path: path.to_path_buf(),
    source,
  })?;

  let profile = profile
    .filter(|p| !p.is_empty())
    .or_else(|| table.get("profile").and_then(|p| p.as_str()))
    .unwrap_or(DEFAULT_PROFILE)
    .to_string();

  let section = table
    .get(&profile)
    .and_then(|s| s.as_table())
    .ok_or_else(|| CredentialsError::ProfileNotFound {
      profile: profile.clone(),
      path: path.to_path_buf(),
    })?;

  let field = |key: &str| {
    section
      .get(key)
      .and_then(|v| v.as_str())
      .filter(|v| !v.is_empty())
      .map(str::to_string)
  };

  let api_key = field("api_key").ok_or_else(|| CredentialsError::MissingApiKey {
    profile: profile.clone(),
    path: path.to_path_buf(),
  })?;

  debug!(profile = %profile, path = %path.display(), "loaded credentials");
  Ok(Credentials {
    api_key,
    project_id: field("project_id"),
  })
}
