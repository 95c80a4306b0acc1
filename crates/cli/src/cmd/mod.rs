mod deploy;
mod drift;
mod schema;
mod status;

pub use deploy::cmd_deploy;
pub use drift::cmd_drift;
pub use schema::cmd_schema;
pub use status::cmd_status;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::debug;

use hookdeck_deploy_lib::api::HookdeckClient;
use hookdeck_deploy_lib::credentials;
use hookdeck_deploy_lib::manifest::Manifest;
use hookdeck_deploy_lib::pipeline;
use hookdeck_deploy_lib::project::{MANIFEST_FILE_NAMES, find_manifest_file};

use crate::GlobalArgs;

/// Overrides the API base URL.
pub const API_URL_ENV: &str = "HOOKDECK_API_URL";

/// The manifest named by `--file`, or the one in the working directory.
fn manifest_path(global: &GlobalArgs) -> Result<PathBuf> {
  if let Some(file) = &global.file {
    if !file.is_file() {
      bail!("manifest file not found: {}", file.display());
    }
    return Ok(file.clone());
  }

  let cwd = std::env::current_dir().context("Failed to get working directory")?;
  find_manifest_file(&cwd)
    .with_context(|| format!("no {} found in {}", MANIFEST_FILE_NAMES.join(" or "), cwd.display()))
}

/// Locate, load and resolve the single manifest for this invocation.
fn load_manifest(global: &GlobalArgs) -> Result<(PathBuf, Manifest)> {
  let path = manifest_path(global)?;
  debug!(path = %path.display(), env = %global.env, "loading manifest");
  let manifest = pipeline::load_resolved(&path, &global.env)
    .with_context(|| format!("Failed to load manifest {}", path.display()))?;
  Ok((path, manifest))
}

/// API client for `profile`, honoring the base URL override.
fn api_client(profile: Option<&str>) -> Result<HookdeckClient> {
  let creds = credentials::resolve(profile).context("Failed to resolve credentials")?;
  let client = HookdeckClient::new(creds.api_key, creds.project_id);
  Ok(match std::env::var(API_URL_ENV) {
    Ok(url) if !url.is_empty() => client.with_base_url(url),
    _ => client,
  })
}

/// `--profile` wins over the profile declared by the manifest or project.
fn pick_profile<'a>(flag: Option<&'a str>, declared: Option<&'a str>) -> Option<&'a str> {
  flag.filter(|p| !p.is_empty()).or(declared.filter(|p| !p.is_empty()))
}

fn runtime() -> Result<tokio::runtime::Runtime> {
  tokio::runtime::Runtime::new().context("Failed to create async runtime")
}

fn parent_dir(path: &Path) -> PathBuf {
  match path.parent() {
    Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
    _ => PathBuf::from("."),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_pick_profile() {
    assert_eq!(pick_profile(Some("cli"), Some("manifest")), Some("cli"));
    assert_eq!(pick_profile(Some(""), Some("manifest")), Some("manifest"));
    assert_eq!(pick_profile(None, Some("")), None);
    assert_eq!(pick_profile(None, None), None);
  }

  #[test]
  fn test_parent_dir() {
    assert_eq!(parent_dir(Path::new("hookdeck.jsonc")), PathBuf::from("."));
    assert_eq!(parent_dir(Path::new("svc/hookdeck.jsonc")), PathBuf::from("svc"));
  }
}
