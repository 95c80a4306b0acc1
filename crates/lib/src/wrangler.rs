//! Sync the deployed source URL into a Cloudflare `wrangler.jsonc` file.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::info;

pub const SOURCE_URL_VAR: &str = "HOOKDECK_SOURCE_URL";
pub const DEFAULT_ENV: &str = "staging";
pub const FILE_NAMES: [&str; 2] = ["wrangler.jsonc", "wrangler.json"];

#[derive(Debug, Error)]
pub enum WranglerError {
  #[error("failed to read {}: {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse {}: {message}", path.display())]
  Parse { path: PathBuf, message: String },

  #[error("failed to encode {}: {source}", path.display())]
  Encode {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("failed to write {}: {source}", path.display())]
  Write {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// Ingest URL of a Hookdeck source.
pub fn source_url(source_id: &str) -> String {
  format!("https://hk-{source_id}.hookdeck.com")
}

/// First wrangler config file found in `dir`.
pub fn find_config(dir: &Path) -> Option<PathBuf> {
  FILE_NAMES.iter().map(|name| dir.join(name)).find(|p| p.is_file())
}

/// Set `env.<env_name>.vars.HOOKDECK_SOURCE_URL` to `url`.
///
/// Missing or non-object intermediate values are replaced with objects.
/// Returns `false` without writing when the value is already `url`. The file
/// is rewritten as tab-indented JSON, so comments are not preserved.
pub fn sync_source_url(path: &Path, env_name: &str, url: &str) -> Result<bool, WranglerError> {
  let content = std::fs::read_to_string(path).map_err(|source| WranglerError::Read {
    path: path.to_path_buf(),
    source,
  })?;
  let doc: Value = json5::from_str(&content).map_err(|e| WranglerError::Parse {
    path: path.to_path_buf(),
    message: e.to_string(),
  })?;

  let mut root = match doc {
    Value::Object(map) => map,
    _ => Map::new(),
  };
  let mut env = take_object(&mut root, "env");
  let mut entry = take_object(&mut env, env_name);
  let mut vars = take_object(&mut entry, "vars");

  if vars.get(SOURCE_URL_VAR).and_then(Value::as_str) == Some(url) {
    return Ok(false);
  }
  vars.insert(SOURCE_URL_VAR.to_string(), Value::String(url.to_string()));
  entry.insert("vars".to_string(), Value::Object(vars));
  env.insert(env_name.to_string(), Value::Object(entry));
  root.insert("env".to_string(), Value::Object(env));

  let mut out = Vec::new();
  let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
  let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
  root.serialize(&mut serializer).map_err(|source| WranglerError::Encode {
    path: path.to_path_buf(),
    source,
  })?;
  out.push(b'\n');

  std::fs::write(path, out).map_err(|source| WranglerError::Write {
    path: path.to_path_buf(),
    source,
  })?;

  info!(path = %path.display(), env = env_name, "synced source URL");
  Ok(true)
}

/// Detach the object stored under `key`, leaving a placeholder so the key
/// keeps its position when reinserted. Non-objects become empty objects.
fn take_object(map: &mut Map<String, Value>, key: &str) -> Map<String, Value> {
  match map.get_mut(key).map(Value::take) {
    Some(Value::Object(object)) => object,
    _ => Map::new(),
  }
}
