//! `${VAR}` substitution across every string in a manifest.
//!
//! The manifest is encoded to JSON, placeholders are replaced in the encoded
//! text and the result is decoded again. Substituted values are JSON-escaped so
//! quotes or backslashes in a variable cannot break the document.

use tracing::debug;

use super::ManifestError;
use super::types::Manifest;

/// Substitute placeholders from the process environment.
pub fn interpolate_env_vars(manifest: &Manifest) -> Result<Manifest, ManifestError> {
  interpolate_with(manifest, |name| std::env::var(name).ok())
}

/// Substitute placeholders using `lookup`.
///
/// Every undefined variable is collected before failing, so the error names
/// all of them. The input manifest is left untouched.
pub fn interpolate_with<F>(manifest: &Manifest, lookup: F) -> Result<Manifest, ManifestError>
where
  F: Fn(&str) -> Option<String>,
{
  let encoded = serde_json::to_string(manifest).map_err(ManifestError::Serialize)?;
  let (expanded, missing) = substitute(&encoded, &lookup);

  if !missing.is_empty() {
    return Err(ManifestError::UndefinedVariables(missing));
  }
  if expanded == encoded {
    return Ok(manifest.clone());
  }

  debug!("interpolated environment variables");
  serde_json::from_str(&expanded).map_err(ManifestError::Serialize)
}

/// Replace every `${NAME}` in `input`. `NAME` is any run of characters other
/// than `}`. Returns the expanded text and the undefined names in first-seen
/// order.
fn substitute<F>(input: &str, lookup: &F) -> (String, Vec<String>)
where
  F: Fn(&str) -> Option<String>,
{
  let mut out = String::with_capacity(input.len());
  let mut missing: Vec<String> = Vec::new();
  let mut rest = input;

  while let Some(start) = rest.find("${") {
    out.push_str(&rest[..start]);
    let after = &rest[start + 2..];

    let Some(end) = after.find('}') else {
      out.push_str(&rest[start..]);
      return (out, missing);
    };

    if end == 0 {
      out.push_str("${");
      rest = after;
      continue;
    }

    let name = &after[..end];
    match lookup(name) {
      Some(value) => out.push_str(&escape(&value)),
      None => {
        if !missing.iter().any(|m| m == name) {
          missing.push(name.to_string());
        }
        out.push_str(&rest[start..start + 2 + end + 1]);
      }
    }
    rest = &after[end + 1..];
  }

  out.push_str(rest);
  (out, missing)
}

/// JSON-escape `value` for insertion inside an existing string literal.
fn escape(value: &str) -> String {
  let quoted = serde_json::Value::String(value.to_string()).to_string();
  quoted[1..quoted.len() - 1].to_string()
}
