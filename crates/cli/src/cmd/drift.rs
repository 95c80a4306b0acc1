//! Drift command implementation.
//!
//! Fetches the remote counterpart of every declared resource and reports the
//! ones that are missing or differ.

use anyhow::{Context, Result};
use owo_colors::{OwoColorize, Stream};

use hookdeck_deploy_lib::drift::{Diff, DriftStatus, RemoteState, detect};

use super::{api_client, load_manifest, pick_profile, runtime};
use crate::GlobalArgs;
use crate::output::{pad_name, print_json, print_success, print_warning, symbols};

/// Returns `true` when drift was found.
pub fn cmd_drift(global: &GlobalArgs) -> Result<bool> {
  let (_, manifest) = load_manifest(global)?;
  let client = api_client(pick_profile(global.profile.as_deref(), manifest.profile.as_deref()))?;

  let rt = runtime()?;
  let remote = rt
    .block_on(RemoteState::fetch(&client, &manifest))
    .context("Failed to fetch remote state")?;
  let diffs = detect(&manifest, &remote);

  if global.output.is_json() {
    print_json(&serde_json::json!({ "in_sync": diffs.is_empty(), "diffs": diffs }))?;
  } else if diffs.is_empty() {
    print_success("All resources in sync.");
  } else {
    print_diffs(&diffs);
    println!();
    print_warning(&format!("{} resource(s) drifted", diffs.len()));
  }

  Ok(!diffs.is_empty())
}

fn print_diffs(diffs: &[Diff]) {
  for d in diffs {
    match d.status {
      DriftStatus::Missing => println!(
        "  {} {:<16} {} {}",
        symbols::ERROR.if_supports_color(Stream::Stdout, |s| s.red()),
        d.kind.as_str(),
        pad_name(&d.name),
        "MISSING (not found on Hookdeck)".if_supports_color(Stream::Stdout, |s| s.red())
      ),
      DriftStatus::Drifted => {
        println!(
          "  {} {:<16} {} {}",
          symbols::TILDE.if_supports_color(Stream::Stdout, |s| s.yellow()),
          d.kind.as_str(),
          pad_name(&d.name),
          "DRIFTED".if_supports_color(Stream::Stdout, |s| s.yellow())
        );
        for f in &d.fields {
          println!("      {:<20} local:  {}", f.field, f.local);
          println!("      {:<20} remote: {}", "", f.remote);
        }
      }
    }
  }
}
