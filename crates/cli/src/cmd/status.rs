//! Status command implementation.
//!
//! Displays whether each declared resource exists on Hookdeck, with its ID and
//! (for sources) its URL.

use anyhow::Result;
use owo_colors::{OwoColorize, Stream};

use hookdeck_deploy_lib::manifest::ResourceKind;
use hookdeck_deploy_lib::status::{ResourceState, ResourceStatus, check};

use super::{api_client, load_manifest, pick_profile, runtime};
use crate::GlobalArgs;
use crate::output::{pad_name, print_info, print_json, section_title, symbols};

pub fn cmd_status(global: &GlobalArgs) -> Result<()> {
  let (_, manifest) = load_manifest(global)?;
  let client = api_client(pick_profile(global.profile.as_deref(), manifest.profile.as_deref()))?;

  let rt = runtime()?;
  let statuses = rt.block_on(check(&client, &manifest));

  if global.output.is_json() {
    return print_json(&statuses);
  }

  if statuses.is_empty() {
    print_info("No resources defined in manifest.");
    return Ok(());
  }

  let kinds = [
    ResourceKind::Source,
    ResourceKind::Transformation,
    ResourceKind::Destination,
    ResourceKind::Connection,
  ];
  for kind in kinds {
    let rows: Vec<&ResourceStatus> = statuses.iter().filter(|t| t.kind == kind).collect();
    if rows.is_empty() {
      continue;
    }
    println!("{}:", section_title(kind.as_str()));
    for s in rows {
      println!("{}", status_line(s));
    }
  }

  Ok(())
}

fn status_line(s: &ResourceStatus) -> String {
  match &s.state {
    ResourceState::Found { id, url } => {
      let mut line = format!(
        "  {} {} id: {}",
        symbols::SUCCESS.if_supports_color(Stream::Stdout, |t| t.green()),
        pad_name(&s.name),
        id
      );
      if let Some(url) = url {
        line.push_str(&format!("  url: {url}"));
      }
      line
    }
    ResourceState::NotFound => format!(
      "  {} {} {}",
      symbols::WARNING.if_supports_color(Stream::Stdout, |t| t.yellow()),
      pad_name(&s.name),
      "not found".if_supports_color(Stream::Stdout, |t| t.yellow())
    ),
    ResourceState::Error { message } => format!(
      "  {} {} error: {}",
      symbols::ERROR.if_supports_color(Stream::Stdout, |t| t.red()),
      pad_name(&s.name),
      message
    ),
  }
}
