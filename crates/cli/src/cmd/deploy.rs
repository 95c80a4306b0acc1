//! Implementation of the `hookdeck-deploy deploy` command.
//!
//! Single-file mode deploys one manifest (with its `extends` chain). Project
//! mode deploys every manifest under a `hookdeck.project.jsonc`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use owo_colors::{OwoColorize, Stream};
use tracing::info;

use hookdeck_deploy_lib::deploy::{DeployAction, DeployOptions, DeployResult, deploy};
use hookdeck_deploy_lib::manifest::{FsSource, Manifest, ResourceKind};
use hookdeck_deploy_lib::project::{PROJECT_FILE_NAMES, Project, find_project_file};
use hookdeck_deploy_lib::wrangler;

use super::{api_client, load_manifest, parent_dir, pick_profile, runtime};
use crate::GlobalArgs;
use crate::output::{pad_name, print_info, print_json, print_success, print_warning, section_title, symbols};

pub fn cmd_deploy(global: &GlobalArgs, project: Option<PathBuf>, sync_wrangler: bool) -> Result<()> {
  match project_path(global, project)? {
    Some(path) => deploy_project(global, &path),
    None => deploy_single(global, sync_wrangler),
  }
}

/// Project mode applies when `--project` is given, or when no `--file` is
/// given and the working directory holds a project file.
fn project_path(global: &GlobalArgs, flag: Option<PathBuf>) -> Result<Option<PathBuf>> {
  if let Some(path) = flag {
    if !path.is_file() {
      bail!("project file not found: {}", path.display());
    }
    return Ok(Some(path));
  }
  if global.file.is_some() {
    return Ok(None);
  }
  let cwd = std::env::current_dir().context("Failed to get working directory")?;
  Ok(find_project_file(&cwd))
}

fn deploy_single(global: &GlobalArgs, sync_wrangler: bool) -> Result<()> {
  let (path, manifest) = load_manifest(global)?;
  let profile = pick_profile(global.profile.as_deref(), manifest.profile.as_deref()).map(str::to_string);

  let result = run(global, &manifest, profile.as_deref())?;
  report(global, &result)?;

  if sync_wrangler
    && !global.dry_run
    && let Some(source_id) = result.first_source_id()
  {
    sync_source_url(&parent_dir(&path), &global.env, source_id, global.output.is_json());
  }

  Ok(())
}

fn deploy_project(global: &GlobalArgs, path: &Path) -> Result<()> {
  info!(path = %path.display(), "loading project");
  let project = Project::load(path).with_context(|| {
    format!(
      "Failed to load project {} (expected one of {})",
      path.display(),
      PROJECT_FILE_NAMES.join(", ")
    )
  })?;

  let profile = pick_profile(global.profile.as_deref(), project.profile_for(&global.env)).map(str::to_string);
  let manifest = project
    .resolve(&global.env)
    .with_context(|| format!("Failed to resolve project for environment '{}'", global.env))?;

  let result = run(global, &manifest, profile.as_deref())?;
  report(global, &result)
}

fn run(global: &GlobalArgs, manifest: &Manifest, profile: Option<&str>) -> Result<DeployResult> {
  let client = if global.dry_run { None } else { Some(api_client(profile)?) };
  let options = DeployOptions {
    dry_run: global.dry_run,
  };

  if global.dry_run && !global.output.is_json() {
    print_info("Dry-run mode: no changes will be applied");
  }

  let rt = runtime()?;
  rt.block_on(deploy(client.as_ref(), manifest, &FsSource, options))
    .context("Deploy failed")
}

fn report(global: &GlobalArgs, result: &DeployResult) -> Result<()> {
  if global.output.is_json() {
    return print_json(result);
  }

  if result.resources.is_empty() {
    print_info("No resources defined.");
    return Ok(());
  }

  let kinds = [
    ResourceKind::Source,
    ResourceKind::Transformation,
    ResourceKind::Destination,
    ResourceKind::Connection,
  ];
  for kind in kinds {
    let mut rows = result.of_kind(kind).peekable();
    if rows.peek().is_none() {
      continue;
    }
    println!("{}:", section_title(kind.as_str()));
    for r in rows {
      let symbol = match r.action {
        DeployAction::WouldUpsert => symbols::ARROW,
        DeployAction::Upserted => symbols::PLUS,
      };
      let mut line = format!(
        "  {} {} {}",
        symbol.if_supports_color(Stream::Stdout, |s| s.green()),
        pad_name(&r.name),
        r.action.as_str()
      );
      if let Some(id) = &r.id {
        line.push_str(&format!("  id: {id}"));
      }
      if let Some(url) = &r.url {
        line.push_str(&format!("  url: {url}"));
      }
      println!("{line}");
    }
  }

  println!();
  if global.dry_run {
    print_success(&format!("{} resource(s) would be deployed", result.resources.len()));
  } else {
    print_success(&format!("Deployed {} resource(s)", result.resources.len()));
  }
  Ok(())
}

/// Write the source URL into the wrangler config next to the manifest.
///
/// Failures only produce a warning.
fn sync_source_url(dir: &Path, env_name: &str, source_id: &str, quiet: bool) {
  let Some(config) = wrangler::find_config(dir) else {
    return;
  };
  let env_name = if env_name.is_empty() { wrangler::DEFAULT_ENV } else { env_name };

  match wrangler::sync_source_url(&config, env_name, &wrangler::source_url(source_id)) {
    Ok(true) if !quiet => print_info(&format!(
      "Synced source URL to {} (env: {})",
      config.display(),
      env_name
    )),
    Ok(_) => {}
    Err(e) => print_warning(&format!("wrangler sync failed: {e}")),
  }
}
