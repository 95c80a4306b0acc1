use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cmd;
mod output;

use cmd::{cmd_deploy, cmd_drift, cmd_schema, cmd_status};
use output::OutputFormat;

/// hookdeck-deploy - Deploy Hookdeck resources from manifest files
#[derive(Parser)]
#[command(name = "hookdeck-deploy")]
#[command(author, version, about, long_about = None)]
struct Cli {
  #[command(flatten)]
  global: GlobalArgs,

  #[command(subcommand)]
  command: Commands,
}

/// Flags shared by every command.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
  /// Manifest file path (default: hookdeck.jsonc or hookdeck.json)
  #[arg(short, long, global = true)]
  pub file: Option<PathBuf>,

  /// Environment overlay (e.g. staging, production)
  #[arg(short, long, global = true, default_value = "")]
  pub env: String,

  /// Preview changes without applying
  #[arg(long, global = true)]
  pub dry_run: bool,

  /// Override the credential profile
  #[arg(long, global = true)]
  pub profile: Option<String>,

  /// Enable verbose output
  #[arg(short, long, global = true)]
  pub verbose: bool,

  /// Output format
  #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
  pub output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
  /// Deploy the resources of a manifest or project
  Deploy {
    /// Project file; enables project mode
    #[arg(long)]
    project: Option<PathBuf>,

    /// Do not write the source URL back to wrangler.jsonc
    #[arg(long)]
    no_sync_wrangler: bool,
  },

  /// Compare the manifest with the live Hookdeck state
  Drift,

  /// Show whether each declared resource exists on Hookdeck
  Status,

  /// Print the JSON schema for manifest files
  Schema {
    /// Print the project file schema instead
    #[arg(long)]
    project: bool,
  },
}

fn main() -> Result<ExitCode> {
  let cli = Cli::parse();

  let default_level = if cli.global.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match cli.command {
    Commands::Deploy {
      project,
      no_sync_wrangler,
    } => cmd_deploy(&cli.global, project, !no_sync_wrangler)?,
    Commands::Drift => {
      if cmd_drift(&cli.global)? {
        return Ok(ExitCode::FAILURE);
      }
    }
    Commands::Status => cmd_status(&cli.global)?,
    Commands::Schema { project } => cmd_schema(project),
  }

  Ok(ExitCode::SUCCESS)
}
