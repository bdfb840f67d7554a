mod cmd;
mod output;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::cmd::RenderArgs;
use crate::output::print_error;

/// stagefile - container recipes for HPC software stacks
#[derive(Parser)]
#[command(name = "stagefile")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Show debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Render a Lua recipe as a Dockerfile, Singularity definition or bash script
  Render(RenderArgs),

  /// List the supported container formats, distributions and architectures
  Info {
    /// Print as JSON
    #[arg(long)]
    json: bool,
  },
}

fn init_logging(verbose: bool) {
  let default_level = if verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .with_target(false)
    .init();
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_logging(cli.verbose);

  let result = match cli.command {
    Commands::Render(args) => cmd::cmd_render(&args),
    Commands::Info { json } => cmd::cmd_info(json),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      print_error(&format!("{err:#}"));
      ExitCode::FAILURE
    }
  }
}
