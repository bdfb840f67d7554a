//! Implementation of the `stagefile render` command.
//!
//! Evaluates a Lua recipe and writes the rendered document, or the stage IR
//! as JSON, to stdout or a file.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use stagefile_lib::block::LicensePolicy;
use stagefile_lib::context::{ContainerFormat, DEFAULT_SINGULARITY_VERSION, DEFAULT_WORKING_DIRECTORY};
use stagefile_lib::eval::{RecipeOptions, evaluate_recipe};
use stagefile_lib::platform::Version;

use crate::output::OutputFormat;

#[derive(Debug, Args)]
pub struct RenderArgs {
  /// Path to the recipe file
  pub recipe: PathBuf,

  /// Container format to generate
  #[arg(short, long, default_value_t = ContainerFormat::Docker)]
  pub format: ContainerFormat,

  /// Singularity release the definition file targets
  #[arg(long, default_value_t = DEFAULT_SINGULARITY_VERSION)]
  pub singularity_version: Version,

  /// Where building blocks download and unpack sources
  #[arg(long, default_value = DEFAULT_WORKING_DIRECTORY)]
  pub working_directory: String,

  /// What to do when a block's license agreement was not accepted
  #[arg(long, default_value_t = LicensePolicy::Fatal)]
  pub license_policy: LicensePolicy,

  /// Value passed to the recipe as recipe.userarg.KEY (repeatable)
  #[arg(long = "userarg", value_name = "KEY=VALUE", value_parser = parse_userarg)]
  pub userargs: Vec<(String, String)>,

  /// Merge adjacent instructions of the same kind
  #[arg(long)]
  pub merge: bool,

  /// Write to this file instead of stdout
  #[arg(short, long)]
  pub out: Option<PathBuf>,

  /// Emit the rendered text or the stage IR as JSON
  #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
  pub emit: OutputFormat,
}

impl RenderArgs {
  fn options(&self) -> RecipeOptions {
    RecipeOptions {
      format: self.format,
      singularity_version: self.singularity_version,
      working_directory: self.working_directory.clone(),
      license_policy: self.license_policy,
      userargs: self.userargs.iter().cloned().collect(),
    }
  }
}

fn parse_userarg(value: &str) -> Result<(String, String), String> {
  match value.split_once('=') {
    Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
    _ => Err(format!("expected KEY=VALUE, got '{value}'")),
  }
}

pub fn cmd_render(args: &RenderArgs) -> Result<()> {
  let recipe = evaluate_recipe(&args.recipe, &args.options())
    .with_context(|| format!("Failed to evaluate recipe: {}", args.recipe.display()))?;

  let mut document = if args.emit.is_json() {
    serde_json::to_string_pretty(&recipe.ir()).context("Failed to serialize recipe")?
  } else {
    recipe.render(args.merge).context("Failed to render recipe")?
  };
  document.push('\n');

  match &args.out {
    Some(path) => {
      fs::write(path, &document).with_context(|| format!("Failed to write {}", path.display()))?;
      info!(path = %path.display(), format = %args.format, "recipe written");
    }
    None => print!("{document}"),
  }
  Ok(())
}
