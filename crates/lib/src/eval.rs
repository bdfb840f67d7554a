//! Recipe evaluation.
//!
//! [`evaluate_recipe`] runs a Lua recipe file against a fresh runtime and
//! returns the [`Recipe`] the script assembled through `recipe.stage{...}`.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use mlua::prelude::*;
use tracing::{debug, info};

use crate::block::LicensePolicy;
use crate::context::{BuildContext, ContainerFormat, DEFAULT_SINGULARITY_VERSION, DEFAULT_WORKING_DIRECTORY};
use crate::lua::{loaders, runtime};
use crate::platform::Version;
use crate::stage::Recipe;

/// Errors that can occur during recipe evaluation.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
  #[error("recipe not found: {}", .0.display())]
  NotFound(PathBuf),

  /// Lua evaluation error, including errors raised by building blocks.
  #[error("lua error: {0}")]
  Lua(#[from] LuaError),

  #[error("recipe {} does not define any stage", .0.display())]
  NoStages(PathBuf),

  #[error("recipe state is still referenced after evaluation")]
  StillReferenced,
}

/// Recipe-wide settings, fixed before the recipe runs.
#[derive(Debug, Clone)]
pub struct RecipeOptions {
  pub format: ContainerFormat,
  pub singularity_version: Version,
  pub working_directory: String,
  pub license_policy: LicensePolicy,
  /// `--userarg key=value` pairs, exposed to the recipe as `recipe.userarg`.
  pub userargs: BTreeMap<String, String>,
}

impl Default for RecipeOptions {
  fn default() -> Self {
    Self {
      format: ContainerFormat::default(),
      singularity_version: DEFAULT_SINGULARITY_VERSION,
      working_directory: DEFAULT_WORKING_DIRECTORY.to_string(),
      license_policy: LicensePolicy::default(),
      userargs: BTreeMap::new(),
    }
  }
}

impl RecipeOptions {
  pub fn new(format: ContainerFormat) -> Self {
    Self {
      format,
      ..Self::default()
    }
  }

  /// The context every stage starts from before its base image is applied.
  pub fn template(&self) -> BuildContext {
    BuildContext::new(self.format)
      .with_singularity_version(self.singularity_version)
      .with_working_directory(self.working_directory.clone())
      .with_license_policy(self.license_policy)
  }
}

/// Evaluate a Lua recipe file and return the stages it defined.
///
/// # Example
/// ```ignore
/// use std::path::Path;
/// use stagefile_lib::eval::{RecipeOptions, evaluate_recipe};
///
/// let recipe = evaluate_recipe(Path::new("recipe.lua"), &RecipeOptions::default())?;
/// println!("{}", recipe.render(false)?);
/// ```
pub fn evaluate_recipe(path: &Path, options: &RecipeOptions) -> Result<Recipe, EvalError> {
  if !path.is_file() {
    return Err(EvalError::NotFound(path.to_path_buf()));
  }

  let recipe = Rc::new(RefCell::new(Recipe::new()));
  info!(path = %path.display(), format = %options.format, "evaluating recipe");

  // The runtime holds clones of `recipe`; drop it before unwrapping.
  {
    let lua = runtime::create_runtime(recipe.clone(), options)?;
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
      runtime::prepend_package_dir(&lua, dir)?;
    }
    loaders::load_file_with_dir(&lua, path)?;
  }

  let recipe = Rc::try_unwrap(recipe)
    .map_err(|_| EvalError::StillReferenced)?
    .into_inner();
  if recipe.is_empty() {
    return Err(EvalError::NoStages(path.to_path_buf()));
  }
  debug!(stages = recipe.stages().len(), "recipe evaluated");
  Ok(recipe)
}
