//! Shared helpers for recipe integration tests.

use std::path::PathBuf;

use stagefile_lib::context::ContainerFormat;
use stagefile_lib::eval::{EvalError, RecipeOptions, evaluate_recipe};
use tempfile::TempDir;

/// A recipe written to its own temporary directory.
pub struct TestRecipe {
  pub temp: TempDir,
  pub path: PathBuf,
}

impl TestRecipe {
  pub fn new(content: &str) -> Self {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("recipe.lua");
    std::fs::write(&path, content).unwrap();
    Self { temp, path }
  }

  /// Add a file next to the recipe.
  pub fn with_file(self, name: &str, content: &str) -> Self {
    std::fs::write(self.temp.path().join(name), content).unwrap();
    self
  }

  pub fn render_with(&self, options: &RecipeOptions) -> Result<String, EvalError> {
    let recipe = evaluate_recipe(&self.path, options)?;
    Ok(recipe.render(false).unwrap_or_else(|e| panic!("render failed: {e}")))
  }

  pub fn render(&self, format: ContainerFormat) -> String {
    self
      .render_with(&RecipeOptions::new(format))
      .unwrap_or_else(|e| panic!("evaluation failed: {e}"))
  }
}
