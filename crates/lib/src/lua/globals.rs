//! The `recipe` global table.
//!
//! - `recipe.format` - target container format ("docker", "singularity", "bash")
//! - `recipe.singularity_version` - targeted Singularity release, e.g. "3.8"
//! - `recipe.working_directory` - where building blocks download and unpack sources
//! - `recipe.license_policy` - "fatal" or "warn"
//! - `recipe.userarg` - `--userarg key=value` pairs
//! - `recipe.stage{...}` - start a new stage from a base image

use std::cell::RefCell;
use std::rc::Rc;

use mlua::prelude::*;
use serde::Deserialize;
use tracing::debug;

use super::stage::StageHandle;
use crate::context::BuildContext;
use crate::eval::RecipeOptions;
use crate::platform::{CpuArch, DistroSpec, PackageType};
use crate::primitive::BaseImage;
use crate::stage::{Recipe, Stage};

/// Arguments of `recipe.stage{...}`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StageSpec {
  image: String,
  name: Option<String>,
  distro: Option<DistroSpec>,
  arch: Option<CpuArch>,
  package_type: Option<PackageType>,
  docker_env: Option<bool>,
  bootstrap: Option<String>,
}

impl StageSpec {
  fn base_image(&self) -> BaseImage {
    let mut base = BaseImage::new(&self.image);
    if let Some(distro) = self.distro {
      base = base.with_distro(distro);
    }
    if let Some(arch) = self.arch {
      base = base.with_arch(arch);
    }
    if let Some(docker_env) = self.docker_env {
      base = base.with_docker_env(docker_env);
    }
    if let Some(bootstrap) = &self.bootstrap {
      base.bootstrap = bootstrap.clone();
    }
    base
  }
}

/// Register `recipe.stage`, which appends a stage to `recipe` and returns its handle.
fn register_stage(lua: &Lua, table: &LuaTable, recipe: Rc<RefCell<Recipe>>, template: BuildContext) -> LuaResult<()> {
  let stage_fn = lua.create_function(move |lua, value: LuaValue| {
    let spec: StageSpec = match value {
      LuaValue::String(image) => StageSpec {
        image: image.to_str()?.to_string(),
        name: None,
        distro: None,
        arch: None,
        package_type: None,
        docker_env: None,
        bootstrap: None,
      },
      other => lua.from_value(other)?,
    };

    if let Some(name) = &spec.name
      && recipe.borrow().stages().iter().any(|stage| stage.name() == Some(name.as_str()))
    {
      return Err(LuaError::external(format!("stage name '{name}' is already used")));
    }

    let stage = Stage::new(&template, spec.name.clone(), spec.base_image()).with_package_type(spec.package_type);
    debug!(image = %spec.image, platform = %stage.ctx().platform(), "stage added");
    let index = recipe.borrow_mut().push(stage);
    Ok(StageHandle::new(recipe.clone(), index))
  })?;
  table.set("stage", stage_fn)
}

/// Register the `recipe` global table in the Lua runtime.
pub fn register_globals(lua: &Lua, recipe: Rc<RefCell<Recipe>>, options: &RecipeOptions) -> LuaResult<()> {
  let table = lua.create_table()?;

  table.set("format", options.format.as_str())?;
  table.set("singularity_version", options.singularity_version.to_string())?;
  table.set("working_directory", options.working_directory.as_str())?;
  table.set("license_policy", options.license_policy.as_str())?;

  let userarg = lua.create_table()?;
  for (key, value) in &options.userargs {
    userarg.set(key.as_str(), value.as_str())?;
  }
  table.set("userarg", userarg)?;

  register_stage(lua, &table, recipe, options.template())?;

  lua.globals().set("recipe", table)?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::context::ContainerFormat;

  fn create_test_lua(options: &RecipeOptions) -> LuaResult<(Lua, Rc<RefCell<Recipe>>)> {
    let lua = Lua::new();
    let recipe = Rc::new(RefCell::new(Recipe::new()));
    register_globals(&lua, recipe.clone(), options)?;
    Ok((lua, recipe))
  }

  mod recipe_table {
    use super::*;

    #[test]
    fn exposes_options() -> LuaResult<()> {
      let mut options = RecipeOptions::new(ContainerFormat::Singularity);
      options.userargs.insert("cuda".into(), "12.2".into());
      let (lua, _) = create_test_lua(&options)?;
      let values: (String, String, String, String) = lua
        .load("return recipe.format, recipe.singularity_version, recipe.working_directory, recipe.userarg.cuda")
        .eval()?;
      assert_eq!(
        values,
        (
          "singularity".into(),
          "3.8".into(),
          "/var/tmp".into(),
          "12.2".into()
        )
      );
      Ok(())
    }

    #[test]
    fn missing_userarg_is_nil() -> LuaResult<()> {
      let (lua, _) = create_test_lua(&RecipeOptions::default())?;
      let value: Option<String> = lua.load("return recipe.userarg.missing").eval()?;
      assert_eq!(value, None);
      Ok(())
    }
  }

  mod stage_fn {
    use super::*;

    #[test]
    fn string_shorthand_takes_an_image() -> LuaResult<()> {
      let (lua, recipe) = create_test_lua(&RecipeOptions::default())?;
      lua.load(r#"recipe.stage("centos:7")"#).exec()?;
      assert_eq!(recipe.borrow().render(false).unwrap(), "FROM centos:7");
      Ok(())
    }

    #[test]
    fn overrides_reach_the_context() -> LuaResult<()> {
      let (lua, recipe) = create_test_lua(&RecipeOptions::default())?;
      let arch: String = lua
        .load(
          r#"
            local s = recipe.stage{ image = "internal/base:latest", distro = "rockylinux9", arch = "arm64" }
            return s.arch
          "#,
        )
        .eval()?;
      assert_eq!(arch, "aarch64");
      let recipe = recipe.borrow();
      let ctx = recipe.stages()[0].ctx();
      assert_eq!(ctx.package_type(), PackageType::Rpm);
      assert_eq!(ctx.distro_version().major, 9);
      Ok(())
    }

    #[test]
    fn forced_package_type_wins() -> LuaResult<()> {
      let (lua, recipe) = create_test_lua(&RecipeOptions::default())?;
      lua
        .load(r#"recipe.stage{ image = "ubuntu:22.04", package_type = "rpm" }"#)
        .exec()?;
      assert_eq!(recipe.borrow().stages()[0].ctx().package_type(), PackageType::Rpm);
      Ok(())
    }

    #[test]
    fn duplicate_names_are_rejected() -> LuaResult<()> {
      let (lua, _) = create_test_lua(&RecipeOptions::default())?;
      let result = lua
        .load(
          r#"
            recipe.stage{ image = "ubuntu:22.04", name = "devel" }
            recipe.stage{ image = "ubuntu:22.04", name = "devel" }
          "#,
        )
        .exec();
      assert!(result.unwrap_err().to_string().contains("already used"));
      Ok(())
    }

    #[test]
    fn unknown_keys_are_rejected() -> LuaResult<()> {
      let (lua, _) = create_test_lua(&RecipeOptions::default())?;
      assert!(lua.load(r#"recipe.stage{ image = "ubuntu:22.04", nmae = "x" }"#).exec().is_err());
      assert!(lua.load(r#"recipe.stage{ name = "x" }"#).exec().is_err());
      Ok(())
    }
  }
}
