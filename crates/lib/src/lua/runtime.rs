use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use mlua::prelude::*;

use crate::eval::RecipeOptions;
use crate::lua::{globals, loaders};
use crate::stage::Recipe;

/// Create a Lua runtime for evaluating one recipe.
///
/// Installs the `__dir`-aware loaders and the `recipe` global, whose stages
/// are appended to `recipe`.
pub fn create_runtime(recipe: Rc<RefCell<Recipe>>, options: &RecipeOptions) -> LuaResult<Lua> {
  let lua = Lua::new();
  loaders::install_loaders(&lua)?;
  globals::register_globals(&lua, recipe, options)?;
  Ok(lua)
}

/// Let `require` find modules next to the recipe, ahead of the default search path.
pub fn prepend_package_dir(lua: &Lua, dir: &Path) -> LuaResult<()> {
  let package: LuaTable = lua.globals().get("package")?;
  let path: String = package.get("path")?;
  let dir = dir.display();
  package.set("path", format!("{dir}/?.lua;{dir}/?/init.lua;{path}"))
}
