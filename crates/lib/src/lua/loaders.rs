//! Recipe file loading with a per-file `__dir`.
//!
//! Every file loaded through [`load_file_with_dir`] (the recipe itself, and
//! anything it pulls in with `dofile` or `require`) runs in an environment
//! where `__dir` is the directory holding that file. Relative paths given to
//! `dofile` and to `blob{...}` resolve against it, so a recipe can be
//! rendered from any working directory.

use std::fs;
use std::path::{Path, PathBuf};

use mlua::prelude::*;

/// Registry key holding the directory of the file currently executing.
const CURRENT_DIR_KEY: &str = "__stagefile_current_dir";

fn read_chunk(path: &Path) -> LuaResult<(PathBuf, String)> {
  let canonical = path
    .canonicalize()
    .map_err(|e| LuaError::external(format!("cannot resolve '{}': {}", path.display(), e)))?;
  let content = fs::read_to_string(&canonical)
    .map_err(|e| LuaError::external(format!("cannot read '{}': {}", canonical.display(), e)))?;
  Ok((canonical, content))
}

/// Environment table for a chunk: `__dir` plus read/write access to `_G`.
fn chunk_env(lua: &Lua, dir: &str) -> LuaResult<LuaTable> {
  let env = lua.create_table()?;
  env.set("__dir", dir)?;
  let mt = lua.create_table()?;
  mt.set("__index", lua.globals())?;
  mt.set("__newindex", lua.globals())?;
  env.set_metatable(Some(mt))?;
  Ok(env)
}

/// Load and run a Lua file with `__dir` set to its parent directory.
pub fn load_file_with_dir(lua: &Lua, path: &Path) -> LuaResult<LuaValue> {
  let (canonical, content) = read_chunk(path)?;
  let dir = canonical
    .parent()
    .unwrap_or(Path::new("."))
    .to_string_lossy()
    .into_owned();

  let previous: Option<String> = lua.named_registry_value(CURRENT_DIR_KEY)?;
  lua.set_named_registry_value(CURRENT_DIR_KEY, dir.as_str())?;

  let result = lua
    .load(&content)
    .set_name(format!("@{}", canonical.display()))
    .set_environment(chunk_env(lua, &dir)?)
    .eval::<LuaValue>();

  // Restoring must not mask an error from the chunk itself.
  let _ = lua.set_named_registry_value(CURRENT_DIR_KEY, previous);
  result
}

/// Directory of the file currently executing, if any.
pub fn current_dir(lua: &Lua) -> LuaResult<Option<PathBuf>> {
  Ok(lua.named_registry_value::<Option<String>>(CURRENT_DIR_KEY)?.map(PathBuf::from))
}

/// Resolve `path` against the executing file's directory unless it is absolute.
pub fn resolve_path(lua: &Lua, path: &str) -> LuaResult<PathBuf> {
  let path = Path::new(path);
  if path.is_absolute() {
    return Ok(path.to_path_buf());
  }
  Ok(match current_dir(lua)? {
    Some(dir) => dir.join(path),
    None => path.to_path_buf(),
  })
}

/// `package.searchers[2]` replacement that loads Lua modules with `__dir`.
fn create_lua_searcher(lua: &Lua) -> LuaResult<LuaFunction> {
  lua.create_function(|lua, modname: String| {
    let package: LuaTable = lua.globals().get("package")?;
    let searchpath: LuaFunction = package.get("searchpath")?;
    let found: Option<String> = searchpath
      .call::<LuaMultiValue>((modname.as_str(), package.get::<String>("path")?))?
      .into_iter()
      .next()
      .and_then(|value| value.as_string().and_then(|s| s.to_str().ok().map(|s| s.to_string())));

    match found {
      Some(file) => {
        let target = PathBuf::from(&file);
        let loader = lua.create_function(move |lua, _: LuaMultiValue| load_file_with_dir(lua, &target))?;
        Ok((LuaValue::Function(loader), LuaValue::String(lua.create_string(&file)?)))
      }
      None => Ok((
        LuaValue::Nil,
        LuaValue::String(lua.create_string(format!("\n\tno recipe module '{modname}'"))?),
      )),
    }
  })
}

/// Route `require`, `dofile` and `loadfile` through [`load_file_with_dir`].
pub fn install_loaders(lua: &Lua) -> LuaResult<()> {
  let package: LuaTable = lua.globals().get("package")?;
  let searchers: LuaTable = package.get("searchers")?;
  searchers.set(2, create_lua_searcher(lua)?)?;

  let dofile = lua.create_function(|lua, path: Option<String>| match path {
    Some(path) => load_file_with_dir(lua, &resolve_path(lua, &path)?),
    None => Err(LuaError::external("dofile() needs a path")),
  })?;
  lua.globals().set("dofile", dofile)?;

  // A chunk loaded without running it would lose track of its directory.
  let loadfile = lua.create_function(|_, _: LuaMultiValue| -> LuaResult<()> {
    Err(LuaError::external("loadfile() is not available in recipes, use dofile()"))
  })?;
  lua.globals().set("loadfile", loadfile)?;

  Ok(())
}
