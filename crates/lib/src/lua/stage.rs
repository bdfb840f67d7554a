//! Lua bindings for stages.
//!
//! `recipe.stage{...}` returns a [`StageHandle`]: a userdata pointing at one
//! stage of the shared [`Recipe`]. Its methods append primitives and building
//! blocks in call order.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use mlua::prelude::*;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::block::{BuildingBlock, GenericAutotools, Gnu, Nvhpc, Packages};
use crate::context::ContainerFormat;
use crate::lua::loaders;
use crate::packages::PackageRequest;
use crate::primitive::{
  Arg, Blob, Comment, Copy, Environment, Label, Primitive, Raw, Runscript, Shell, User, Workdir,
};
use crate::stage::{Recipe, Stage};
use crate::toolchain::Toolchain;

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ScopeOptions {
  app: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ShellOptions {
  chdir: bool,
  app: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct EnvironmentOptions {
  export: bool,
  app: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct CommentOptions {
  reformat: Option<bool>,
  app: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RunscriptOptions {
  exec: Option<bool>,
  app: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Sources {
  One(String),
  Many(Vec<String>),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct CopyOptions {
  src: Option<Sources>,
  dest: Option<String>,
  /// source -> destination
  files: BTreeMap<String, String>,
  from: Option<String>,
  chown: Option<String>,
  exclude: Vec<String>,
  app: Option<String>,
}

impl CopyOptions {
  fn into_copy(self) -> LuaResult<Copy> {
    let mut copy = match (self.src, self.dest) {
      (Some(_), None) => return Err(LuaError::external("copy with 'src' needs a 'dest'")),
      (Some(Sources::One(src)), Some(dest)) => Copy::new(src, dest),
      (Some(Sources::Many(sources)), Some(dest)) => Copy::many(sources, dest),
      (None, _) if !self.files.is_empty() => Copy::files(self.files),
      (None, _) => return Err(LuaError::external("copy needs 'src' and 'dest', or 'files'")),
    };
    if let Some(from) = self.from {
      copy = copy.with_from(from);
    }
    if let Some(chown) = self.chown {
      copy = copy.with_chown(chown);
    }
    if let Some(app) = self.app {
      copy = copy.with_app(app);
    }
    Ok(copy.with_exclude(self.exclude))
  }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct BlobOptions {
  docker: Option<String>,
  singularity: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RuntimeOptions {
  exclude: Vec<String>,
}

/// Deserialize an optional options table, using the defaults when absent.
fn options<T: DeserializeOwned + Default>(lua: &Lua, value: Option<LuaValue>) -> LuaResult<T> {
  match value {
    None | Some(LuaValue::Nil) => Ok(T::default()),
    Some(value) => lua.from_value(value),
  }
}

/// A command string or a list of command strings.
fn commands(value: LuaValue) -> LuaResult<Vec<String>> {
  match value {
    LuaValue::String(s) => Ok(vec![s.to_str()?.to_string()]),
    LuaValue::Table(t) => t.sequence_values::<String>().collect(),
    other => Err(LuaError::external(format!(
      "expected a command string or a list of commands, got {}",
      other.type_name()
    ))),
  }
}

fn string_pairs(table: LuaTable) -> LuaResult<Vec<(String, String)>> {
  table.pairs::<String, String>().collect()
}

fn toolchain_table(lua: &Lua, toolchain: &Toolchain) -> LuaResult<LuaTable> {
  let result = lua.create_table()?;
  result.set("toolchain", lua.to_value(toolchain)?)?;
  Ok(result)
}

/// Handle to one stage of a recipe under evaluation.
pub struct StageHandle {
  recipe: Rc<RefCell<Recipe>>,
  index: usize,
}

impl StageHandle {
  pub fn new(recipe: Rc<RefCell<Recipe>>, index: usize) -> Self {
    Self { recipe, index }
  }

  fn with_stage<R>(&self, f: impl FnOnce(&Stage) -> R) -> LuaResult<R> {
    let recipe = self.recipe.borrow();
    let stage = recipe
      .stage(self.index)
      .ok_or_else(|| LuaError::external(format!("stage {} does not exist", self.index)))?;
    Ok(f(stage))
  }

  fn with_stage_mut<R>(&self, f: impl FnOnce(&mut Stage) -> R) -> LuaResult<R> {
    let mut recipe = self.recipe.borrow_mut();
    let stage = recipe
      .stage_mut(self.index)
      .ok_or_else(|| LuaError::external(format!("stage {} does not exist", self.index)))?;
    Ok(f(stage))
  }

  fn push(&self, primitive: impl Into<Primitive>) -> LuaResult<()> {
    let primitive = primitive.into();
    self.with_stage_mut(|stage| stage.push(primitive))
  }

  fn add_block(&self, block: Box<dyn BuildingBlock>) -> LuaResult<()> {
    self
      .with_stage_mut(|stage| stage.add_block(block))?
      .map_err(LuaError::external)
  }

  /// How a stage targeting `format` names this one in copies: its name,
  /// else its position. Singularity only resolves named stages.
  fn reference(&self, format: ContainerFormat) -> LuaResult<String> {
    match self.with_stage(|stage| stage.name().map(str::to_string))? {
      Some(name) => Ok(name),
      None if format == ContainerFormat::Singularity => Err(LuaError::external(format!(
        "stage {} needs a name before Singularity stages can copy from it",
        self.index
      ))),
      None => Ok(self.index.to_string()),
    }
  }
}

impl LuaUserData for StageHandle {
  fn add_fields<F: LuaUserDataFields<Self>>(fields: &mut F) {
    fields.add_field_method_get("name", |_, this| this.with_stage(|s| s.name().map(str::to_string)));
    fields.add_field_method_get("distro", |_, this| this.with_stage(|s| s.ctx().distro().as_str()));
    fields.add_field_method_get("distro_version", |_, this| {
      this.with_stage(|s| s.ctx().distro_version_label())
    });
    fields.add_field_method_get("arch", |_, this| this.with_stage(|s| s.ctx().cpu_arch().as_str()));
    fields.add_field_method_get("package_type", |_, this| {
      this.with_stage(|s| s.ctx().package_type().as_str())
    });
    fields.add_field_method_get("format", |_, this| {
      this.with_stage(|s| s.ctx().container_format().as_str())
    });
    fields.add_field_method_get("platform", |_, this| this.with_stage(|s| s.ctx().platform().triple()));
  }

  fn add_methods<M: LuaUserDataMethods<Self>>(methods: &mut M) {
    methods.add_method("shell", |lua, this, (value, opts): (LuaValue, Option<LuaValue>)| {
      let opts: ShellOptions = options(lua, opts)?;
      let mut shell = Shell::new(commands(value)?).with_chdir(opts.chdir);
      if let Some(app) = opts.app {
        shell = shell.with_app(app);
      }
      this.push(shell)
    });

    methods.add_method("copy", |lua, this, opts: LuaValue| {
      let opts: CopyOptions = lua.from_value(opts)?;
      this.push(opts.into_copy()?)
    });

    methods.add_method("environment", |lua, this, (vars, opts): (LuaTable, Option<LuaValue>)| {
      let opts: EnvironmentOptions = options(lua, opts)?;
      let mut env = Environment::new(string_pairs(vars)?).with_export(opts.export);
      if let Some(app) = opts.app {
        env = env.with_app(app);
      }
      this.push(env)
    });

    methods.add_method("label", |lua, this, (labels, opts): (LuaTable, Option<LuaValue>)| {
      let opts: ScopeOptions = options(lua, opts)?;
      let mut label = Label::new(string_pairs(labels)?);
      if let Some(app) = opts.app {
        label = label.with_app(app);
      }
      this.push(label)
    });

    methods.add_method("arg", |_, this, vars: LuaTable| this.push(Arg::new(string_pairs(vars)?)));

    methods.add_method("comment", |lua, this, (text, opts): (String, Option<LuaValue>)| {
      let opts: CommentOptions = options(lua, opts)?;
      let mut comment = Comment::new(text);
      if let Some(reformat) = opts.reformat {
        comment = comment.with_reformat(reformat);
      }
      if let Some(app) = opts.app {
        comment = comment.with_app(app);
      }
      this.push(comment)
    });

    methods.add_method("raw", |lua, this, raw: LuaValue| this.push(lua.from_value::<Raw>(raw)?));

    methods.add_method("workdir", |lua, this, (directory, opts): (String, Option<LuaValue>)| {
      let opts: ScopeOptions = options(lua, opts)?;
      let mut workdir = Workdir::new(directory);
      if let Some(app) = opts.app {
        workdir = workdir.with_app(app);
      }
      this.push(workdir)
    });

    methods.add_method("user", |_, this, user: String| this.push(User::new(user)));

    methods.add_method("runscript", |lua, this, (value, opts): (LuaValue, Option<LuaValue>)| {
      let opts: RunscriptOptions = options(lua, opts)?;
      let mut runscript = Runscript::new(commands(value)?);
      if let Some(exec) = opts.exec {
        runscript = runscript.with_exec(exec);
      }
      if let Some(app) = opts.app {
        runscript = runscript.with_app(app);
      }
      this.push(runscript)
    });

    methods.add_method("blob", |lua, this, opts: LuaValue| {
      let opts: BlobOptions = lua.from_value(opts)?;
      let docker = opts.docker.map(|p| loaders::resolve_path(lua, &p)).transpose()?;
      let singularity = opts.singularity.map(|p| loaders::resolve_path(lua, &p)).transpose()?;
      let blob = Blob::from_files(docker.as_deref(), singularity.as_deref())
        .map_err(|e| LuaError::external(format!("cannot read blob: {e}")))?;
      this.push(blob)
    });

    methods.add_method("packages", |lua, this, value: LuaValue| {
      let request = match value {
        LuaValue::Table(t) if t.raw_len() > 0 => PackageRequest::new(commands(LuaValue::Table(t))?),
        other => lua.from_value::<PackageRequest>(other)?,
      };
      this.add_block(Box::new(Packages::new(request)))
    });

    methods.add_method("gnu", |lua, this, opts: Option<LuaValue>| {
      let gnu: Gnu = options(lua, opts)?;
      let toolchain = gnu.toolchain();
      this.add_block(Box::new(gnu))?;
      toolchain_table(lua, &toolchain)
    });

    methods.add_method("nvhpc", |lua, this, opts: Option<LuaValue>| {
      let nvhpc: Nvhpc = options(lua, opts)?;
      let toolchain = this.with_stage(|s| nvhpc.toolchain(s.ctx()))?;
      this.add_block(Box::new(nvhpc))?;
      toolchain_table(lua, &toolchain)
    });

    methods.add_method("generic_autotools", |lua, this, opts: LuaValue| {
      let block: GenericAutotools = lua.from_value(opts)?;
      this.add_block(Box::new(block))
    });

    methods.add_method(
      "runtime",
      |lua, this, (other, opts): (LuaUserDataRef<StageHandle>, Option<LuaValue>)| {
        if other.index == this.index {
          return Err(LuaError::external("a stage cannot take the runtime of itself"));
        }
        let opts: RuntimeOptions = options(lua, opts)?;
        let format = this.with_stage(|s| s.ctx().container_format())?;
        let from = other.reference(format)?;
        let primitives = {
          let recipe = this.recipe.borrow();
          let (Some(source), Some(target)) = (recipe.stage(other.index), recipe.stage(this.index)) else {
            return Err(LuaError::external("runtime() needs two stages of the same recipe"));
          };
          source
            .runtime(target.ctx(), &from, &opts.exclude)
            .map_err(LuaError::external)?
        };
        this.with_stage_mut(|stage| primitives.into_iter().for_each(|p| stage.push(p)))
      },
    );
  }
}
