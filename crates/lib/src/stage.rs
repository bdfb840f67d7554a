//! Stage and recipe assembly.
//!
//! A [`Stage`] is created from a base image, which fixes its
//! [`BuildContext`]. Primitives and building blocks are then appended in
//! recipe order; a building block is expanded as soon as it is added, against
//! the stage's context, and kept so a later stage can ask for its runtime
//! projection. A [`Recipe`] is the ordered list of stages that make up one
//! document.

use serde::Serialize;
use tracing::debug;

use crate::block::{BlockError, BuildingBlock};
use crate::context::{BuildContext, ContainerFormat};
use crate::platform::PackageType;
use crate::primitive::{self, BaseImage, MergeError, Primitive};
use crate::render::{self, MULTI_STAGE_VERSION, RenderError, require_singularity};

#[derive(Debug, thiserror::Error)]
pub enum StageError {
  #[error(transparent)]
  Block(#[from] BlockError),

  #[error(transparent)]
  Render(#[from] RenderError),

  #[error(transparent)]
  Merge(#[from] MergeError),
}

/// One entry of a stage, in recipe order.
enum Layer {
  Primitive(Primitive),
  Block {
    block: Box<dyn BuildingBlock>,
    primitives: Vec<Primitive>,
  },
}

pub struct Stage {
  name: Option<String>,
  base: Primitive,
  ctx: BuildContext,
  layers: Vec<Layer>,
}

impl Stage {
  /// Start a stage from `base`, resolving the context from the recipe-wide `template`.
  pub fn new(template: &BuildContext, name: Option<String>, mut base: BaseImage) -> Self {
    if let Some(name) = &name {
      base.stage = Some(name.clone());
    }
    let ctx = template.clone().with_base_image(&base);
    debug!(image = %base.image, stage = ?name, "new stage");
    Self {
      name,
      base: base.into(),
      ctx,
      layers: Vec::new(),
    }
  }

  /// Force the package family of this stage.
  pub fn with_package_type(mut self, package_type: Option<PackageType>) -> Self {
    self.ctx = self.ctx.with_package_type(package_type);
    self
  }

  pub fn name(&self) -> Option<&str> {
    self.name.as_deref()
  }

  pub fn ctx(&self) -> &BuildContext {
    &self.ctx
  }

  pub fn push(&mut self, primitive: impl Into<Primitive>) {
    self.layers.push(Layer::Primitive(primitive.into()));
  }

  /// Expand `block` against this stage's context and append its primitives.
  pub fn add_block(&mut self, block: Box<dyn BuildingBlock>) -> Result<(), BlockError> {
    let primitives = block.primitives(&self.ctx)?;
    debug!(block = block.name(), primitives = primitives.len(), "expanded building block");
    self.layers.push(Layer::Block { block, primitives });
    Ok(())
  }

  /// Names of the building blocks added so far.
  pub fn block_names(&self) -> impl Iterator<Item = &str> {
    self.layers.iter().filter_map(|layer| match layer {
      Layer::Block { block, .. } => Some(block.name()),
      Layer::Primitive(_) => None,
    })
  }

  /// The runtime projection of this stage's blocks for a stage with context `target`.
  ///
  /// `from` is how the target refers to this stage in copies; blocks named in
  /// `exclude` are left out.
  pub fn runtime(&self, target: &BuildContext, from: &str, exclude: &[String]) -> Result<Vec<Primitive>, BlockError> {
    let mut primitives = Vec::new();
    for layer in &self.layers {
      let Layer::Block { block, .. } = layer else { continue };
      if exclude.iter().any(|name| name == block.name()) {
        debug!(block = block.name(), "excluded from runtime");
        continue;
      }
      primitives.extend(block.runtime(target, from)?);
    }
    Ok(primitives)
  }

  /// Every primitive of the stage in order, base image first.
  pub fn primitives(&self) -> impl Iterator<Item = &Primitive> {
    std::iter::once(&self.base).chain(self.layers.iter().flat_map(|layer| match layer {
      Layer::Primitive(primitive) => std::slice::from_ref(primitive).iter(),
      Layer::Block { primitives, .. } => primitives.iter(),
    }))
  }

  /// Render the stage, one non-empty primitive render per line.
  ///
  /// With `merge_adjacent`, consecutive primitives that can be folded
  /// together (same variant, app scope and options) are merged first.
  pub fn render(&self, merge_adjacent: bool) -> Result<String, StageError> {
    let primitives: Vec<Primitive> = if merge_adjacent {
      merge_runs(self.primitives())?
    } else {
      self.primitives().cloned().collect()
    };

    let mut rendered = Vec::with_capacity(primitives.len());
    for primitive in &primitives {
      let text = render::render(&self.ctx, primitive)?;
      if !text.is_empty() {
        rendered.push(text);
      }
    }
    Ok(rendered.join("\n"))
  }
}

/// Whether `next` can be folded into a run that started with `head`.
fn joins(head: &Primitive, next: &Primitive) -> bool {
  if !primitive::merge::is_mergeable(head) || head.kind() != next.kind() || head.app() != next.app() {
    return false;
  }
  match (head, next) {
    (Primitive::Shell(a), Primitive::Shell(b)) => a.chdir == b.chdir,
    (Primitive::Copy(a), Primitive::Copy(b)) => a.from == b.from && a.chown == b.chown && a.exclude == b.exclude,
    (Primitive::Environment(a), Primitive::Environment(b)) => a.export == b.export,
    (Primitive::Comment(a), Primitive::Comment(b)) => a.reformat == b.reformat,
    (Primitive::Runscript(a), Primitive::Runscript(b)) => a.exec == b.exec,
    _ => true,
  }
}

fn merge_runs<'a>(primitives: impl Iterator<Item = &'a Primitive>) -> Result<Vec<Primitive>, MergeError> {
  let mut merged = Vec::new();
  let mut run: Vec<Primitive> = Vec::new();

  for primitive in primitives {
    if let Some(head) = run.first()
      && !joins(head, primitive)
    {
      merged.push(flush(std::mem::take(&mut run))?);
    }
    run.push(primitive.clone());
  }
  if !run.is_empty() {
    merged.push(flush(run)?);
  }
  Ok(merged)
}

fn flush(mut run: Vec<Primitive>) -> Result<Primitive, MergeError> {
  if run.len() == 1 {
    return Ok(run.remove(0));
  }
  let app = run[0].app().map(str::to_string);
  let mut merged = primitive::merge(&run, app.as_deref())?;
  // Comments keep their original formatting choice.
  if let (Primitive::Comment(comment), Primitive::Comment(first)) = (&mut merged, &run[0]) {
    comment.reformat = first.reformat;
  }
  Ok(merged)
}

/// Serializable view of one stage, for dumping the IR.
#[derive(Debug, Serialize)]
pub struct StageIr<'a> {
  pub name: Option<&'a str>,
  pub format: ContainerFormat,
  pub platform: String,
  pub package_type: PackageType,
  pub primitives: Vec<&'a Primitive>,
}

#[derive(Default)]
pub struct Recipe {
  stages: Vec<Stage>,
}

impl Recipe {
  pub fn new() -> Self {
    Self::default()
  }

  /// Append a stage and return its index.
  pub fn push(&mut self, stage: Stage) -> usize {
    self.stages.push(stage);
    self.stages.len() - 1
  }

  pub fn stages(&self) -> &[Stage] {
    &self.stages
  }

  pub fn stage(&self, index: usize) -> Option<&Stage> {
    self.stages.get(index)
  }

  pub fn stage_mut(&mut self, index: usize) -> Option<&mut Stage> {
    self.stages.get_mut(index)
  }

  pub fn is_empty(&self) -> bool {
    self.stages.is_empty()
  }

  /// Render every stage, separated by a blank line.
  pub fn render(&self, merge_adjacent: bool) -> Result<String, StageError> {
    if self.stages.len() > 1
      && let Some(first) = self.stages.first()
      && first.ctx().container_format() == ContainerFormat::Singularity
    {
      require_singularity(first.ctx(), "multi-stage recipes", MULTI_STAGE_VERSION)?;
    }

    let mut rendered = Vec::with_capacity(self.stages.len());
    for stage in &self.stages {
      let text = stage.render(merge_adjacent)?;
      if !text.is_empty() {
        rendered.push(text);
      }
    }
    Ok(rendered.join("\n\n"))
  }

  pub fn ir(&self) -> Vec<StageIr<'_>> {
    self
      .stages
      .iter()
      .map(|stage| StageIr {
        name: stage.name(),
        format: stage.ctx().container_format(),
        platform: stage.ctx().platform().triple(),
        package_type: stage.ctx().package_type(),
        primitives: stage.primitives().collect(),
      })
      .collect()
  }
}
