//! Per-format rendering of primitives.
//!
//! Each container format implements [`Renderer`], one method per primitive
//! variant. [`Renderer::render`] is the single place that matches on the
//! variant, so adding a variant fails to compile until every format handles
//! it. Renderers are stateless; everything they need comes from the
//! [`BuildContext`] and the primitive itself, which makes rendering pure and
//! repeatable.

mod bash;
mod docker;
mod singularity;
pub mod text;

pub use bash::BashRenderer;
pub use docker::DockerRenderer;
pub use singularity::{MULTI_STAGE_VERSION, SingularityRenderer, TMP_FILES_VERSION};

use crate::context::{BuildContext, ContainerFormat};
use crate::platform::Version;
use crate::primitive::{
  Arg, BaseImage, Blob, Comment, Copy, Environment, Label, Primitive, Raw, Runscript, Shell, User, Workdir,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
  #[error("{feature} requires Singularity {required} or later (targeting {found})")]
  RequiresSingularity {
    feature: &'static str,
    required: Version,
    found: Version,
  },

  #[error("cannot copy to {dest} from stage '{stage}': /tmp destinations are staged on the host, outside any stage")]
  TmpDestinationFromStage { dest: String, stage: String },

  #[error("%appfiles {app} cannot copy from stage '{stage}'")]
  AppCopyFromStage { app: String, stage: String },

  #[error("cannot split runscript command into words: {0}")]
  UnbalancedQuotes(String),
}

pub trait Renderer {
  fn base_image(&self, ctx: &BuildContext, base: &BaseImage) -> Result<String, RenderError>;
  fn shell(&self, ctx: &BuildContext, shell: &Shell) -> Result<String, RenderError>;
  fn copy(&self, ctx: &BuildContext, copy: &Copy) -> Result<String, RenderError>;
  fn environment(&self, ctx: &BuildContext, env: &Environment) -> Result<String, RenderError>;
  fn label(&self, ctx: &BuildContext, label: &Label) -> Result<String, RenderError>;
  fn comment(&self, ctx: &BuildContext, comment: &Comment) -> Result<String, RenderError>;
  fn raw(&self, ctx: &BuildContext, raw: &Raw) -> Result<String, RenderError>;
  fn workdir(&self, ctx: &BuildContext, workdir: &Workdir) -> Result<String, RenderError>;
  fn user(&self, ctx: &BuildContext, user: &User) -> Result<String, RenderError>;
  fn arg(&self, ctx: &BuildContext, arg: &Arg) -> Result<String, RenderError>;
  fn runscript(&self, ctx: &BuildContext, runscript: &Runscript) -> Result<String, RenderError>;
  fn blob(&self, ctx: &BuildContext, blob: &Blob) -> Result<String, RenderError>;

  fn render(&self, ctx: &BuildContext, primitive: &Primitive) -> Result<String, RenderError> {
    match primitive {
      Primitive::BaseImage(p) => self.base_image(ctx, p),
      Primitive::Shell(p) => self.shell(ctx, p),
      Primitive::Copy(p) => self.copy(ctx, p),
      Primitive::Environment(p) => self.environment(ctx, p),
      Primitive::Label(p) => self.label(ctx, p),
      Primitive::Comment(p) => self.comment(ctx, p),
      Primitive::Raw(p) => self.raw(ctx, p),
      Primitive::Workdir(p) => self.workdir(ctx, p),
      Primitive::User(p) => self.user(ctx, p),
      Primitive::Arg(p) => self.arg(ctx, p),
      Primitive::Runscript(p) => self.runscript(ctx, p),
      Primitive::Blob(p) => self.blob(ctx, p),
    }
  }
}

/// The renderer for a container format.
pub fn renderer_for(format: ContainerFormat) -> &'static dyn Renderer {
  match format {
    ContainerFormat::Docker => &DockerRenderer,
    ContainerFormat::Singularity => &SingularityRenderer,
    ContainerFormat::Bash => &BashRenderer,
  }
}

/// Render one primitive for the context's container format.
pub fn render(ctx: &BuildContext, primitive: &Primitive) -> Result<String, RenderError> {
  renderer_for(ctx.container_format()).render(ctx, primitive)
}

/// Fail unless the targeted Singularity release supports `feature`.
pub(crate) fn require_singularity(
  ctx: &BuildContext,
  feature: &'static str,
  required: Version,
) -> Result<(), RenderError> {
  let found = ctx.singularity_version();
  if found < required {
    return Err(RenderError::RequiresSingularity {
      feature,
      required,
      found,
    });
  }
  Ok(())
}
