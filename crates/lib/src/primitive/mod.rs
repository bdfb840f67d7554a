//! The instruction IR.
//!
//! A [`Primitive`] is the smallest renderable instruction: a base image, a
//! block of shell commands, a file copy, a set of environment variables, and
//! so on. Building blocks produce sequences of primitives; renderers turn
//! each primitive into Dockerfile, Singularity or bash text.
//!
//! # Variants
//!
//! - [`Primitive::BaseImage`] - the image a stage starts from
//! - [`Primitive::Shell`] - build-time commands
//! - [`Primitive::Copy`] - files from the host or another stage
//! - [`Primitive::Environment`] / [`Primitive::Label`] / [`Primitive::Arg`] - key/value sets
//! - [`Primitive::Comment`], [`Primitive::Raw`], [`Primitive::Blob`] - text passed through
//! - [`Primitive::Workdir`], [`Primitive::User`], [`Primitive::Runscript`]
//!
//! Primitives never change after construction; [`merge`] folds several
//! primitives of one variant into a new one.

pub mod merge;
mod types;

pub use merge::{MergeError, merge};
pub use types::*;

use serde::{Deserialize, Serialize};

use crate::context::BuildContext;
use crate::render::{self, RenderError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Primitive {
  BaseImage(BaseImage),
  Shell(Shell),
  Copy(Copy),
  Environment(Environment),
  Label(Label),
  Comment(Comment),
  Raw(Raw),
  Workdir(Workdir),
  User(User),
  Arg(Arg),
  Runscript(Runscript),
  Blob(Blob),
}

impl Primitive {
  /// Short name of the variant, as used in logs and errors.
  pub fn kind(&self) -> &'static str {
    match self {
      Primitive::BaseImage(_) => "base_image",
      Primitive::Shell(_) => "shell",
      Primitive::Copy(_) => "copy",
      Primitive::Environment(_) => "environment",
      Primitive::Label(_) => "label",
      Primitive::Comment(_) => "comment",
      Primitive::Raw(_) => "raw",
      Primitive::Workdir(_) => "workdir",
      Primitive::User(_) => "user",
      Primitive::Arg(_) => "arg",
      Primitive::Runscript(_) => "runscript",
      Primitive::Blob(_) => "blob",
    }
  }

  /// SCI-F application the primitive is scoped to, if any.
  pub fn app(&self) -> Option<&str> {
    match self {
      Primitive::Shell(p) => p.app.as_deref(),
      Primitive::Copy(p) => p.app.as_deref(),
      Primitive::Environment(p) => p.app.as_deref(),
      Primitive::Label(p) => p.app.as_deref(),
      Primitive::Comment(p) => p.app.as_deref(),
      Primitive::Workdir(p) => p.app.as_deref(),
      Primitive::Runscript(p) => p.app.as_deref(),
      Primitive::BaseImage(_) | Primitive::Raw(_) | Primitive::User(_) | Primitive::Arg(_) | Primitive::Blob(_) => None,
    }
  }

  /// Render this primitive for the context's container format.
  pub fn render(&self, ctx: &BuildContext) -> Result<String, RenderError> {
    render::render(ctx, self)
  }
}

macro_rules! impl_from_variant {
  ($($variant:ident),* $(,)?) => {
    $(
      impl From<$variant> for Primitive {
        fn from(value: $variant) -> Self {
          Primitive::$variant(value)
        }
      }
    )*
  };
}

impl_from_variant!(
  BaseImage,
  Shell,
  Copy,
  Environment,
  Label,
  Comment,
  Raw,
  Workdir,
  User,
  Arg,
  Runscript,
  Blob
);
