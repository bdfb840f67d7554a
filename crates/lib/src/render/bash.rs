use tracing::warn;

use super::text;
use super::{RenderError, Renderer};
use crate::context::BuildContext;
use crate::primitive::{
  Arg, BaseImage, Blob, Comment, Copy, Environment, Label, Raw, Runscript, Shell, User, Workdir,
};

/// A plain bash script that performs the build steps on the current host.
pub struct BashRenderer;

fn skipped(kind: &str) -> Result<String, RenderError> {
  warn!(kind, "primitive has no bash equivalent, skipping");
  Ok(String::new())
}

impl Renderer for BashRenderer {
  fn base_image(&self, _ctx: &BuildContext, _base: &BaseImage) -> Result<String, RenderError> {
    Ok("#!/bin/bash -ex".to_string())
  }

  fn shell(&self, _ctx: &BuildContext, shell: &Shell) -> Result<String, RenderError> {
    let mut lines: Vec<&str> = shell.effective_commands().collect();
    if lines.is_empty() {
      return Ok(String::new());
    }
    if shell.chdir {
      lines.insert(0, "cd /");
    }
    Ok(lines.join("\n"))
  }

  fn copy(&self, _ctx: &BuildContext, _copy: &Copy) -> Result<String, RenderError> {
    skipped("copy")
  }

  fn environment(&self, _ctx: &BuildContext, env: &Environment) -> Result<String, RenderError> {
    Ok(
      env
        .variables
        .iter()
        .map(|(k, v)| format!("export {k}={v}"))
        .collect::<Vec<_>>()
        .join("\n"),
    )
  }

  fn label(&self, _ctx: &BuildContext, _label: &Label) -> Result<String, RenderError> {
    Ok(String::new())
  }

  fn comment(&self, _ctx: &BuildContext, comment: &Comment) -> Result<String, RenderError> {
    Ok(text::comment(&comment.text, comment.reformat))
  }

  fn raw(&self, _ctx: &BuildContext, _raw: &Raw) -> Result<String, RenderError> {
    Ok(String::new())
  }

  fn workdir(&self, _ctx: &BuildContext, _workdir: &Workdir) -> Result<String, RenderError> {
    skipped("workdir")
  }

  fn user(&self, _ctx: &BuildContext, _user: &User) -> Result<String, RenderError> {
    Ok(String::new())
  }

  fn arg(&self, _ctx: &BuildContext, arg: &Arg) -> Result<String, RenderError> {
    Ok(
      arg
        .variables
        .iter()
        .map(|(k, v)| format!("{k}=${{{k}:-\"{v}\"}}"))
        .collect::<Vec<_>>()
        .join("\n"),
    )
  }

  fn runscript(&self, _ctx: &BuildContext, _runscript: &Runscript) -> Result<String, RenderError> {
    skipped("runscript")
  }

  fn blob(&self, _ctx: &BuildContext, _blob: &Blob) -> Result<String, RenderError> {
    Ok(String::new())
  }
}

#[cfg(test)]
mod tests {
  use tracing_test::traced_test;

  use super::*;
  use crate::context::ContainerFormat;
  use crate::primitive::Primitive;

  fn render(primitive: impl Into<Primitive>) -> String {
    let ctx = BuildContext::new(ContainerFormat::Bash);
    BashRenderer.render(&ctx, &primitive.into()).unwrap()
  }

  #[test]
  fn shell_with_chdir() {
    assert_eq!(render(Shell::new(["make"]).with_chdir(true)), "cd /\nmake");
    assert_eq!(render(Shell::new(["make", "make install"])), "make\nmake install");
    assert_eq!(render(Shell::new([""]).with_chdir(true)), "");
  }

  #[test]
  fn environment_is_exported() {
    assert_eq!(render(Environment::new([("A", "1"), ("B", "2")])), "export A=1\nexport B=2");
  }

  #[test]
  fn args_keep_caller_values() {
    assert_eq!(render(Arg::new([("VERSION", "1.0")])), "VERSION=${VERSION:-\"1.0\"}");
  }

  #[test]
  #[traced_test]
  fn copy_is_skipped_with_warning() {
    assert_eq!(render(Copy::new("a", "/opt/a")), "");
    assert!(logs_contain("no bash equivalent"));
  }

  #[test]
  fn container_only_variants_render_empty() {
    assert_eq!(render(Label::new([("a", "b")])), "");
    assert_eq!(render(User::new("root")), "");
    assert_eq!(
      render(Raw {
        docker: Some("RUN x".into()),
        singularity: Some("%post".into()),
      }),
      ""
    );
  }
}
