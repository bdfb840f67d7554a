use std::collections::BTreeMap;

use tracing::warn;

use super::text;
use super::{RenderError, Renderer};
use crate::context::BuildContext;
use crate::primitive::{
  Arg, BaseImage, Blob, Comment, Copy, CopyEntry, Environment, Label, Raw, Runscript, Shell, User, Workdir,
};

const CONTINUATION: &str = " \\\n    ";

/// Dockerfile syntax.
pub struct DockerRenderer;

impl DockerRenderer {
  fn key_values(keyword: &str, pairs: &BTreeMap<String, String>) -> String {
    if pairs.is_empty() {
      return String::new();
    }
    let items: Vec<String> = pairs.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!("{keyword} {}", items.join(CONTINUATION))
  }

  fn copy_entry(copy: &Copy, entry: &CopyEntry) -> String {
    let mut words = vec!["COPY".to_string()];
    if let Some(owner) = &copy.chown {
      words.push(format!("--chown={owner}"));
    }
    if let Some(stage) = &copy.from {
      words.push(format!("--from={stage}"));
    }
    words.extend(copy.exclude.iter().map(|pattern| format!("--exclude={pattern}")));

    if let [source] = entry.sources.as_slice() {
      words.push(source.clone());
      words.push(entry.dest.clone());
      return words.join(" ");
    }

    let mut lines = vec![format!("{} {}", words.join(" "), entry.sources.first().cloned().unwrap_or_default())];
    lines.extend(entry.sources.iter().skip(1).cloned());
    lines.push(entry.dest.clone());
    lines.join(CONTINUATION)
  }
}

fn ignore_app(kind: &str, app: Option<&str>) {
  if let Some(app) = app {
    warn!(app, kind, "SCI-F applications are a Singularity feature, ignoring the app scope");
  }
}

impl Renderer for DockerRenderer {
  fn base_image(&self, _ctx: &BuildContext, base: &BaseImage) -> Result<String, RenderError> {
    Ok(match &base.stage {
      Some(stage) => format!("FROM {} AS {stage}", base.image),
      None => format!("FROM {}", base.image),
    })
  }

  fn shell(&self, _ctx: &BuildContext, shell: &Shell) -> Result<String, RenderError> {
    ignore_app("shell", shell.app.as_deref());
    let commands: Vec<&str> = shell.effective_commands().collect();
    if commands.is_empty() {
      return Ok(String::new());
    }
    Ok(format!("RUN {}", commands.join(" && \\\n    ")))
  }

  fn copy(&self, _ctx: &BuildContext, copy: &Copy) -> Result<String, RenderError> {
    ignore_app("copy", copy.app.as_deref());
    Ok(
      copy
        .entries
        .iter()
        .filter(|entry| !entry.sources.is_empty())
        .map(|entry| Self::copy_entry(copy, entry))
        .collect::<Vec<_>>()
        .join("\n"),
    )
  }

  fn environment(&self, _ctx: &BuildContext, env: &Environment) -> Result<String, RenderError> {
    ignore_app("environment", env.app.as_deref());
    Ok(Self::key_values("ENV", &env.variables))
  }

  fn label(&self, _ctx: &BuildContext, label: &Label) -> Result<String, RenderError> {
    ignore_app("label", label.app.as_deref());
    Ok(Self::key_values("LABEL", &label.labels))
  }

  fn comment(&self, _ctx: &BuildContext, comment: &Comment) -> Result<String, RenderError> {
    Ok(text::comment(&comment.text, comment.reformat))
  }

  fn raw(&self, _ctx: &BuildContext, raw: &Raw) -> Result<String, RenderError> {
    Ok(raw.docker.clone().unwrap_or_default())
  }

  fn workdir(&self, _ctx: &BuildContext, workdir: &Workdir) -> Result<String, RenderError> {
    ignore_app("workdir", workdir.app.as_deref());
    Ok(format!("WORKDIR {}", workdir.directory))
  }

  fn user(&self, _ctx: &BuildContext, user: &User) -> Result<String, RenderError> {
    Ok(format!("USER {}", user.user))
  }

  fn arg(&self, _ctx: &BuildContext, arg: &Arg) -> Result<String, RenderError> {
    Ok(
      arg
        .variables
        .iter()
        .map(|(k, v)| if v.is_empty() { format!("ARG {k}") } else { format!("ARG {k}={v}") })
        .collect::<Vec<_>>()
        .join("\n"),
    )
  }

  fn runscript(&self, _ctx: &BuildContext, runscript: &Runscript) -> Result<String, RenderError> {
    ignore_app("runscript", runscript.app.as_deref());
    let Some(command) = runscript.commands.first() else {
      return Ok(String::new());
    };
    if runscript.commands.len() > 1 {
      warn!(
        dropped = runscript.commands.len() - 1,
        "ENTRYPOINT takes a single command, ignoring the rest"
      );
    }

    let words = text::shell_split(command).ok_or_else(|| RenderError::UnbalancedQuotes(command.clone()))?;
    let quoted: Vec<String> = words
      .iter()
      .map(|word| serde_json::Value::String(word.clone()).to_string())
      .collect();
    Ok(format!("ENTRYPOINT [{}]", quoted.join(", ")))
  }

  fn blob(&self, _ctx: &BuildContext, blob: &Blob) -> Result<String, RenderError> {
    Ok(blob.docker.clone().unwrap_or_default())
  }
}
