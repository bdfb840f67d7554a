use tracing::warn;

use super::text;
use super::{RenderError, Renderer, require_singularity};
use crate::context::BuildContext;
use crate::platform::Version;
use crate::primitive::{
  Arg, BaseImage, Blob, Comment, Copy, CopyEntry, Environment, Label, Raw, Runscript, Shell, User, Workdir,
};

/// First release with multi-stage builds (`Stage:` and `%files from`).
pub const MULTI_STAGE_VERSION: Version = Version::new(3, 2);

/// First release that rejects `%files` destinations under /tmp and /var/tmp.
pub const TMP_FILES_VERSION: Version = Version::new(3, 6);

const INDENT: &str = "    ";

/// Singularity definition file syntax.
pub struct SingularityRenderer;

/// A section header followed by indented body lines.
fn section(header: String, lines: impl IntoIterator<Item = String>) -> String {
  let mut out = header;
  for line in lines {
    out.push('\n');
    out.push_str(&text::indent(&line, INDENT));
  }
  out
}

fn app_section(plain: &str, app_prefix: &str, app: Option<&str>) -> String {
  match app {
    Some(app) => format!("{app_prefix} {app}"),
    None => plain.to_string(),
  }
}

/// Stage entries through the host, outside the container build.
fn setup_lines(entry: &CopyEntry, exclude: &[String]) -> Vec<String> {
  let sources = entry.sources.join(" ");
  let dir = if entry.sources.len() > 1 || entry.dest.ends_with('/') {
    entry.dest.trim_end_matches('/').to_string()
  } else {
    match entry.dest.rsplit_once('/') {
      Some((parent, _)) if !parent.is_empty() => parent.to_string(),
      _ => "/".to_string(),
    }
  };

  let transfer = if exclude.is_empty() {
    format!("cp -a {sources} ${{SINGULARITY_ROOTFS}}{}", entry.dest)
  } else {
    let flags: Vec<String> = exclude.iter().map(|p| format!("--exclude={p}")).collect();
    format!("rsync -a {} {sources} ${{SINGULARITY_ROOTFS}}{}", flags.join(" "), entry.dest)
  };
  vec![format!("mkdir -p ${{SINGULARITY_ROOTFS}}{dir}"), transfer]
}

fn files_lines(entry: &CopyEntry) -> impl Iterator<Item = String> + '_ {
  entry.sources.iter().map(move |src| format!("{src} {}", entry.dest))
}

impl Renderer for SingularityRenderer {
  fn base_image(&self, ctx: &BuildContext, base: &BaseImage) -> Result<String, RenderError> {
    let mut lines = vec![format!("BootStrap: {}", base.bootstrap), format!("From: {}", base.image)];
    if let Some(stage) = &base.stage {
      require_singularity(ctx, "stage names", MULTI_STAGE_VERSION)?;
      lines.push(format!("Stage: {stage}"));
    }
    if base.docker_env {
      lines.push(section("%post".into(), [". /.singularity.d/env/10-docker*.sh".to_string()]));
    }
    Ok(lines.join("\n"))
  }

  fn shell(&self, _ctx: &BuildContext, shell: &Shell) -> Result<String, RenderError> {
    let commands: Vec<String> = shell.effective_commands().map(str::to_string).collect();
    if commands.is_empty() {
      return Ok(String::new());
    }
    let lines = shell.chdir.then(|| "cd /".to_string()).into_iter().chain(commands);
    Ok(section(app_section("%post", "%appinstall", shell.app.as_deref()), lines))
  }

  fn copy(&self, ctx: &BuildContext, copy: &Copy) -> Result<String, RenderError> {
    let entries = copy.entries.iter().filter(|entry| !entry.sources.is_empty());
    if let Some(stage) = &copy.from {
      if let Some(app) = &copy.app {
        return Err(RenderError::AppCopyFromStage {
          app: app.clone(),
          stage: stage.clone(),
        });
      }
      require_singularity(ctx, "%files from", MULTI_STAGE_VERSION)?;
      if !copy.exclude.is_empty() {
        warn!(stage = %stage, "%files from cannot exclude paths, ignoring the exclude list");
      }
    }

    let partition_tmp = ctx.singularity_version() >= TMP_FILES_VERSION;
    let mut setup = Vec::new();
    let mut files = Vec::new();
    for entry in entries {
      match &copy.from {
        Some(stage) => {
          if partition_tmp && entry.is_tmp_destination() {
            return Err(RenderError::TmpDestinationFromStage {
              dest: entry.dest.clone(),
              stage: stage.clone(),
            });
          }
          files.push(entry);
        }
        None if !copy.exclude.is_empty() || (partition_tmp && entry.is_tmp_destination()) => setup.push(entry),
        None => files.push(entry),
      }
    }

    let mut blocks = Vec::new();
    if !setup.is_empty() {
      let lines = setup.iter().flat_map(|entry| setup_lines(entry, &copy.exclude));
      blocks.push(section("%setup".into(), lines));
    }
    if !files.is_empty() {
      let header = match (&copy.app, &copy.from) {
        (_, Some(stage)) => format!("%files from {stage}"),
        (Some(app), None) => format!("%appfiles {app}"),
        (None, None) => "%files".to_string(),
      };
      blocks.push(section(header, files.iter().flat_map(|entry| files_lines(entry))));
    }
    Ok(blocks.join("\n"))
  }

  fn environment(&self, _ctx: &BuildContext, env: &Environment) -> Result<String, RenderError> {
    if env.variables.is_empty() {
      return Ok(String::new());
    }
    let exports: Vec<String> = env.variables.iter().map(|(k, v)| format!("export {k}={v}")).collect();
    let mut out = section(
      app_section("%environment", "%appenv", env.app.as_deref()),
      exports.iter().cloned(),
    );
    if env.export && env.app.is_none() {
      out.push('\n');
      out.push_str(&section("%post".into(), exports));
    }
    Ok(out)
  }

  fn label(&self, _ctx: &BuildContext, label: &Label) -> Result<String, RenderError> {
    if label.labels.is_empty() {
      return Ok(String::new());
    }
    Ok(section(
      app_section("%labels", "%applabels", label.app.as_deref()),
      label.labels.iter().map(|(k, v)| format!("{k} {v}")),
    ))
  }

  fn comment(&self, _ctx: &BuildContext, comment: &Comment) -> Result<String, RenderError> {
    match &comment.app {
      Some(app) if !comment.text.trim().is_empty() => Ok(format!("%apphelp {app}\n{}", comment.text)),
      _ => Ok(text::comment(&comment.text, comment.reformat)),
    }
  }

  fn raw(&self, _ctx: &BuildContext, raw: &Raw) -> Result<String, RenderError> {
    Ok(raw.singularity.clone().unwrap_or_default())
  }

  fn workdir(&self, _ctx: &BuildContext, workdir: &Workdir) -> Result<String, RenderError> {
    let dir = &workdir.directory;
    Ok(section(
      app_section("%post", "%appinstall", workdir.app.as_deref()),
      [format!("mkdir -p {dir}"), format!("cd {dir}")],
    ))
  }

  fn user(&self, _ctx: &BuildContext, _user: &User) -> Result<String, RenderError> {
    Ok(String::new())
  }

  fn arg(&self, _ctx: &BuildContext, _arg: &Arg) -> Result<String, RenderError> {
    Ok(String::new())
  }

  fn runscript(&self, _ctx: &BuildContext, runscript: &Runscript) -> Result<String, RenderError> {
    let header = app_section("%runscript", "%apprun", runscript.app.as_deref());
    match runscript.commands.as_slice() {
      [] => Ok(String::new()),
      [command] if runscript.exec && !command.starts_with("exec ") => Ok(section(header, [format!("exec {command}")])),
      commands => Ok(section(header, commands.iter().cloned())),
    }
  }

  fn blob(&self, _ctx: &BuildContext, blob: &Blob) -> Result<String, RenderError> {
    Ok(blob.singularity.clone().unwrap_or_default())
  }
}
